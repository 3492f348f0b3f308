//! Sampling of the initial ensemble.
//!
//! Each spectrum is sampled per cell with `sd_conc` super-droplets spread
//! uniformly in ln(r_d) over the radius range where the expected multiplicity
//! is at least one half; within each bin the radius is drawn at random
//! (stratified sampling). Multiplicities follow from the spectrum value times
//! the bin width and the dry-air mass of the cell.
//!
//! Reference: Shima et al., Q J R Meteorol Soc 2009, sec. 5.1.3

use glam::DVec3;
use rand::Rng;
use rand_distr::Open01;

use super::cond::CellThermo;
use super::engine::{CellEnv, Particles};
use super::ensemble::{Ensemble, SuperDroplet};
use super::executor::Executor;
use super::AmbientFields;
use crate::common::ice_nucleation::{t_freeze_cdf_inv, FreezingModel};
use crate::common::kappa_koehler::rw3_eq;
use crate::common::UnaryFunction;
use crate::error::{EngineError, Result};

/// Search bounds for the sampled dry radius (m)
const RD_SEARCH_MIN_M: f64 = 1e-11;
const RD_SEARCH_MAX_M: f64 = 1e-3;
/// Grid points used to locate the sampling range
const RANGE_GRID: usize = 1000;

/// ln(r_d) range where a super-droplet of width (hi − lo)/sd_conc would
/// represent at least half a real particle. Refined once with the narrowed width.
pub(super) fn sampling_range(
    spectrum: &dyn UnaryFunction,
    sd_conc: usize,
    mass_dry_kg: f64,
) -> Option<(f64, f64)> {
    let (mut lo, mut hi) = (RD_SEARCH_MIN_M.ln(), RD_SEARCH_MAX_M.ln());
    for _ in 0..2 {
        let d_ln = (hi - lo) / sd_conc as f64;
        let step = (hi - lo) / RANGE_GRID as f64;
        let above = |j: usize| spectrum.funval(lo + j as f64 * step) * d_ln * mass_dry_kg >= 0.5;
        let first = (0..=RANGE_GRID).find(|&j| above(j))?;
        let last = (0..=RANGE_GRID).rev().find(|&j| above(j))?;
        let new_lo = lo + first.saturating_sub(1) as f64 * step;
        let new_hi = lo + (last + 1).min(RANGE_GRID) as f64 * step;
        lo = new_lo;
        hi = new_hi;
    }
    Some((lo, hi))
}

impl<E: Executor> Particles<E> {
    pub(super) fn init_impl(&mut self, ambient: &AmbientFields) -> Result<()> {
        let oi = self.opts_init.clone();
        let dv = oi.dv();
        let rd2_insol = oi.rd_insol_m * oi.rd_insol_m;
        let mut ens = Ensemble::default();

        for cell in 0..oi.n_cell() {
            let mass_dry_kg = ambient.rhod[cell] * dv;

            for (kappa, spectrum) in oi.dry_distros.iter() {
                let Some((ln_lo, ln_hi)) = sampling_range(spectrum, oi.sd_conc, mass_dry_kg) else {
                    log::warn!(
                        "Spectrum with kappa = {} yields no particles in cell {}",
                        kappa,
                        cell
                    );
                    continue;
                };
                let d_ln = (ln_hi - ln_lo) / oi.sd_conc as f64;
                for k in 0..oi.sd_conc {
                    let u: f64 = self.rng.sample(Open01);
                    let ln_rd = ln_lo + (k as f64 + u) * d_ln;
                    let n = (spectrum.funval(ln_rd) * d_ln * mass_dry_kg).round();
                    if n < 1.0 {
                        continue;
                    }
                    self.push_new(&mut ens, cell, n as u64, (3.0 * ln_rd).exp(), kappa, rd2_insol)?;
                }
            }

            for size in &oi.dry_sizes {
                if size.sd_count == 0 {
                    continue;
                }
                let n = (size.conc_per_kg * mass_dry_kg / size.sd_count as f64).round();
                if n < 1.0 {
                    continue;
                }
                for _ in 0..size.sd_count {
                    self.push_new(&mut ens, cell, n as u64, size.rd_m.powi(3), size.kappa, rd2_insol)?;
                }
            }
        }

        // equilibrate wet radii below saturation
        let cells: Vec<CellThermo> = (0..oi.n_cell())
            .map(|c| CellThermo::new(&self.thermo, ambient.th[c], ambient.rv[c], ambient.rhod[c]))
            .collect();
        let rh_max = oi.rh_max;
        ens.rw2 = E::map(ens.len(), |i| {
            let c = &cells[ens.cell[i]];
            rw3_eq(ens.rd3[i], ens.kpa[i], c.rh.min(rh_max), c.T).powf(2.0 / 3.0)
        });

        let total: u64 = ens.n.iter().sum();
        log::info!(
            "Initialized {} super-droplets representing {:.3e} particles",
            ens.len(),
            total as f64
        );

        self.ens = ens;
        self.env = CellEnv {
            th: ambient.th.clone(),
            rv: ambient.rv.clone(),
            rhod: ambient.rhod.clone(),
            velocity: ambient.velocity.clone(),
        };
        self.precip_kg = vec![0.0; oi.n_cell()];
        self.invalidate_selection();
        Ok(())
    }

    /// Append one dry particle, drawing its freezing temperature and position
    fn push_new(
        &mut self,
        ens: &mut Ensemble,
        cell: usize,
        n: u64,
        rd3: f64,
        kappa: f64,
        rd2_insol: f64,
    ) -> Result<()> {
        if ens.len() >= self.opts_init.n_sd_max {
            return Err(EngineError::InvalidInput(format!(
                "init: ensemble exceeds n_sd_max = {}",
                self.opts_init.n_sd_max
            )));
        }
        let T_freeze = match self.opts_init.freezing {
            FreezingModel::Singular => {
                let u: f64 = self.rng.sample(Open01);
                t_freeze_cdf_inv(&self.opts_init.inp_type, rd2_insol, u)?
            }
            FreezingModel::TimeDependent => f64::NAN,
        };
        let pos = self.random_position_in(cell);
        ens.push(SuperDroplet {
            n,
            rd3,
            kpa: kappa,
            rw2: rd3.powf(2.0 / 3.0),
            rd2_insol,
            T_freeze,
            ice_a: 0.0,
            ice_c: 0.0,
            ice_rho: 0.0,
            pos,
            cell,
        });
        Ok(())
    }

    /// Uniform random position inside `cell`; absent dimensions stay at 0
    pub(super) fn random_position_in(&mut self, cell: usize) -> DVec3 {
        let oi = &self.opts_init;
        let (i, j, k) = oi.cell_ijk(cell);
        let dims = [(oi.nx, i, oi.dx_m), (oi.ny, j, oi.dy_m), (oi.nz, k, oi.dz_m)];
        let mut p = [0.0; 3];
        for (axis, (n, idx, d)) in dims.into_iter().enumerate() {
            if n > 0 {
                let u: f64 = self.rng.sample(Open01);
                p[axis] = (idx as f64 + u) * d;
            }
        }
        DVec3::from_array(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Constant, Lognormal};

    #[test]
    fn test_sampling_range_brackets_mode() {
        let mode = Lognormal {
            mean_r_m: 0.04e-6,
            gstdev: 1.4,
            n_tot: 60e6,
        };
        let (lo, hi) = sampling_range(&mode, 64, 1.0).unwrap();
        assert!(lo < (0.04e-6f64).ln() && hi > (0.04e-6f64).ln());
        assert!(lo > RD_SEARCH_MIN_M.ln() && hi < RD_SEARCH_MAX_M.ln());
    }

    #[test]
    fn test_sampling_range_empty_spectrum() {
        assert!(sampling_range(&Constant(0.0), 64, 1.0).is_none());
    }
}
