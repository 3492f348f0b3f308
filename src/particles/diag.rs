//! Diagnostics: particle selection, spectral moments and attribute snapshots.
//!
//! A selection call marks a subset of particles; moment queries then reduce
//! over that subset into `outbuf`, one value per cell. Queries leave the
//! selection in place; any step that changes the ensemble clears it.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::engine::Particles;
use super::ensemble::{liquid_mass, Ensemble};
use super::executor::Executor;
use super::{EngineState, ParticlesProto};
use crate::config::{Opts, RadiusRange};
use crate::error::{EngineError, Result};

/// Spectrum a moment was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentKind {
    Dry,
    Wet,
}

/// One requested moment over one radius range, per cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentRecord {
    pub kind: MomentKind,
    pub range: RadiusRange,
    pub order: i32,
    pub values: Vec<f64>,
}

const INITIALIZED: &[EngineState] = &[EngineState::Idle, EngineState::Synced];

impl<E: Executor> Particles<E> {
    pub(super) fn select<F>(&mut self, op: &'static str, pred: F) -> Result<()>
    where
        F: Fn(&Ensemble, usize) -> bool + Send + Sync,
    {
        self.require(op, INITIALIZED)?;
        let ens = &self.ens;
        self.selection = Some(E::map(ens.len(), |i| pred(ens, i)));
        Ok(())
    }

    fn selected(&self, op: &'static str) -> Result<&[bool]> {
        self.require(op, INITIALIZED)?;
        self.selection
            .as_deref()
            .ok_or_else(|| EngineError::PreconditionViolation {
                op,
                state: format!("{} (no particle selection)", self.state),
            })
    }

    /// Per-cell sum of `n · value(i)` over selected particles, in particle order
    fn sum_per_cell(&self, sel: &[bool], values: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.opts_init.n_cell()];
        for i in (0..self.ens.len()).filter(|&i| sel[i]) {
            out[self.ens.cell[i]] += self.ens.n[i] as f64 * values[i];
        }
        out
    }

    /// Mass of dry air in each cell (kg)
    fn dry_air_mass(&self) -> Vec<f64> {
        let dv = self.opts_init.dv();
        self.env.rhod.iter().map(|rhod| rhod * dv).collect()
    }

    pub(super) fn moment<F>(&mut self, op: &'static str, k: i32, radius: F) -> Result<()>
    where
        F: Fn(&Ensemble, usize) -> f64 + Send + Sync,
    {
        let sel = self.selected(op)?;
        let ens = &self.ens;
        let values = E::map(ens.len(), |i| radius(ens, i).powi(k));
        let mut out = self.sum_per_cell(sel, &values);
        for (o, m) in out.iter_mut().zip(self.dry_air_mass()) {
            *o /= m;
        }
        self.outbuf = out;
        Ok(())
    }

    /// Kernel estimate of the liquid water mass density per unit ln r at `rad_m`
    pub(super) fn wet_mass_dens(&mut self, rad_m: f64, sig0: f64) -> Result<()> {
        if !(rad_m > 0.0) || !(sig0 > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "diag_wet_mass_dens: rad = {rad_m:e} m, sig0 = {sig0} (must be > 0)"
            )));
        }
        let sel = self.selected("diag_wet_mass_dens")?;
        let n_cell = self.opts_init.n_cell();
        let ens = &self.ens;

        let mut n_sel = vec![0usize; n_cell];
        for i in (0..ens.len()).filter(|&i| sel[i] && !ens.is_ice(i)) {
            n_sel[ens.cell[i]] += 1;
        }
        let sigma: Vec<f64> = n_sel
            .iter()
            .map(|&n| sig0 * (n.max(1) as f64).powf(-0.2))
            .collect();

        let ln_rad = rad_m.ln();
        let values = E::map(ens.len(), |i| {
            if ens.is_ice(i) {
                return 0.0;
            }
            let s = sigma[ens.cell[i]];
            let z = (ens.wet_radius(i).ln() - ln_rad) / s;
            liquid_mass(ens.rw2[i]) * (-0.5 * z * z).exp() / ((2.0 * PI).sqrt() * s)
        });
        let dv = self.opts_init.dv();
        self.outbuf = self
            .sum_per_cell(sel, &values)
            .into_iter()
            .map(|m| m / dv)
            .collect();
        Ok(())
    }

    pub(super) fn sd_conc(&mut self) -> Result<()> {
        self.require("diag_sd_conc", INITIALIZED)?;
        let mut out = vec![0.0; self.opts_init.n_cell()];
        for &c in &self.ens.cell {
            out[c] += 1.0;
        }
        self.outbuf = out;
        Ok(())
    }

    pub(super) fn ice_mass(&mut self) -> Result<()> {
        self.require("diag_ice_mass", INITIALIZED)?;
        let mut out = vec![0.0; self.opts_init.n_cell()];
        for i in (0..self.ens.len()).filter(|&i| self.ens.is_ice(i)) {
            out[self.ens.cell[i]] += self.ens.n[i] as f64 * self.ens.particle_mass(i);
        }
        for (o, m) in out.iter_mut().zip(self.dry_air_mass()) {
            *o /= m;
        }
        self.outbuf = out;
        Ok(())
    }

    /// Evaluate every moment requested in `opts.out_dry` and `opts.out_wet`
    pub(super) fn outmom(&mut self, opts: &Opts) -> Result<Vec<MomentRecord>> {
        let mut records = Vec::new();
        for (range, orders) in &opts.out_dry {
            self.diag_dry_rng(range.lo_m, range.hi_m)?;
            for &order in orders {
                self.diag_dry_mom(order)?;
                records.push(MomentRecord {
                    kind: MomentKind::Dry,
                    range: *range,
                    order,
                    values: self.outbuf.clone(),
                });
            }
        }
        for (range, orders) in &opts.out_wet {
            self.diag_wet_rng(range.lo_m, range.hi_m)?;
            for &order in orders {
                self.diag_wet_mom(order)?;
                records.push(MomentRecord {
                    kind: MomentKind::Wet,
                    range: *range,
                    order,
                    values: self.outbuf.clone(),
                });
            }
        }
        Ok(records)
    }

    pub(super) fn attr(&self, name: &str) -> Result<Vec<f64>> {
        let e = &self.ens;
        let col = |v: &[f64]| v.to_vec();
        Ok(match name {
            "n" => e.n.iter().map(|&n| n as f64).collect(),
            "rd3" => col(&e.rd3),
            "kpa" => col(&e.kpa),
            "rw2" => col(&e.rw2),
            "rd2_insol" => col(&e.rd2_insol),
            "T_freeze" => col(&e.T_freeze),
            "ice_a" => col(&e.ice_a),
            "ice_c" => col(&e.ice_c),
            "ice_rho" => col(&e.ice_rho),
            "x" => e.pos.iter().map(|p| p.x).collect(),
            "y" => e.pos.iter().map(|p| p.y).collect(),
            "z" => e.pos.iter().map(|p| p.z).collect(),
            "cell" => e.cell.iter().map(|&c| c as f64).collect(),
            other => {
                return Err(EngineError::InvalidInput(format!(
                    "get_attr: unknown attribute `{other}`"
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DrySize, OptsInit};
    use crate::particles::{AmbientFields, Serial};

    fn engine() -> Particles<Serial> {
        let oi = OptsInit {
            dry_sizes: vec![
                DrySize {
                    kappa: 0.61,
                    rd_m: 0.05e-6,
                    conc_per_kg: 1e8,
                    sd_count: 10,
                },
                DrySize {
                    kappa: 1.28,
                    rd_m: 0.5e-6,
                    conc_per_kg: 1e6,
                    sd_count: 5,
                },
            ],
            ..OptsInit::default()
        };
        let mut p = Particles::<Serial>::new(oi);
        p.init(&AmbientFields::uniform(1, 290.0, 0.005, 1.0)).unwrap();
        p
    }

    #[test]
    fn test_number_moment_counts_particles() {
        let mut p = engine();
        p.diag_all().unwrap();
        p.diag_wet_mom(0).unwrap();
        assert!((p.outbuf()[0] - 1.01e8).abs() < 1.0);
        p.diag_dry_rng(0.1e-6, 1.0).unwrap();
        p.diag_dry_mom(0).unwrap();
        assert!((p.outbuf()[0] - 1e6).abs() < 1.0);
    }

    #[test]
    fn test_query_without_selection() {
        let mut p = engine();
        let err = p.diag_wet_mom(0);
        assert!(matches!(err, Err(EngineError::PreconditionViolation { .. })));
    }

    #[test]
    fn test_sd_conc_and_unknown_attr() {
        let mut p = engine();
        p.diag_sd_conc().unwrap();
        assert_eq!(p.outbuf(), &[15.0]);
        assert!(p.get_attr("wet_radius").is_err());
        assert_eq!(p.get_attr("kpa").unwrap().len(), 15);
    }

    #[test]
    fn test_outmom_records() {
        let mut p = engine();
        let opts = Opts {
            out_dry: vec![(RadiusRange::new(0.0, 1.0), vec![0, 3])],
            out_wet: vec![(RadiusRange::new(0.0, 1.0), vec![0])],
            ..Opts::default()
        };
        let recs = p.diag_outmom(&opts).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].kind, MomentKind::Dry);
        assert_eq!(recs[1].order, 3);
        assert!((recs[2].values[0] - 1.01e8).abs() < 1.0);
    }
}
