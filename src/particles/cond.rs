//! Phase changes, condensation and deposition (`step_cond`).
//!
//! Per substep the cell state is frozen, particles are updated in parallel,
//! and mass and latent heat are then accumulated per cell in particle order
//! and fed back into θ_d and r_v.

use std::f64::consts::PI;

use rand::Rng;
use rand_distr::Open01;

use super::engine::Particles;
use super::ensemble::liquid_mass;
use super::executor::Executor;
use crate::common::const_cp::{Thermodynamics, RHO_W, T_0_K};
use crate::common::ice_deposition::{dmi_dt, grow_axes, rho_dep, spheroid_volume};
use crate::common::ice_nucleation::{p_freeze, FreezingModel};
use crate::common::maxwell_mason::rw2_implicit_step;
use crate::common::moist_air::{pressure, thermal_conductivity, vapour_diffusivity, vapour_pressure};
use crate::common::theta_dry;
use crate::config::Opts;
use crate::error::{EngineError, KernelError, Result};

/// Thermodynamic state of one cell, derived from (θ_d, r_v, ρ_d)
#[derive(Debug, Clone, Copy)]
pub(super) struct CellThermo {
    pub T: f64,
    pub rh: f64,
    pub rh_i: f64,
    /// Vapour diffusivity (m²/s)
    pub D: f64,
    /// Thermal conductivity (W/m/K)
    pub K: f64,
    /// Vapour density (kg/m³)
    pub rho_v: f64,
    /// Vapour density at ice saturation (kg/m³)
    pub rho_vsi: f64,
    /// Moist-air density (kg/m³)
    pub rho_air: f64,
}

impl CellThermo {
    pub fn new<Th: Thermodynamics>(thermo: &Th, th: f64, rv: f64, rhod: f64) -> Self {
        let T = theta_dry::T(th, rhod);
        let p = pressure(rhod, rv, T);
        let p_v = vapour_pressure(rhod, rv, T);
        let p_vsi = thermo.p_vsi(T);
        Self {
            T,
            rh: p_v / thermo.p_vs(T),
            rh_i: p_v / p_vsi,
            D: vapour_diffusivity(T, p),
            K: thermal_conductivity(T),
            rho_v: rhod * rv,
            rho_vsi: p_vsi / (thermo.R_v() * T),
            rho_air: rhod * (1.0 + rv),
        }
    }
}

/// Per-cell totals of one substep (kg)
struct Feedback {
    /// Condensed liquid water
    dm_liq: Vec<f64>,
    /// Deposited ice
    dm_ice: Vec<f64>,
    /// Water frozen (negative when melted)
    m_frozen: Vec<f64>,
}

impl Feedback {
    fn new(n_cell: usize) -> Self {
        Self {
            dm_liq: vec![0.0; n_cell],
            dm_ice: vec![0.0; n_cell],
            m_frozen: vec![0.0; n_cell],
        }
    }
}

/// New attributes of one particle after condensation/deposition
#[derive(Debug, Clone, Copy)]
struct CondUpdate {
    rw2: f64,
    ice_a: f64,
    ice_c: f64,
    ice_rho: f64,
    /// Mass change of one real particle (kg)
    dm: f64,
    /// Mass exchanged with the ice phase
    ice: bool,
}

impl<E: Executor> Particles<E> {
    pub(super) fn cell_thermo(&self) -> Vec<CellThermo> {
        (0..self.opts_init.n_cell())
            .map(|c| CellThermo::new(&self.thermo, self.env.th[c], self.env.rv[c], self.env.rhod[c]))
            .collect()
    }

    pub(super) fn cond_impl(&mut self, opts: &Opts, th: &mut [f64], rv: &mut [f64]) -> Result<()> {
        self.require_step("step_cond", self.done.cond)?;
        self.done.cond = true;

        let n_cell = self.opts_init.n_cell();
        if th.len() != n_cell || rv.len() != n_cell {
            return Err(EngineError::InvalidInput(format!(
                "step_cond: got {} th and {} rv values for {n_cell} cells",
                th.len(),
                rv.len()
            )));
        }
        if !opts.cond && !opts.ice_nucl {
            return Ok(());
        }
        self.invalidate_selection();

        let th0 = self.env.th.clone();
        let rv0 = self.env.rv.clone();
        let sstp = self.opts_init.sstp_cond;
        let dt = self.opts_init.dt_sec / sstp as f64;

        for _ in 0..sstp {
            let cells = self.cell_thermo();
            let mut fb = Feedback::new(n_cell);
            if opts.ice_nucl {
                self.phase_changes(&cells, dt, &mut fb)?;
            }
            if opts.cond {
                self.condensation(&cells, dt, &mut fb)?;
            }
            self.apply_feedback(&cells, &fb);
        }

        for c in 0..n_cell {
            th[c] += self.env.th[c] - th0[c];
            rv[c] += self.env.rv[c] - rv0[c];
        }
        log::debug!(
            "step_cond: {} substep(s), mean d_rv = {:.3e}",
            sstp,
            (0..n_cell).map(|c| self.env.rv[c] - rv0[c]).sum::<f64>() / n_cell as f64
        );
        Ok(())
    }

    /// Immersion freezing of liquid particles and melting of ice above 0 °C
    fn phase_changes(&mut self, cells: &[CellThermo], dt: f64, fb: &mut Feedback) -> Result<()> {
        for i in 0..self.ens.len() {
            if self.ens.is_ice(i) && cells[self.ens.cell[i]].T > T_0_K {
                self.melt(i, fb);
            }
        }

        match self.opts_init.freezing {
            FreezingModel::Singular => {
                for i in 0..self.ens.len() {
                    let T = cells[self.ens.cell[i]].T;
                    if !self.ens.is_ice(i) && T < T_0_K && T <= self.ens.T_freeze[i] {
                        self.freeze(i, fb);
                    }
                }
            }
            FreezingModel::TimeDependent => {
                let thermo = self.thermo;
                let inp = self.opts_init.inp_type.clone();
                let ens = &self.ens;
                let probs = E::try_map(ens.len(), |i| -> std::result::Result<_, KernelError> {
                    let T = cells[ens.cell[i]].T;
                    if ens.is_ice(i) || T >= T_0_K {
                        return Ok(None);
                    }
                    p_freeze(&thermo, &inp, ens.rd2_insol[i], T, dt).map(Some)
                })?;
                // draws stay serial so every backend freezes the same particles
                for (i, p) in probs.into_iter().enumerate() {
                    if let Some(p) = p {
                        let u: f64 = self.rng.sample(Open01);
                        if u < p {
                            self.freeze(i, fb);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn freeze(&mut self, i: usize, fb: &mut Feedback) {
        let e = &mut self.ens;
        let m = liquid_mass(e.rw2[i]);
        let rho_i = self.thermo.rho_i();
        let r = (3.0 * m / (4.0 * PI * rho_i)).cbrt();
        e.ice_a[i] = r;
        e.ice_c[i] = r;
        e.ice_rho[i] = rho_i;
        e.rw2[i] = e.rd3[i].powf(2.0 / 3.0);
        fb.m_frozen[e.cell[i]] += e.n[i] as f64 * m;
    }

    fn melt(&mut self, i: usize, fb: &mut Feedback) {
        let m = self.ens.particle_mass(i);
        let e = &mut self.ens;
        let rw3 = (3.0 * m / (4.0 * PI * RHO_W)).max(e.rd3[i]);
        fb.m_frozen[e.cell[i]] -= e.n[i] as f64 * m;
        e.to_haze(i);
        e.rw2[i] = rw3.powf(2.0 / 3.0);
    }

    fn condensation(&mut self, cells: &[CellThermo], dt: f64, fb: &mut Feedback) -> Result<()> {
        let thermo = self.thermo;
        let ens = &self.ens;
        let updates = E::try_map(ens.len(), |i| -> std::result::Result<_, KernelError> {
            let c = &cells[ens.cell[i]];
            if ens.is_ice(i) {
                deposit(&thermo, c, ens.ice_a[i], ens.ice_c[i], ens.ice_rho[i], ens.rd3[i], dt)
            } else {
                let rw2 = rw2_implicit_step(
                    &thermo, ens.rw2[i], ens.rd3[i], ens.kpa[i], c.rh, c.T, c.D, c.K, dt,
                )?;
                Ok(CondUpdate {
                    rw2,
                    ice_a: 0.0,
                    ice_c: 0.0,
                    ice_rho: 0.0,
                    dm: liquid_mass(rw2) - liquid_mass(ens.rw2[i]),
                    ice: false,
                })
            }
        })?;

        let e = &mut self.ens;
        for (i, u) in updates.into_iter().enumerate() {
            e.rw2[i] = u.rw2;
            e.ice_a[i] = u.ice_a;
            e.ice_c[i] = u.ice_c;
            e.ice_rho[i] = u.ice_rho;
            let dm = e.n[i] as f64 * u.dm;
            if u.ice {
                fb.dm_ice[e.cell[i]] += dm;
            } else {
                fb.dm_liq[e.cell[i]] += dm;
            }
        }
        Ok(())
    }

    fn apply_feedback(&mut self, cells: &[CellThermo], fb: &Feedback) {
        let dv = self.opts_init.dv();
        for (c, cell) in cells.iter().enumerate() {
            let mass_dry_kg = self.env.rhod[c] * dv;
            let T = cell.T;
            let heat = (self.thermo.l_v(T) * fb.dm_liq[c]
                + self.thermo.l_s(T) * fb.dm_ice[c]
                + self.thermo.l_f(T) * fb.m_frozen[c])
                / mass_dry_kg;
            self.env.th[c] += theta_dry::d_th(self.env.th[c], T, heat);
            self.env.rv[c] -= (fb.dm_liq[c] + fb.dm_ice[c]) / mass_dry_kg;
        }
    }
}

/// Deposition growth or sublimation of one crystal over `dt`
fn deposit<Th: Thermodynamics>(
    thermo: &Th,
    c: &CellThermo,
    a: f64,
    cc: f64,
    rho: f64,
    rd3: f64,
    dt: f64,
) -> std::result::Result<CondUpdate, KernelError> {
    let v_old = spheroid_volume(a, cc);
    let m_old = rho * v_old;
    let unchanged = CondUpdate {
        rw2: rd3.powf(2.0 / 3.0),
        ice_a: a,
        ice_c: cc,
        ice_rho: rho,
        dm: 0.0,
        ice: true,
    };
    if !(c.rho_v > 0.0) {
        // no vapour to exchange with
        return Ok(unchanged);
    }

    let m_new = m_old + dmi_dt(thermo, c.D, c.K, c.rho_v, c.T, c.rh_i, a, cc)? * dt;
    if m_new <= 0.0 {
        return Ok(CondUpdate {
            ice_a: 0.0,
            ice_c: 0.0,
            ice_rho: 0.0,
            dm: -m_old,
            ..unchanged
        });
    }

    let growth_ratio = thermo.lambda(c.T);
    let (v_new, growing) = if m_new >= m_old {
        let rho_d = rho_dep(thermo, c.T, c.rho_v - c.rho_vsi, a);
        (v_old + (m_new - m_old) / rho_d, true)
    } else {
        (v_old * m_new / m_old, false)
    };
    let (a_new, c_new) = grow_axes(a, cc, v_old, v_new, growth_ratio);
    Ok(CondUpdate {
        ice_a: a_new,
        ice_c: c_new,
        ice_rho: if growing { m_new / spheroid_volume(a_new, c_new) } else { rho },
        dm: m_new - m_old,
        ..unchanged
    })
}
