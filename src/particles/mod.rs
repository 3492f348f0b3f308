//! Super-droplet particle engine.
//!
//! The host drives each timestep through a fixed protocol:
//!
//! ```text
//! init ─► sync_in ─► step_cond ─► step_coal ─► step_sedi ─► step_async ─┐
//!            ▲          (each at most once, any may be skipped)         │
//!            └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Calls out of order fail with [`EngineError::PreconditionViolation`].
//! Diagnostics may be queried whenever the engine is initialized.

mod coal;
mod cond;
mod diag;
mod engine;
mod ensemble;
mod executor;
mod init;
mod sedi;

use std::fmt;

use glam::DVec3;

pub use diag::{MomentKind, MomentRecord};
pub use engine::Particles;
pub use ensemble::{Ensemble, SuperDroplet};
pub use executor::{Executor, MultiCore, Serial};

use crate::config::{Backend, Opts, OptsInit};
use crate::error::{EngineError, Result};

/// Eulerian fields of the host model, one value per cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmbientFields {
    /// Dry potential temperature (K)
    pub th: Vec<f64>,
    /// Water vapour mixing ratio (kg/kg)
    pub rv: Vec<f64>,
    /// Dry-air density (kg/m³)
    pub rhod: Vec<f64>,
    /// Cell-centred air velocity (m/s), needed for advection
    pub velocity: Option<Vec<DVec3>>,
}

impl AmbientFields {
    /// Same state in every cell, no velocity
    pub fn uniform(n_cell: usize, th: f64, rv: f64, rhod: f64) -> Self {
        Self {
            th: vec![th; n_cell],
            rv: vec![rv; n_cell],
            rhod: vec![rhod; n_cell],
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec<DVec3>) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub(crate) fn check(&self, n_cell: usize) -> Result<()> {
        let lens = [
            ("th", self.th.len()),
            ("rv", self.rv.len()),
            ("rhod", self.rhod.len()),
        ];
        for (name, len) in lens {
            if len != n_cell {
                return Err(EngineError::InvalidInput(format!(
                    "ambient field `{name}` has {len} values for {n_cell} cells"
                )));
            }
        }
        if let Some(v) = &self.velocity {
            if v.len() != n_cell {
                return Err(EngineError::InvalidInput(format!(
                    "ambient velocity has {} values for {n_cell} cells",
                    v.len()
                )));
            }
        }
        if let Some(c) = (0..n_cell).find(|&c| !(self.th[c] > 0.0 && self.rhod[c] > 0.0 && self.rv[c] >= 0.0)) {
            return Err(EngineError::InvalidInput(format!(
                "ambient state in cell {c}: th = {}, rv = {}, rhod = {}",
                self.th[c], self.rv[c], self.rhod[c]
            )));
        }
        Ok(())
    }
}

/// Protocol state of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Idle,
    Synced,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Idle => "idle",
            EngineState::Synced => "synced",
        };
        write!(f, "{s}")
    }
}

/// Backend-independent interface of the particle engine.
pub trait ParticlesProto: Send {
    /// Sample the ensemble from the dry spectra and equilibrate it with `ambient`
    fn init(&mut self, ambient: &AmbientFields) -> Result<()>;

    /// Take a copy of the host fields for the coming step
    fn sync_in(&mut self, ambient: &AmbientFields) -> Result<()>;

    /// `sync_in` followed by `step_cond`, updating `ambient.th` and `ambient.rv` in place
    fn step_sync(&mut self, opts: &Opts, ambient: &mut AmbientFields) -> Result<()>;

    /// Phase changes and condensation/deposition; adds the resulting
    /// increments to `th` and `rv`
    fn step_cond(&mut self, opts: &Opts, th: &mut [f64], rv: &mut [f64]) -> Result<()>;

    /// Collision-coalescence
    fn step_coal(&mut self, opts: &Opts) -> Result<()>;

    /// Advection and sedimentation
    fn step_sedi(&mut self, opts: &Opts) -> Result<()>;

    /// Run remaining processes and close the step
    fn step_async(&mut self, opts: &Opts) -> Result<()>;

    /// Select every particle, liquid and ice
    fn diag_all(&mut self) -> Result<()>;
    /// Select liquid particles with `lo_m <= r_w < hi_m`; ice is never
    /// selected here, so `diag_all` equals `diag_wet_rng(0, inf)` plus
    /// `diag_ice` once anything has frozen
    fn diag_wet_rng(&mut self, lo_m: f64, hi_m: f64) -> Result<()>;
    /// Select particles of either phase by dry radius
    fn diag_dry_rng(&mut self, lo_m: f64, hi_m: f64) -> Result<()>;
    /// Select ice particles
    fn diag_ice(&mut self) -> Result<()>;

    /// Wet moment of the selection; ice enters at its volume-equivalent
    /// radius `(a^2 c)^(1/3)`
    fn diag_wet_mom(&mut self, k: i32) -> Result<()>;
    fn diag_dry_mom(&mut self, k: i32) -> Result<()>;
    fn diag_wet_mass_dens(&mut self, rad_m: f64, sig0: f64) -> Result<()>;
    fn diag_sd_conc(&mut self) -> Result<()>;
    fn diag_ice_mass(&mut self) -> Result<()>;
    fn diag_precip(&mut self) -> Result<()>;
    fn diag_outmom(&mut self, opts: &Opts) -> Result<Vec<MomentRecord>>;

    /// Result of the last diagnostic, one value per cell
    fn outbuf(&self) -> &[f64];

    /// Snapshot of one particle attribute
    fn get_attr(&self, name: &str) -> Result<Vec<f64>>;

    fn n_sd(&self) -> usize;
    fn state(&self) -> EngineState;
    fn backend(&self) -> Backend;
    fn opts_init(&self) -> &OptsInit;
}

/// Build an engine for `backend`.
pub fn factory(backend: Backend, opts_init: OptsInit) -> Result<Box<dyn ParticlesProto>> {
    opts_init.validate()?;
    let engine: Box<dyn ParticlesProto> = match backend {
        Backend::Serial => Box::new(Particles::<Serial>::new(opts_init)),
        Backend::MultiCore => Box::new(Particles::<MultiCore>::new(opts_init)),
        Backend::Accelerator => return Err(EngineError::BackendUnavailable(backend)),
    };
    log::info!(
        "Particle engine created: backend {}, {} cell(s), {} dimension(s)",
        backend,
        engine.opts_init().n_cell(),
        engine.opts_init().n_dims()
    );
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Constant;
    use std::sync::Arc;

    fn opts_init() -> OptsInit {
        let mut o = OptsInit::default();
        o.dry_distros.insert(0.61, Arc::new(Constant(1e8))).unwrap();
        o
    }

    #[test]
    fn test_factory_backends() {
        assert!(factory(Backend::Serial, opts_init()).is_ok());
        assert!(factory(Backend::MultiCore, opts_init()).is_ok());
        let err = factory(Backend::Accelerator, opts_init()).err();
        assert_eq!(err, Some(EngineError::BackendUnavailable(Backend::Accelerator)));
    }

    #[test]
    fn test_factory_validates() {
        let err = factory(Backend::Serial, OptsInit::default()).err();
        assert!(matches!(err, Some(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_ambient_check() {
        let a = AmbientFields::uniform(3, 290.0, 0.01, 1.0);
        assert!(a.check(3).is_ok());
        assert!(a.check(2).is_err());
        let bad = AmbientFields::uniform(1, 290.0, 0.01, 0.0);
        assert!(bad.check(1).is_err());
        let v = AmbientFields::uniform(2, 290.0, 0.01, 1.0).with_velocity(vec![DVec3::ZERO]);
        assert!(v.check(2).is_err());
    }
}
