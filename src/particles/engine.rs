//! Engine state and the stepping protocol.

use std::marker::PhantomData;

use glam::DVec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::diag::MomentRecord;
use super::ensemble::Ensemble;
use super::executor::Executor;
use super::{AmbientFields, EngineState, ParticlesProto};
use crate::common::ConstCp;
use crate::config::{Backend, Opts, OptsInit};
use crate::error::{EngineError, Result};

/// Host fields as seen by the engine during a step
#[derive(Debug, Clone, Default)]
pub(super) struct CellEnv {
    pub th: Vec<f64>,
    pub rv: Vec<f64>,
    pub rhod: Vec<f64>,
    pub velocity: Option<Vec<DVec3>>,
}

/// Processes already run in the current step
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct StepDone {
    pub cond: bool,
    pub coal: bool,
    pub sedi: bool,
}

impl StepDone {
    fn any(&self) -> bool {
        self.cond || self.coal || self.sedi
    }
}

/// Particle engine over executor `E`.
pub struct Particles<E: Executor> {
    pub(super) opts_init: OptsInit,
    pub(super) thermo: ConstCp,
    pub(super) ens: Ensemble,
    pub(super) rng: ChaCha8Rng,
    pub(super) state: EngineState,
    pub(super) done: StepDone,
    pub(super) env: CellEnv,
    /// Particles chosen by the last selection call; `None` once stale
    pub(super) selection: Option<Vec<bool>>,
    pub(super) outbuf: Vec<f64>,
    /// Mass that left through the bottom boundary, per cell (kg)
    pub(super) precip_kg: Vec<f64>,
    _exec: PhantomData<E>,
}

impl<E: Executor> Particles<E> {
    pub fn new(opts_init: OptsInit) -> Self {
        let n_cell = opts_init.n_cell();
        Self {
            rng: ChaCha8Rng::seed_from_u64(opts_init.rng_seed),
            opts_init,
            thermo: ConstCp,
            ens: Ensemble::default(),
            state: EngineState::Uninitialized,
            done: StepDone::default(),
            env: CellEnv::default(),
            selection: None,
            outbuf: vec![0.0; n_cell],
            precip_kg: vec![0.0; n_cell],
            _exec: PhantomData,
        }
    }

    /// Read-only view of the particle attributes
    pub fn ensemble(&self) -> &Ensemble {
        &self.ens
    }

    pub(super) fn require(&self, op: &'static str, allowed: &[EngineState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EngineError::PreconditionViolation {
                op,
                state: self.state.to_string(),
            })
        }
    }

    /// Synced and `op` not yet run in this step
    pub(super) fn require_step(&self, op: &'static str, already: bool) -> Result<()> {
        self.require(op, &[EngineState::Synced])?;
        if already {
            return Err(EngineError::PreconditionViolation {
                op,
                state: format!("{} ({op} already ran this step)", self.state),
            });
        }
        Ok(())
    }

    pub(super) fn invalidate_selection(&mut self) {
        self.selection = None;
    }

    fn sync_in_impl(&mut self, ambient: &AmbientFields) -> Result<()> {
        self.require("sync_in", &[EngineState::Idle, EngineState::Synced])?;
        if self.done.any() {
            return Err(EngineError::PreconditionViolation {
                op: "sync_in",
                state: format!("{} (step in progress)", self.state),
            });
        }
        ambient.check(self.opts_init.n_cell())?;
        self.env = CellEnv {
            th: ambient.th.clone(),
            rv: ambient.rv.clone(),
            rhod: ambient.rhod.clone(),
            velocity: ambient.velocity.clone(),
        };
        self.state = EngineState::Synced;
        Ok(())
    }

    fn step_async_impl(&mut self, opts: &Opts) -> Result<()> {
        self.require("step_async", &[EngineState::Synced])?;
        if opts.chem {
            return Err(EngineError::UnsupportedConfig(
                "aqueous chemistry is not part of this engine (opts.chem = true)".into(),
            ));
        }
        if !self.done.coal {
            self.coal_impl(opts)?;
        }
        if !self.done.sedi {
            self.sedi_impl(opts)?;
        }
        let removed = self.ens.compact();
        if removed > 0 {
            log::debug!("step_async: removed {} exhausted particles", removed);
        }
        self.check_invariants()?;

        self.done = StepDone::default();
        self.state = EngineState::Idle;
        self.invalidate_selection();
        Ok(())
    }

    fn check_invariants(&self) -> Result<()> {
        let n_cell = self.opts_init.n_cell();
        let e = &self.ens;
        let bad = (0..e.len()).find(|&i| {
            e.n[i] == 0
                || !(e.rd3[i] > 0.0)
                || e.cell[i] >= n_cell
                || (!e.is_ice(i) && !(e.rw2[i] > 0.0))
                || (e.is_ice(i) && !(e.ice_c[i] > 0.0 && e.ice_rho[i] > 0.0))
        });
        match bad {
            Some(i) => Err(EngineError::InvalidInput(format!(
                "particle {i} violates ensemble invariants: n = {}, rd3 = {:e}, rw2 = {:e}, ice_a = {:e}, cell = {}",
                e.n[i], e.rd3[i], e.rw2[i], e.ice_a[i], e.cell[i]
            ))),
            None => Ok(()),
        }
    }
}

impl<E: Executor> ParticlesProto for Particles<E> {
    fn init(&mut self, ambient: &AmbientFields) -> Result<()> {
        self.require("init", &[EngineState::Uninitialized])?;
        ambient.check(self.opts_init.n_cell())?;
        self.init_impl(ambient)?;
        self.state = EngineState::Idle;
        Ok(())
    }

    fn sync_in(&mut self, ambient: &AmbientFields) -> Result<()> {
        self.sync_in_impl(ambient)
    }

    fn step_sync(&mut self, opts: &Opts, ambient: &mut AmbientFields) -> Result<()> {
        self.sync_in_impl(ambient)?;
        self.cond_impl(opts, &mut ambient.th, &mut ambient.rv)
    }

    fn step_cond(&mut self, opts: &Opts, th: &mut [f64], rv: &mut [f64]) -> Result<()> {
        self.cond_impl(opts, th, rv)
    }

    fn step_coal(&mut self, opts: &Opts) -> Result<()> {
        self.coal_impl(opts)
    }

    fn step_sedi(&mut self, opts: &Opts) -> Result<()> {
        self.sedi_impl(opts)
    }

    fn step_async(&mut self, opts: &Opts) -> Result<()> {
        self.step_async_impl(opts)
    }

    fn diag_all(&mut self) -> Result<()> {
        self.select("diag_all", |_, _| true)
    }

    fn diag_wet_rng(&mut self, lo_m: f64, hi_m: f64) -> Result<()> {
        self.select("diag_wet_rng", |e, i| {
            let r = e.wet_radius(i);
            !e.is_ice(i) && r >= lo_m && r < hi_m
        })
    }

    fn diag_dry_rng(&mut self, lo_m: f64, hi_m: f64) -> Result<()> {
        self.select("diag_dry_rng", |e, i| {
            let r = e.dry_radius(i);
            r >= lo_m && r < hi_m
        })
    }

    fn diag_ice(&mut self) -> Result<()> {
        self.select("diag_ice", |e, i| e.is_ice(i))
    }

    fn diag_wet_mom(&mut self, k: i32) -> Result<()> {
        self.moment("diag_wet_mom", k, |e, i| e.wet_radius(i))
    }

    fn diag_dry_mom(&mut self, k: i32) -> Result<()> {
        self.moment("diag_dry_mom", k, |e, i| e.dry_radius(i))
    }

    fn diag_wet_mass_dens(&mut self, rad_m: f64, sig0: f64) -> Result<()> {
        self.wet_mass_dens(rad_m, sig0)
    }

    fn diag_sd_conc(&mut self) -> Result<()> {
        self.sd_conc()
    }

    fn diag_ice_mass(&mut self) -> Result<()> {
        self.ice_mass()
    }

    fn diag_precip(&mut self) -> Result<()> {
        self.require("diag_precip", &[EngineState::Idle, EngineState::Synced])?;
        self.outbuf.clone_from(&self.precip_kg);
        Ok(())
    }

    fn diag_outmom(&mut self, opts: &Opts) -> Result<Vec<MomentRecord>> {
        self.outmom(opts)
    }

    fn outbuf(&self) -> &[f64] {
        &self.outbuf
    }

    fn get_attr(&self, name: &str) -> Result<Vec<f64>> {
        self.attr(name)
    }

    fn n_sd(&self) -> usize {
        self.ens.len()
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn backend(&self) -> Backend {
        E::BACKEND
    }

    fn opts_init(&self) -> &OptsInit {
        &self.opts_init
    }
}
