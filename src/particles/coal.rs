//! Monte-Carlo collision-coalescence of liquid super-droplets (`step_coal`).
//!
//! Per cell, the liquid super-droplets are shuffled and paired off. Each
//! pair stands in for all N(N−1)/2 candidate pairs, so its collision
//! probability is scaled up accordingly. A collision with multiplicity
//! ratio γ transfers γ·ξ_k real particles of the larger-multiplicity droplet j
//! onto droplet k.
//!
//! Reference: Shima et al., Q J R Meteorol Soc 2009, sec. 5.1.4

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::Open01;

use super::engine::Particles;
use super::executor::Executor;
use crate::config::Opts;
use crate::error::Result;

impl<E: Executor> Particles<E> {
    pub(super) fn coal_impl(&mut self, opts: &Opts) -> Result<()> {
        self.require_step("step_coal", self.done.coal)?;
        self.done.coal = true;
        if !opts.coal || self.ens.len() < 2 {
            return Ok(());
        }
        self.invalidate_selection();

        let sstp = self.opts_init.sstp_coal;
        let dt = self.opts_init.dt_sec / sstp as f64;
        let mut collisions = 0usize;
        for _ in 0..sstp {
            collisions += self.coal_substep(dt);
            self.ens.compact();
        }
        log::debug!("step_coal: {} collision event(s)", collisions);
        Ok(())
    }

    fn coal_substep(&mut self, dt: f64) -> usize {
        let n_cell = self.opts_init.n_cell();
        let dv = self.opts_init.dv();
        let kernel = self.opts_init.kernel;
        let vt_model = self.opts_init.terminal_velocity;

        let mut by_cell: Vec<Vec<usize>> = vec![Vec::new(); n_cell];
        for i in 0..self.ens.len() {
            if !self.ens.is_ice(i) {
                by_cell[self.ens.cell[i]].push(i);
            }
        }
        for list in by_cell.iter_mut() {
            list.shuffle(&mut self.rng);
        }

        let cells = self.cell_thermo();
        let ens = &self.ens;
        let radius = E::map(ens.len(), |i| ens.wet_radius(i));
        let vt = if kernel.needs_velocity() {
            E::map(ens.len(), |i| vt_model.velocity(radius[i], cells[ens.cell[i]].rho_air))
        } else {
            vec![0.0; ens.len()]
        };

        let mut events = 0;
        for list in &by_cell {
            let n_s = list.len();
            if n_s < 2 {
                continue;
            }
            let n_pairs = n_s / 2;
            let scale = (n_s * (n_s - 1)) as f64 / 2.0 / n_pairs as f64;
            for pair in list.chunks_exact(2) {
                let (i, k) = (pair[0], pair[1]);
                let xi_max = self.ens.n[i].max(self.ens.n[k]) as f64;
                let p = kernel.value(radius[i], radius[k], vt[i], vt[k]) * xi_max * scale * dt / dv;
                let u: f64 = self.rng.sample(Open01);
                let gamma = (p.floor() as u64).saturating_add(u64::from(u < p.fract()));
                if gamma == 0 {
                    continue;
                }
                self.collide(i, k, gamma);
                events += 1;
            }
        }
        events
    }

    /// Apply a collision with multiplicity ratio `gamma` to the pair (i, k)
    fn collide(&mut self, i: usize, k: usize, gamma: u64) {
        let e = &mut self.ens;
        // j: larger multiplicity
        let (j, k) = if e.n[i] >= e.n[k] { (i, k) } else { (k, i) };
        let g = gamma.min(e.n[j] / e.n[k]);
        if g == 0 {
            return;
        }
        let gf = g as f64;

        let rw3 = gf * e.rw2[j] * e.rw2[j].sqrt() + e.rw2[k] * e.rw2[k].sqrt();
        let rd3 = gf * e.rd3[j] + e.rd3[k];
        let kpa = (gf * e.rd3[j] * e.kpa[j] + e.rd3[k] * e.kpa[k]) / rd3;
        let insol3 = gf * e.rd2_insol[j].powf(1.5) + e.rd2_insol[k].powf(1.5);
        let T_freeze = e.T_freeze[j].max(e.T_freeze[k]);

        let merged = |e: &mut super::ensemble::Ensemble, idx: usize| {
            e.rw2[idx] = rw3.powf(2.0 / 3.0);
            e.rd3[idx] = rd3;
            e.kpa[idx] = kpa;
            e.rd2_insol[idx] = insol3.powf(2.0 / 3.0);
            e.T_freeze[idx] = T_freeze;
        };

        if e.n[j] > g * e.n[k] {
            e.n[j] -= g * e.n[k];
            merged(&mut *e, k);
        } else {
            // equal split; a zero half is compacted afterwards
            let half = e.n[k] / 2;
            e.n[j] = half;
            e.n[k] -= half;
            merged(&mut *e, j);
            merged(&mut *e, k);
        }
    }
}
