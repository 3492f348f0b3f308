//! Transport of particles by the resolved flow and by gravitational settling
//! (`step_sedi`).
//!
//! Horizontal boundaries are periodic. Particles crossing the bottom or the
//! top are removed; with recycling they re-enter at the top as haze.

use glam::DVec3;
use rand::Rng;
use rand_distr::Open01;

use super::engine::Particles;
use super::executor::Executor;
use crate::config::{Opts, OptsInit};
use crate::error::{EngineError, Result};

/// Index of the cell containing `p`
fn cell_of(oi: &OptsInit, p: DVec3) -> usize {
    let axis = |n: usize, x: f64, d: f64| {
        if n == 0 {
            0
        } else {
            ((x / d).floor().max(0.0) as usize).min(n - 1)
        }
    };
    oi.cell_index(
        axis(oi.nx, p.x, oi.dx_m),
        axis(oi.ny, p.y, oi.dy_m),
        axis(oi.nz, p.z, oi.dz_m),
    )
}

impl<E: Executor> Particles<E> {
    pub(super) fn sedi_impl(&mut self, opts: &Opts) -> Result<()> {
        self.require_step("step_sedi", self.done.sedi)?;
        self.done.sedi = true;
        if self.opts_init.n_dims() == 0 || (!opts.adve && !opts.sedi) {
            return Ok(());
        }
        if opts.adve && self.env.velocity.is_none() {
            return Err(EngineError::InvalidInput(
                "step_sedi: advection requested but no velocity field was synced".into(),
            ));
        }
        self.invalidate_selection();

        let oi = &self.opts_init;
        let dt = oi.dt_sec;
        let domain = oi.domain_m();
        let present = DVec3::new(
            f64::from(u8::from(oi.nx > 0)),
            f64::from(u8::from(oi.ny > 0)),
            f64::from(u8::from(oi.nz > 0)),
        );
        let vt_model = oi.terminal_velocity;
        let (adve, sedi) = (opts.adve, opts.sedi && oi.nz > 0);

        let cells = self.cell_thermo();
        let ens = &self.ens;
        let velocity = self.env.velocity.as_deref();
        let new_pos = E::map(ens.len(), |i| {
            let c = ens.cell[i];
            let mut d = DVec3::ZERO;
            if let (true, Some(v)) = (adve, velocity) {
                d += v[c] * dt;
            }
            if sedi {
                d.z -= vt_model.velocity(ens.wet_radius(i), cells[c].rho_air) * dt;
            }
            ens.pos[i] + d * present
        });

        let mut keep = vec![true; new_pos.len()];
        let (mut removed, mut recycled) = (0usize, 0usize);
        for (i, mut p) in new_pos.into_iter().enumerate() {
            if domain[0] > 0.0 {
                p.x = p.x.rem_euclid(domain[0]);
            }
            if domain[1] > 0.0 {
                p.y = p.y.rem_euclid(domain[1]);
            }
            if domain[2] > 0.0 && (p.z < 0.0 || p.z >= domain[2]) {
                if p.z < 0.0 {
                    let c = self.ens.cell[i];
                    self.precip_kg[c] += self.ens.n[i] as f64 * self.ens.particle_mass(i);
                }
                if opts.rcyc {
                    p = self.random_top_position();
                    self.ens.to_haze(i);
                    recycled += 1;
                } else {
                    keep[i] = false;
                    removed += 1;
                    continue;
                }
            }
            self.ens.pos[i] = p;
            self.ens.cell[i] = cell_of(&self.opts_init, p);
        }
        if removed > 0 {
            self.ens.retain(&keep);
        }
        log::debug!(
            "step_sedi: {} particle(s) left the domain, {} recycled",
            removed,
            recycled
        );
        Ok(())
    }

    /// Uniform position in the topmost layer of cells
    fn random_top_position(&mut self) -> DVec3 {
        let oi = &self.opts_init;
        let domain = oi.domain_m();
        let mut p = DVec3::ZERO;
        if oi.nx > 0 {
            p.x = self.rng.sample::<f64, _>(Open01) * domain[0];
        }
        if oi.ny > 0 {
            p.y = self.rng.sample::<f64, _>(Open01) * domain[1];
        }
        let u: f64 = self.rng.sample(Open01);
        p.z = ((oi.nz - 1) as f64 + u) * oi.dz_m;
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Constant;
    use crate::particles::{AmbientFields, ParticlesProto, Serial};
    use std::sync::Arc;

    fn column() -> Particles<Serial> {
        let mut oi = OptsInit {
            nz: 4,
            dz_m: 10.0,
            sd_conc: 16,
            ..OptsInit::default()
        };
        oi.dry_distros.insert(0.61, Arc::new(Constant(1e8))).unwrap();
        let mut p = Particles::<Serial>::new(oi);
        p.init(&AmbientFields::uniform(4, 290.0, 0.005, 1.0)).unwrap();
        p
    }

    #[test]
    fn test_cell_of_clamps() {
        let oi = OptsInit {
            nx: 2,
            nz: 3,
            ..OptsInit::default()
        };
        assert_eq!(cell_of(&oi, DVec3::new(1.5, 0.0, 2.5)), oi.cell_index(1, 0, 2));
        assert_eq!(cell_of(&oi, DVec3::new(2.0, 0.0, 3.0)), oi.cell_index(1, 0, 2));
    }

    #[test]
    fn test_uniform_upward_wind_empties_column() {
        let mut p = column();
        let n0 = p.n_sd();
        assert!(n0 > 0);
        let ambient = AmbientFields::uniform(4, 290.0, 0.005, 1.0)
            .with_velocity(vec![DVec3::new(0.0, 0.0, 100.0); 4]);
        p.sync_in(&ambient).unwrap();
        let opts = Opts {
            sedi: false,
            ..Opts::none()
        };
        p.step_sedi(&Opts { adve: true, ..opts }).unwrap();
        assert_eq!(p.n_sd(), 0);
        p.step_async(&Opts::none()).unwrap();
    }

    #[test]
    fn test_recycling_keeps_particles() {
        let mut p = column();
        let n0 = p.n_sd();
        let ambient = AmbientFields::uniform(4, 290.0, 0.005, 1.0)
            .with_velocity(vec![DVec3::new(0.0, 0.0, -100.0); 4]);
        p.sync_in(&ambient).unwrap();
        p.step_sedi(&Opts {
            adve: true,
            rcyc: true,
            ..Opts::none()
        })
        .unwrap();
        assert_eq!(p.n_sd(), n0);
        let z = p.get_attr("z").unwrap();
        assert!(z.iter().all(|&z| (30.0..40.0).contains(&z)));
        assert!(p.precip_kg.iter().sum::<f64>() > 0.0);
    }

    #[test]
    fn test_advection_without_velocity_rejected() {
        let mut p = column();
        p.sync_in(&AmbientFields::uniform(4, 290.0, 0.005, 1.0)).unwrap();
        let err = p.step_sedi(&Opts::default());
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }
}
