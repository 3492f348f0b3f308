//! Columnar storage of super-droplet attributes.

use std::f64::consts::PI;

use glam::DVec3;

use crate::common::const_cp::RHO_W;
use crate::common::ice_deposition::spheroid_volume;

/// One super-droplet, used when adding particles to the ensemble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperDroplet {
    pub n: u64,
    pub rd3: f64,
    pub kpa: f64,
    pub rw2: f64,
    pub rd2_insol: f64,
    pub T_freeze: f64,
    pub ice_a: f64,
    pub ice_c: f64,
    pub ice_rho: f64,
    pub pos: DVec3,
    pub cell: usize,
}

/// Attribute columns, aligned by particle index.
#[derive(Debug, Clone, Default)]
pub struct Ensemble {
    pub n: Vec<u64>,
    pub rd3: Vec<f64>,
    pub kpa: Vec<f64>,
    pub rw2: Vec<f64>,
    pub rd2_insol: Vec<f64>,
    pub T_freeze: Vec<f64>,
    pub ice_a: Vec<f64>,
    pub ice_c: Vec<f64>,
    pub ice_rho: Vec<f64>,
    pub pos: Vec<DVec3>,
    pub cell: Vec<usize>,
}

fn retain_by<T>(v: &mut Vec<T>, keep: &[bool]) {
    let mut idx = 0;
    v.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

impl Ensemble {
    pub fn len(&self) -> usize {
        self.n.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n.is_empty()
    }

    pub fn push(&mut self, sd: SuperDroplet) {
        self.n.push(sd.n);
        self.rd3.push(sd.rd3);
        self.kpa.push(sd.kpa);
        self.rw2.push(sd.rw2);
        self.rd2_insol.push(sd.rd2_insol);
        self.T_freeze.push(sd.T_freeze);
        self.ice_a.push(sd.ice_a);
        self.ice_c.push(sd.ice_c);
        self.ice_rho.push(sd.ice_rho);
        self.pos.push(sd.pos);
        self.cell.push(sd.cell);
    }

    /// Keep only the particles whose `keep` entry is true
    pub fn retain(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.len());
        retain_by(&mut self.n, keep);
        retain_by(&mut self.rd3, keep);
        retain_by(&mut self.kpa, keep);
        retain_by(&mut self.rw2, keep);
        retain_by(&mut self.rd2_insol, keep);
        retain_by(&mut self.T_freeze, keep);
        retain_by(&mut self.ice_a, keep);
        retain_by(&mut self.ice_c, keep);
        retain_by(&mut self.ice_rho, keep);
        retain_by(&mut self.pos, keep);
        retain_by(&mut self.cell, keep);
    }

    /// Drop particles with zero multiplicity; returns how many were removed
    pub fn compact(&mut self) -> usize {
        let keep: Vec<bool> = self.n.iter().map(|&n| n > 0).collect();
        let removed = keep.iter().filter(|&&k| !k).count();
        if removed > 0 {
            self.retain(&keep);
        }
        removed
    }

    #[inline]
    pub fn is_ice(&self, i: usize) -> bool {
        self.ice_a[i] > 0.0
    }

    /// Wet radius; volume-equivalent radius for ice (m)
    pub fn wet_radius(&self, i: usize) -> f64 {
        if self.is_ice(i) {
            (self.ice_a[i] * self.ice_a[i] * self.ice_c[i]).cbrt()
        } else {
            self.rw2[i].sqrt()
        }
    }

    pub fn dry_radius(&self, i: usize) -> f64 {
        self.rd3[i].cbrt()
    }

    /// Water or ice mass carried by one real particle (kg)
    pub fn particle_mass(&self, i: usize) -> f64 {
        if self.is_ice(i) {
            self.ice_rho[i] * spheroid_volume(self.ice_a[i], self.ice_c[i])
        } else {
            liquid_mass(self.rw2[i])
        }
    }

    /// Turn particle `i` into liquid haze at its dry radius
    pub fn to_haze(&mut self, i: usize) {
        self.rw2[i] = self.rd3[i].powf(2.0 / 3.0);
        self.ice_a[i] = 0.0;
        self.ice_c[i] = 0.0;
        self.ice_rho[i] = 0.0;
    }
}

/// Mass of a liquid drop with wet radius squared `rw2` (kg)
pub fn liquid_mass(rw2: f64) -> f64 {
    4.0 / 3.0 * PI * RHO_W * rw2 * rw2.sqrt()
}
