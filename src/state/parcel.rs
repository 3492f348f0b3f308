//! Adiabatic parcel rising through a hydrostatic atmosphere.
//!
//! The parcel keeps θ_d and r_v (apart from the microphysics feedback) and
//! follows the hydrostatic pressure; ρ_d is recomputed from the new pressure.

use crate::common::const_cp::{ConstCp, Thermodynamics, C_PD, EPS, G, P_1000_PA, R_D};
use crate::common::moist_air::{pressure, vapour_pressure};
use crate::common::theta_dry;
use crate::particles::AmbientFields;

/// Single-cell parcel state
#[derive(Debug, Clone)]
pub struct Parcel {
    /// Height above the starting level (m)
    pub z_m: f64,
    /// Ascent speed (m/s)
    pub w_m_per_s: f64,
    /// θ_d, r_v and ρ_d of the parcel, as passed to the engine
    pub ambient: AmbientFields,
}

impl Parcel {
    pub fn new(th_K: f64, rv: f64, rhod: f64, w_m_per_s: f64) -> Self {
        Self {
            z_m: 0.0,
            w_m_per_s,
            ambient: AmbientFields::uniform(1, th_K, rv, rhod),
        }
    }

    pub fn th(&self) -> f64 {
        self.ambient.th[0]
    }

    pub fn rv(&self) -> f64 {
        self.ambient.rv[0]
    }

    pub fn rhod(&self) -> f64 {
        self.ambient.rhod[0]
    }

    pub fn T(&self) -> f64 {
        theta_dry::T(self.th(), self.rhod())
    }

    /// Total pressure (Pa)
    pub fn pressure(&self) -> f64 {
        pressure(self.rhod(), self.rv(), self.T())
    }

    /// Relative humidity over liquid water and over ice
    pub fn rh(&self) -> (f64, f64) {
        let T = self.T();
        let p_v = vapour_pressure(self.rhod(), self.rv(), T);
        (p_v / ConstCp.p_vs(T), p_v / ConstCp.p_vsi(T))
    }

    /// Rise for `dt_sec` and update ρ_d to the new hydrostatic pressure
    pub fn ascend(&mut self, dt_sec: f64) {
        let dz = self.w_m_per_s * dt_sec;
        let (th, rv, T) = (self.th(), self.rv(), self.T());
        let p = self.pressure();
        // isothermal layer of depth dz
        let R_m = p / (self.rhod() * (1.0 + rv) * T);
        let p_new = p * (-G * dz / (R_m * T)).exp();

        let p_d = p_new / (1.0 + rv / EPS);
        let T_new = th * (p_d / P_1000_PA).powf(R_D / C_PD);
        self.ambient.rhod[0] = p_d / (R_D * T_new);
        self.z_m += dz;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascent_cools_and_expands() {
        let mut parcel = Parcel::new(292.0, 0.008, 1.1, 2.0);
        let (T0, p0, rhod0) = (parcel.T(), parcel.pressure(), parcel.rhod());
        for _ in 0..100 {
            parcel.ascend(0.1);
        }
        assert!((parcel.z_m - 20.0).abs() < 1e-9);
        assert!(parcel.T() < T0);
        assert!(parcel.rhod() < rhod0);
        // ~ρ g Δz
        let dp = p0 - parcel.pressure();
        let expected = rhod0 * 1.008 * G * 20.0;
        assert!((dp - expected).abs() / expected < 0.01, "dp = {}", dp);
        // θ_d is conserved
        assert_eq!(parcel.th(), 292.0);
    }

    #[test]
    fn test_rh_rises_with_ascent() {
        let mut parcel = Parcel::new(292.0, 0.008, 1.1, 2.0);
        let (rh0, _) = parcel.rh();
        for _ in 0..1000 {
            parcel.ascend(0.1);
        }
        assert!(parcel.rh().0 > rh0);
    }
}
