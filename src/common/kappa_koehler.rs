//! κ-Köhler equilibrium of haze and cloud droplets.
//!
//! S_eq(r) = a_w(r) · exp(A / r), with water activity
//! a_w = (r³ − r_d³) / (r³ − r_d³ (1 − κ)).
//!
//! Reference: Petters & Kreidenweis, Atmos Chem Phys 2007

use super::moist_air::kelvin_coefficient;
use super::roots::bisect_geometric;

/// Largest wet radius considered when solving for equilibrium (m)
const RW_EQ_MAX_M: f64 = 1.0e-3;

/// Water activity of a solution droplet
pub fn a_w(rw3: f64, rd3: f64, kappa: f64) -> f64 {
    (rw3 - rd3) / (rw3 - rd3 * (1.0 - kappa))
}

/// Equilibrium saturation ratio over a droplet with wet radius cubed `rw3`
pub fn s_eq(rw3: f64, rd3: f64, kappa: f64, T_K: f64) -> f64 {
    let rw = rw3.cbrt();
    a_w(rw3, rd3, kappa) * (kelvin_coefficient(T_K) / rw).exp()
}

/// Wet radius cubed of a droplet in equilibrium with relative humidity `rh` < 1.
///
/// Below the Köhler maximum S_eq grows monotonically from 0 at r = r_d, so the
/// root for rh < 1 is unique. Solved on the excess water volume r³ − r_d³.
pub fn rw3_eq(rd3: f64, kappa: f64, rh: f64, T_K: f64) -> f64 {
    if rh <= 0.0 || kappa <= 0.0 {
        return rd3;
    }
    let A = kelvin_coefficient(T_K);
    // activity written in x directly, r³ − r_d³ cancels badly for thin films
    let excess = |x: f64| x / (x + kappa * rd3) * (A / (rd3 + x).cbrt()).exp() - rh;
    let lo = rd3 * 1e-16;
    let hi = RW_EQ_MAX_M.powi(3);
    if excess(lo) >= 0.0 {
        return rd3 + lo;
    }
    if excess(hi) <= 0.0 {
        return rd3 + hi;
    }
    rd3 + bisect_geometric(excess, lo, hi, 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_limits() {
        let rd3 = 1e-21;
        assert_eq!(a_w(rd3, rd3, 0.61), 0.0);
        // Dilute droplet approaches pure water
        assert!(a_w(1e-12, rd3, 0.61) > 0.999_999);
    }

    #[test]
    fn test_equilibrium_matches_rh() {
        let rd3 = (0.03e-6f64).powi(3);
        let rh = 0.9;
        let rw3 = rw3_eq(rd3, 0.61, rh, 285.0);
        assert!(rw3 > rd3);
        assert!((s_eq(rw3, rd3, 0.61, 285.0) - rh).abs() < 1e-9);
    }

    #[test]
    fn test_equilibrium_grows_with_rh() {
        let rd3 = (0.05e-6f64).powi(3);
        let r_low = rw3_eq(rd3, 0.61, 0.5, 280.0);
        let r_high = rw3_eq(rd3, 0.61, 0.95, 280.0);
        assert!(r_high > r_low);
    }

    #[test]
    fn test_insoluble_particle_stays_dry() {
        let rd3 = 1e-21;
        assert_eq!(rw3_eq(rd3, 0.0, 0.9, 280.0), rd3);
        assert_eq!(rw3_eq(rd3, 0.61, 0.0, 280.0), rd3);
    }
}
