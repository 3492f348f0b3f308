//! Transport coefficients and state relations of moist air.
//!
//! Reference: Pruppacher & Klett, Microphysics of Clouds and Precipitation, 1997, ch. 13

use super::const_cp::{P_1000_PA, RHO_W, R_D, R_V, T_0_K};

/// Surface tension of water against air (N/m)
pub const SIGMA_W: f64 = 0.072;

/// Diffusivity of water vapour in air (m²/s)
///
/// D = 2.11e-5 (T/T₀)^1.94 (p₀/p)
/// Source: Hall & Pruppacher, J Atmos Sci 1976
pub fn vapour_diffusivity(T_K: f64, p_Pa: f64) -> f64 {
    2.11e-5 * (T_K / T_0_K).powf(1.94) * (P_1000_PA / p_Pa)
}

/// Thermal conductivity of air (W/m/K)
///
/// K = 4.1868e-3 (5.69 + 0.017 (T - T₀))
/// Source: Pruppacher & Klett 1997, eq. 13-18a
pub fn thermal_conductivity(T_K: f64) -> f64 {
    4.1868e-3 * (5.69 + 0.017 * (T_K - T_0_K))
}

/// Kelvin curvature coefficient A (m) in S_eq = a_w exp(A / r)
pub fn kelvin_coefficient(T_K: f64) -> f64 {
    2.0 * SIGMA_W / (RHO_W * R_V * T_K)
}

/// Total pressure from dry-air density, vapour mixing ratio and temperature (Pa)
pub fn pressure(rhod: f64, rv: f64, T_K: f64) -> f64 {
    rhod * (R_D + rv * R_V) * T_K
}

/// Partial pressure of water vapour (Pa)
pub fn vapour_pressure(rhod: f64, rv: f64, T_K: f64) -> f64 {
    rhod * rv * R_V * T_K
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diffusivity_magnitude() {
        let d = vapour_diffusivity(T_0_K, P_1000_PA);
        assert!((d - 2.11e-5).abs() < 1e-12);
        // Lower pressure, faster diffusion
        assert!(vapour_diffusivity(T_0_K, 5e4) > d);
    }

    #[test]
    fn test_conductivity_magnitude() {
        let k = thermal_conductivity(T_0_K);
        assert!((k - 0.0238).abs() < 1e-3, "K = {}", k);
    }

    #[test]
    fn test_kelvin_coefficient() {
        // ~1.1 nm at 283 K
        let a = kelvin_coefficient(283.0);
        assert!(a > 1.0e-9 && a < 1.2e-9, "A = {}", a);
    }

    #[test]
    fn test_pressure_partition() {
        let (rhod, rv, T) = (1.1, 0.008, 285.0);
        let p = pressure(rhod, rv, T);
        let pv = vapour_pressure(rhod, rv, T);
        assert!((p - pv - rhod * R_D * T).abs() < 1e-6);
    }
}
