//! Vapour deposition growth of spheroidal ice crystals.
//!
//! Crystals are spheroids with equatorial radius `a` and polar radius `c`
//! (c < a: plates, c > a: columns). Mass growth follows the electrostatic
//! analogy with the spheroid capacitance; the added mass is distributed over
//! the axes with the inherent growth ratio and deposited at a density that
//! depends on the vapour excess.
//!
//! Reference: Pruppacher & Klett 1997, eq. 13-78 (capacitance)
//! Reference: Chen & Lamb, J Atmos Sci 1994 (axis growth, deposition density)

use std::f64::consts::PI;

use super::const_cp::Thermodynamics;
use crate::error::KernelError;

/// Below this eccentricity the closed forms lose precision
const E_SERIES: f64 = 1e-4;

/// Vapour-density excess below which deposition is at bulk density (kg/m³)
const D_RHOV_THRESHOLD: f64 = 5e-5;

/// Equatorial radius below which plate-like crystals keep bulk density (m)
const A_BULK_MAX_M: f64 = 1e-4;

/// Capacitance of a spheroid (m).
pub fn capacitance(a: f64, c: f64) -> Result<f64, KernelError> {
    if !(a > f64::EPSILON) || !a.is_finite() {
        return Err(KernelError::invalid(
            "capacitance",
            format!("ice_a = {a:e} m must exceed machine epsilon"),
        ));
    }
    if !(c > 0.0) || !c.is_finite() {
        return Err(KernelError::invalid(
            "capacitance",
            format!("ice_c = {c:e} m (must be finite and > 0)"),
        ));
    }

    let phi = c / a;
    if phi < 1.0 {
        // oblate
        let e = ((1.0 - phi) * (1.0 + phi)).sqrt();
        let ratio = if e < E_SERIES {
            let e2 = e * e;
            1.0 - e2 / 6.0 - 17.0 * e2 * e2 / 360.0
        } else {
            e / e.asin()
        };
        Ok(a * ratio)
    } else {
        // prolate
        let e = ((phi - 1.0) * (phi + 1.0)).sqrt() / phi;
        let ratio = if e < E_SERIES {
            let e2 = e * e;
            1.0 - e2 / 3.0 - 4.0 * e2 * e2 / 45.0
        } else {
            e / e.atanh()
        };
        Ok(c * ratio)
    }
}

/// Rate of change of crystal mass (kg/s).
///
/// dm/dt = 4π C (1 − 1/RH_i) / (1/(D ρ_v) + L_s/(K RH_i T) (L_s/(R_v T) − 1))
#[allow(clippy::too_many_arguments)]
pub fn dmi_dt<Th: Thermodynamics + ?Sized>(
    thermo: &Th,
    D: f64,
    K: f64,
    rho_v: f64,
    T_K: f64,
    RH_i: f64,
    a: f64,
    c: f64,
) -> Result<f64, KernelError> {
    if !(D > 0.0) || !(K > 0.0) || !(rho_v > 0.0) || !(T_K > 0.0) || !(RH_i > 0.0) {
        return Err(KernelError::invalid(
            "dmi_dt",
            format!("D = {D:e}, K = {K:e}, rho_v = {rho_v:e}, T = {T_K} K, RH_i = {RH_i}"),
        ));
    }
    let C = capacitance(a, c)?;
    let l_s = thermo.l_s(T_K);
    let R_v = thermo.R_v();

    let diffusion = 1.0 / (D * rho_v);
    let conduction = l_s / (K * RH_i * T_K) * (l_s / (R_v * T_K) - 1.0);
    Ok(4.0 * PI * C * (1.0 - 1.0 / RH_i) / (diffusion + conduction))
}

/// Density of freshly deposited ice (kg/m³).
///
/// Small plate-like crystals deposit at bulk density; otherwise density
/// decays with the vapour-density excess over ice saturation `d_rhov`.
pub fn rho_dep<Th: Thermodynamics + ?Sized>(thermo: &Th, T_K: f64, d_rhov: f64, a: f64) -> f64 {
    let rho_i = thermo.rho_i();
    if thermo.lambda(T_K) < 1.0 && a < A_BULK_MAX_M {
        return rho_i;
    }
    rho_i * (-3.0 * (d_rhov - D_RHOV_THRESHOLD).max(0.0) / thermo.gamma(T_K)).exp()
}

/// New axes after the crystal volume changed from `v_old` to `v_new`.
///
/// Growth follows d ln c = Γ d ln a; sublimation shrinks both axes alike.
/// Returns `(0, 0)` when nothing is left.
pub fn grow_axes(a: f64, c: f64, v_old: f64, v_new: f64, growth_ratio: f64) -> (f64, f64) {
    if v_new <= 0.0 || v_old <= 0.0 {
        return (0.0, 0.0);
    }
    let ratio = v_new / v_old;
    if ratio >= 1.0 {
        let denom = 2.0 + growth_ratio;
        (a * ratio.powf(1.0 / denom), c * ratio.powf(growth_ratio / denom))
    } else {
        let s = ratio.cbrt();
        (a * s, c * s)
    }
}

/// Volume of a spheroid with semi-axes (a, a, c) (m³)
pub fn spheroid_volume(a: f64, c: f64) -> f64 {
    4.0 / 3.0 * PI * a * a * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::const_cp::{ConstCp, RHO_I};

    #[test]
    fn test_sphere_limit() {
        let a = 50e-6;
        assert!((capacitance(a, a).unwrap() - a).abs() < 1e-18);
    }

    #[test]
    fn test_continuity_across_sphere() {
        let a = 50e-6;
        for d in [1e-3, 1e-5, 1e-9, 1e-12] {
            let below = capacitance(a, a * (1.0 - d)).unwrap();
            let above = capacitance(a, a * (1.0 + d)).unwrap();
            assert!((below - a).abs() / a < 2.0 * d, "oblate d = {}", d);
            assert!((above - a).abs() / a < 2.0 * d, "prolate d = {}", d);
        }
    }

    #[test]
    fn test_thin_plate_limit() {
        // disc: C -> 2a/π
        let a = 1e-4;
        let c = capacitance(a, a * 1e-8).unwrap();
        assert!((c - 2.0 * a / PI).abs() / a < 1e-6);
    }

    #[test]
    fn test_series_matches_closed_form() {
        // just above the switch, closed form and series agree
        let a = 1e-5;
        let phi = (1.0 - (2.0 * E_SERIES).powi(2)).sqrt();
        let e = ((1.0 - phi) * (1.0 + phi)).sqrt();
        let closed = a * e / e.asin();
        let e2 = e * e;
        let series = a * (1.0 - e2 / 6.0 - 17.0 * e2 * e2 / 360.0);
        assert!((closed - series).abs() / a < 1e-12);
    }

    #[test]
    fn test_rejects_tiny_axis() {
        assert!(matches!(
            capacitance(0.0, 1e-6),
            Err(KernelError::InvalidInput { .. })
        ));
        assert!(capacitance(f64::EPSILON / 2.0, 1e-6).is_err());
        assert!(capacitance(1e-6, 0.0).is_err());
    }

    #[test]
    fn test_dmi_dt_sign() {
        let (D, K, rho_v, T) = (2e-5, 2.3e-2, 1e-3, 260.0);
        let (a, c) = (20e-6, 10e-6);
        let th = ConstCp;
        assert_eq!(dmi_dt(&th, D, K, rho_v, T, 1.0, a, c).unwrap(), 0.0);
        assert!(dmi_dt(&th, D, K, rho_v, T, 1.1, a, c).unwrap() > 0.0);
        assert!(dmi_dt(&th, D, K, rho_v, T, 0.9, a, c).unwrap() < 0.0);
    }

    #[test]
    fn test_rho_dep_regimes() {
        let th = ConstCp;
        // plate regime (Γ < 1 near -15 °C), small crystal
        assert_eq!(rho_dep(&th, 258.15, 1e-3, 50e-6), RHO_I);
        // column regime, below the excess threshold
        assert_eq!(rho_dep(&th, 267.15, 1e-5, 50e-6), RHO_I);
        // column regime, strong excess lowers density
        assert!(rho_dep(&th, 267.15, 1e-3, 50e-6) < RHO_I);
    }

    #[test]
    fn test_grow_axes_conserves_volume_ratio() {
        let (a, c) = (20e-6, 30e-6);
        let v0 = spheroid_volume(a, c);
        for g in [0.3, 1.0, 1.7] {
            let (a1, c1) = grow_axes(a, c, v0, 2.0 * v0, g);
            assert!((spheroid_volume(a1, c1) / v0 - 2.0).abs() < 1e-12);
        }
        // columnar habit elongates
        let (a1, c1) = grow_axes(a, a, 1.0, 8.0, 1.7);
        assert!(c1 / a1 > 1.0);
        // sublimation keeps the aspect ratio
        let (a2, c2) = grow_axes(a, c, v0, 0.5 * v0, 1.7);
        assert!((c2 / a2 - c / a).abs() < 1e-12);
        assert_eq!(grow_axes(a, c, v0, 0.0, 1.0), (0.0, 0.0));
    }
}
