//! Diffusional growth of liquid droplets (Maxwell-Mason form).
//!
//! r dr/dt = (S − S_eq(r)) / (F_k + F_d)
//!   F_k = (l_v / (R_v T) − 1) · l_v ρ_w / (K T)    (heat conduction)
//!   F_d = ρ_w R_v T / (D p_vs(T))                  (vapour diffusion)
//!
//! Integrated in r² with backward Euler. The implicit step is monotone: an
//! evaporating droplet never overshoots below its dry radius or past
//! equilibrium.
//!
//! Reference: Rogers & Yau, A Short Course in Cloud Physics, 1989, ch. 7

use super::const_cp::{Thermodynamics, RHO_W};
use super::kappa_koehler::s_eq;
use super::roots::bisect;
use crate::error::KernelError;

/// Relative tolerance on r² for the implicit solve
const RW2_REL_TOL: f64 = 1e-12;

/// Combined resistance F_k + F_d (s/m²)
pub fn resistance<Th: Thermodynamics + ?Sized>(thermo: &Th, T_K: f64, D: f64, K: f64) -> f64 {
    let l_v = thermo.l_v(T_K);
    let R_v = thermo.R_v();
    let f_k = (l_v / (R_v * T_K) - 1.0) * l_v * RHO_W / (K * T_K);
    let f_d = RHO_W * R_v * T_K / (D * thermo.p_vs(T_K));
    f_k + f_d
}

/// d(r²)/dt (m²/s) of a droplet at wet radius squared `rw2`
pub fn drw2_dt(rw2: f64, rd3: f64, kappa: f64, rh: f64, T_K: f64, resistance: f64) -> f64 {
    let rw3 = rw2 * rw2.sqrt();
    2.0 * (rh - s_eq(rw3, rd3, kappa, T_K)) / resistance
}

/// One backward-Euler step of r²: solves r²_new = r²_old + dt · f(r²_new).
///
/// The result is bracketed by the dry radius and the explicit upper bound
/// r²_old + dt · 2 rh / (F_k + F_d).
pub fn rw2_implicit_step<Th: Thermodynamics + ?Sized>(
    thermo: &Th,
    rw2_old: f64,
    rd3: f64,
    kappa: f64,
    rh: f64,
    T_K: f64,
    D: f64,
    K: f64,
    dt: f64,
) -> Result<f64, KernelError> {
    if !(rw2_old > 0.0) || !(rd3 > 0.0) {
        return Err(KernelError::invalid(
            "rw2_implicit_step",
            format!("rw2 = {rw2_old:e} m², rd3 = {rd3:e} m³ (must be positive)"),
        ));
    }
    if !(T_K > 0.0) || !(D > 0.0) || !(K > 0.0) || rh < 0.0 || dt < 0.0 {
        return Err(KernelError::invalid(
            "rw2_implicit_step",
            format!("T = {T_K} K, D = {D:e}, K = {K:e}, RH = {rh}, dt = {dt} s"),
        ));
    }
    if dt == 0.0 {
        return Ok(rw2_old);
    }

    let res = resistance(thermo, T_K, D, K);
    let g = |rw2: f64| rw2 - rw2_old - dt * drw2_dt(rw2, rd3, kappa, rh, T_K, res);

    let rd2 = rd3.powf(2.0 / 3.0);
    let lo = rd2 * (1.0 + 1e-12);
    if rw2_old <= lo {
        // already at the dry core; only growth can move it
        let rate = drw2_dt(lo, rd3, kappa, rh, T_K, res);
        if rate <= 0.0 {
            return Ok(rw2_old);
        }
    }

    let f_old = drw2_dt(rw2_old, rd3, kappa, rh, T_K, res);
    if f_old == 0.0 {
        return Ok(rw2_old);
    }
    let (a, b) = if f_old < 0.0 {
        if g(lo) >= 0.0 {
            // full evaporation down to the core within one step
            return Ok(lo);
        }
        (lo, rw2_old)
    } else {
        (rw2_old.max(lo), rw2_old.max(lo) + dt * 2.0 * rh / res)
    };
    Ok(bisect(g, a, b, RW2_REL_TOL * a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::const_cp::ConstCp;
    use crate::common::kappa_koehler::rw3_eq;
    use crate::common::moist_air::{thermal_conductivity, vapour_diffusivity};

    fn coeffs(T: f64) -> (f64, f64) {
        (vapour_diffusivity(T, 9e4), thermal_conductivity(T))
    }

    #[test]
    fn test_evaporation_decreases_radius() {
        let T = 285.0;
        let (D, K) = coeffs(T);
        let rd3 = (0.03e-6f64).powi(3);
        let rw2 = (5e-6f64).powi(2);
        let new = rw2_implicit_step(&ConstCp, rw2, rd3, 0.61, 0.6, T, D, K, 1.0).unwrap();
        assert!(new < rw2);
        assert!(new >= rd3.powf(2.0 / 3.0));
    }

    #[test]
    fn test_growth_in_supersaturation() {
        let T = 285.0;
        let (D, K) = coeffs(T);
        let rd3 = (0.1e-6f64).powi(3);
        let rw2 = (10e-6f64).powi(2);
        let new = rw2_implicit_step(&ConstCp, rw2, rd3, 0.61, 1.01, T, D, K, 1.0).unwrap();
        assert!(new > rw2);
    }

    #[test]
    fn test_equilibrium_is_fixed_point() {
        let T = 280.0;
        let (D, K) = coeffs(T);
        let rd3 = (0.05e-6f64).powi(3);
        let rw3 = rw3_eq(rd3, 0.61, 0.8, T);
        let rw2 = rw3.powf(2.0 / 3.0);
        let new = rw2_implicit_step(&ConstCp, rw2, rd3, 0.61, 0.8, T, D, K, 10.0).unwrap();
        assert!((new - rw2).abs() / rw2 < 1e-6);
    }

    #[test]
    fn test_large_step_does_not_undershoot_equilibrium() {
        let T = 285.0;
        let (D, K) = coeffs(T);
        let rd3 = (0.05e-6f64).powi(3);
        let rw2 = (2e-6f64).powi(2);
        let rh = 0.7;
        let eq = rw3_eq(rd3, 0.61, rh, T).powf(2.0 / 3.0);
        let new = rw2_implicit_step(&ConstCp, rw2, rd3, 0.61, rh, T, D, K, 1e4).unwrap();
        assert!(new >= eq * (1.0 - 1e-6), "new = {}, eq = {}", new, eq);
        assert!(new < rw2);
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let (D, K) = coeffs(280.0);
        let err = rw2_implicit_step(&ConstCp, 0.0, 1e-21, 0.61, 0.9, 280.0, D, K, 1.0);
        assert!(matches!(err, Err(KernelError::InvalidInput { .. })));
    }
}
