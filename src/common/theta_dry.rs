//! Conversions for dry-air potential temperature θ_d.
//!
//! θ_d = T (p_1000 / p_d)^(R_d/c_pd), with p_d = ρ_d R_d T. The host model
//! advects θ_d and ρ_d; the engine recovers T from the pair.

use super::const_cp::{C_PD, P_1000_PA, R_D};

const KAPPA: f64 = R_D / C_PD;

/// Temperature from dry potential temperature and dry-air density (K)
pub fn T(th_K: f64, rhod: f64) -> f64 {
    (th_K * (rhod * R_D / P_1000_PA).powf(KAPPA)).powf(1.0 / (1.0 - KAPPA))
}

/// Dry potential temperature from temperature and dry-air partial pressure (K)
pub fn th(T_K: f64, p_d_Pa: f64) -> f64 {
    T_K * (P_1000_PA / p_d_Pa).powf(KAPPA)
}

/// Change of θ_d caused by a heat input per unit mass of dry air (J/kg) at fixed ρ_d.
pub fn d_th(th_K: f64, T_K: f64, heat_J_per_kg: f64) -> f64 {
    heat_J_per_kg / C_PD * th_K / T_K
}
