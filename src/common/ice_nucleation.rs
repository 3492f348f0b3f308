//! Immersion freezing of droplets on insoluble ice-nucleating particles (INPs).
//!
//! Two interchangeable models share the same inputs (INP type and the squared
//! radius of the insoluble core):
//! - singular: a freezing temperature is drawn once per particle by inverting
//!   the cumulative distribution of the ice-active site density,
//! - time-dependent: a per-step freezing probability from a water-activity
//!   based nucleation rate.
//!
//! Both kernels are pure functions; uniform random numbers are supplied by
//! the caller.
//!
//! Reference: Niemand et al., J Atmos Sci 2012 (site density fit)
//! Reference: Shima et al., Geosci Model Dev 2020, eq. 1
//! Reference: Knopf & Alpert, Faraday Discuss 2013 (ABIFM)

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::const_cp::Thermodynamics;
use crate::error::KernelError;

/// Freezing temperature assigned when the insoluble surface is negligible (−38 °C)
pub const T_FREEZE_DEFAULT_K: f64 = 235.15;

/// Type of ice-nucleating particle.
///
/// Configuration may name types this crate has no parametrization for; they
/// are kept as `Other` so the kernels can report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum InpType {
    #[default]
    Mineral,
    Other(String),
}

impl From<String> for InpType {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "mineral" => InpType::Mineral,
            _ => InpType::Other(name),
        }
    }
}

impl From<InpType> for String {
    fn from(t: InpType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for InpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InpType::Mineral => write!(f, "mineral"),
            InpType::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Freezing model selected at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FreezingModel {
    /// Freezing temperature sampled once per particle
    #[default]
    Singular,
    /// Freezing decided every step from `p_freeze`
    TimeDependent,
}

fn insoluble_area(kernel: &'static str, rd2_insol: f64) -> Result<f64, KernelError> {
    if !(rd2_insol >= 0.0) || !rd2_insol.is_finite() {
        return Err(KernelError::invalid(
            kernel,
            format!("squared insoluble radius {rd2_insol:e} m² (must be finite and >= 0)"),
        ));
    }
    Ok(4.0 * PI * rd2_insol)
}

/// Inverse CDF of the singular freezing temperature (K).
///
/// T = 273.15 + (8.934 − ln(−ln(1 − rand) / A)) / 0.517, with A = 4π r²_insol.
/// Returns [`T_FREEZE_DEFAULT_K`] when A is below machine epsilon or the INP
/// type has no singular parametrization. Larger draws map to lower freezing
/// temperatures.
pub fn t_freeze_cdf_inv(inp: &InpType, rd2_insol: f64, rand: f64) -> Result<f64, KernelError> {
    let A = insoluble_area("t_freeze_cdf_inv", rd2_insol)?;
    if *inp != InpType::Mineral || A <= f64::EPSILON {
        return Ok(T_FREEZE_DEFAULT_K);
    }
    if !(rand > 0.0 && rand < 1.0) {
        return Err(KernelError::invalid(
            "t_freeze_cdf_inv",
            format!("random draw {rand} outside (0, 1)"),
        ));
    }
    // -ln(1 - rand) without cancellation for small draws
    let neg_ln_survival = -(-rand).ln_1p();
    Ok(273.15 + (8.934 - (neg_ln_survival / A).ln()) / 0.517)
}

/// Probability that a droplet freezes within one step of length `dt_sec`.
///
/// d_aw = 1 − p_vsi(T)/p_vs(T), J = 10^(−1.35 + 22.62 d_aw),
/// p = 1 − exp(−J A dt). Only mineral INPs are parametrized.
pub fn p_freeze<Th: Thermodynamics + ?Sized>(
    thermo: &Th,
    inp: &InpType,
    rd2_insol: f64,
    T_K: f64,
    dt_sec: f64,
) -> Result<f64, KernelError> {
    if *inp != InpType::Mineral {
        return Err(KernelError::unsupported(
            "p_freeze",
            format!("INP type `{inp}` has no time-dependent freezing parametrization"),
        ));
    }
    let A = insoluble_area("p_freeze", rd2_insol)?;
    if !(T_K > 0.0) || !T_K.is_finite() {
        return Err(KernelError::invalid("p_freeze", format!("temperature {T_K} K")));
    }
    if !(dt_sec >= 0.0) || !dt_sec.is_finite() {
        return Err(KernelError::invalid("p_freeze", format!("timestep {dt_sec} s")));
    }

    let d_aw = 1.0 - thermo.p_vsi(T_K) / thermo.p_vs(T_K);
    let J = 10f64.powf(-1.35 + 22.62 * d_aw);
    let p = -(-J * A * dt_sec).exp_m1();
    // keeps the result inside [0, 1) once exp(-x) underflows the last ulp
    Ok(p.min(1.0 - f64::EPSILON / 2.0))
}
