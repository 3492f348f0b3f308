//! Terminal fall speed of liquid drops.
//!
//! Reference: Rogers & Yau, A Short Course in Cloud Physics, 1989, ch. 8

use serde::{Deserialize, Serialize};

/// Reference air density for the large-drop regime (kg/m³)
const RHO_AIR_REF: f64 = 1.2;

/// Terminal velocity parametrization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TerminalVelocity {
    /// Piecewise power law in radius
    #[default]
    RogersYau,
}

impl TerminalVelocity {
    /// Fall speed (m/s, positive downward) of a drop with radius `r_m` in air
    /// of density `rho_air`.
    pub fn velocity(&self, r_m: f64, rho_air: f64) -> f64 {
        match self {
            TerminalVelocity::RogersYau => {
                if r_m <= 0.0 {
                    0.0
                } else if r_m < 40e-6 {
                    // Stokes regime
                    1.19e8 * r_m * r_m
                } else if r_m < 0.6e-3 {
                    8e3 * r_m
                } else {
                    220.0 * (RHO_AIR_REF / rho_air).sqrt() * r_m.sqrt()
                }
            }
        }
    }
}
