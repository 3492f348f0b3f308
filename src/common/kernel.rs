//! Collision kernels for the Monte-Carlo coalescence scheme.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Collision-coalescence kernel K(i, j) (m³/s).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// K = b (V_i + V_j); analytic test kernel
    ///
    /// Source: Golovin, Bull Acad Sci USSR 1963
    Golovin { b: f64 },
    /// Gravitational sweep-out with unit collection efficiency,
    /// K = π (r_i + r_j)² |v_i − v_j|
    Geometric,
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Golovin { b: 1500.0 }
    }
}

impl Kernel {
    /// Kernel value for a pair with wet radii `r_i`, `r_j` and fall speeds `v_i`, `v_j`
    pub fn value(&self, r_i: f64, r_j: f64, v_i: f64, v_j: f64) -> f64 {
        match *self {
            Kernel::Golovin { b } => {
                b * 4.0 / 3.0 * PI * (r_i.powi(3) + r_j.powi(3))
            }
            Kernel::Geometric => {
                let r = r_i + r_j;
                PI * r * r * (v_i - v_j).abs()
            }
        }
    }

    /// Whether evaluation needs terminal velocities
    pub fn needs_velocity(&self) -> bool {
        matches!(self, Kernel::Geometric)
    }
}
