//! Pure per-particle microphysics kernels and thermodynamic relations.
//!
//! Everything here is stateless and safe to call from parallel iterators.

pub mod const_cp;
pub mod ice_deposition;
pub mod ice_nucleation;
pub mod kappa_koehler;
pub mod kernel;
pub mod maxwell_mason;
pub mod moist_air;
pub mod roots;
pub mod terminal_velocity;
pub mod theta_dry;
pub mod unary_function;

pub use const_cp::{ConstCp, Thermodynamics};
pub use ice_nucleation::{FreezingModel, InpType};
pub use kernel::Kernel;
pub use terminal_velocity::TerminalVelocity;
pub use unary_function::{Constant, Exponential, Lognormal, Sum, UnaryFunction};
