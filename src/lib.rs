//! superdroplet - Lagrangian particle-based cloud microphysics
//!
//! Tracks a population of super-droplets (computational particles each
//! standing for many identical real droplets, aerosol particles or ice
//! crystals) through condensation, ice nucleation and deposition,
//! collision-coalescence, advection and sedimentation, with two-way
//! coupling to a host model's thermodynamic fields.

// Allow non-snake-case for physical symbols and unit suffixes in names (T_K, RH_i, etc.)
// This follows the project convention of including units in names.
#![allow(non_snake_case)]

pub mod common;
pub mod config;
pub mod error;
pub mod export;
pub mod particles;
pub mod state;

pub use common::{ConstCp, FreezingModel, InpType, Kernel, TerminalVelocity, Thermodynamics};
pub use config::{Backend, DrySize, Opts, OptsInit, RadiusRange, RunConfig, RunMode};
pub use error::{EngineError, KernelError};
pub use particles::{factory, AmbientFields, EngineState, MomentKind, MomentRecord, ParticlesProto};
pub use state::{Parcel, RunMetrics};
