//! Engine options and driver run configuration.

mod options;
mod run;

pub use options::{Backend, DryDistros, DrySize, Opts, OptsInit, RadiusRange};
pub use run::{DistroSpec, RunConfig, RunMode, SpectrumSpec};
