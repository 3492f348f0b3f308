//! Driver-side state: the rising parcel and per-step run metrics.

mod metrics;
mod parcel;

pub use metrics::{RunMetrics, CLOUD_R_MIN_M};
pub use parcel::Parcel;
