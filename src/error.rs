//! Typed errors for microphysics kernels and the particle engine.
//!
//! Kernel failures carry the kernel name and the offending input so that a
//! failed step can be reported without further context. Engine errors wrap
//! kernel errors unchanged.

use crate::config::Backend;

/// Errors raised by the pure per-particle kernels in [`crate::common`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// Physically malformed input (non-positive radius, negative area, ...).
    #[error("{kernel}: invalid input: {detail}")]
    InvalidInput { kernel: &'static str, detail: String },

    /// Parametrization not available for the requested configuration.
    #[error("{kernel}: unsupported configuration: {detail}")]
    UnsupportedConfig { kernel: &'static str, detail: String },
}

impl KernelError {
    pub(crate) fn invalid(kernel: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            kernel,
            detail: detail.into(),
        }
    }

    pub(crate) fn unsupported(kernel: &'static str, detail: impl Into<String>) -> Self {
        Self::UnsupportedConfig {
            kernel,
            detail: detail.into(),
        }
    }
}

/// Errors raised by the particle engine.
///
/// Every variant is fatal for the run: a step that returned an error may have
/// partially updated the ensemble and there is no rollback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Engine operation issued in the wrong protocol state.
    #[error("precondition violation: `{op}` called while engine is {state}")]
    PreconditionViolation { op: &'static str, state: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported configuration: {0}")]
    UnsupportedConfig(String),

    #[error("backend {0:?} is not available in this build")]
    BackendUnavailable(Backend),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kernel_and_input() {
        let err = KernelError::invalid("capacitance", "ice_a = 0 m is below machine epsilon");
        let msg = err.to_string();
        assert!(msg.contains("capacitance"));
        assert!(msg.contains("ice_a = 0 m"));
    }

    #[test]
    fn kernel_error_passes_through_engine_error() {
        let err: EngineError = KernelError::unsupported("p_freeze", "INP type `soot`").into();
        assert_eq!(err.to_string(), "p_freeze: unsupported configuration: INP type `soot`");
        assert!(matches!(err, EngineError::Kernel(KernelError::UnsupportedConfig { .. })));
    }

    #[test]
    fn precondition_message() {
        let err = EngineError::PreconditionViolation {
            op: "step_cond",
            state: "uninitialized".into(),
        };
        assert!(err.to_string().contains("step_cond"));
        assert!(err.to_string().contains("uninitialized"));
    }

    #[test]
    fn backend_unavailable() {
        let err = EngineError::BackendUnavailable(Backend::Accelerator);
        assert!(err.to_string().contains("Accelerator"));
    }
}
