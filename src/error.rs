//! Defines the errors that abort a benchmark.

use thiserror::Error;

use crate::{backend::BackendError, config::ConfigError, device::error::DeviceError};

/// A fatal error of a benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The configuration is invalid; no timed work was started.
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    /// The device could not be set up.
    #[error("device failure (code {})", .0.code())]
    Device(#[from] DeviceError),
    /// A backend failed to initialize or to execute; the sweep was aborted.
    #[error("backend `{}` failed", .0.provider())]
    Backend(#[from] BackendError),
}
