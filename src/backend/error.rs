//! Defines backend errors.

use thiserror::Error;

use crate::device::error::DeviceError;

/// The normalized failure of a GEMM provider.
///
/// Every provider reports errors in its own shape; adapters translate them into one of these two
/// conditions, keeping the provider's code for diagnostics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The provider's context could not be set up.
    #[error("{provider} initialization failed with code {code}: {message}")]
    Initialization {
        /// The provider name.
        provider: &'static str,
        /// The provider-specific status code.
        code: i32,
        /// A description of the failure.
        message: String,
    },
    /// A submission or synchronization was rejected or failed on the device.
    #[error("{provider} submission failed with code {code}: {message}")]
    Submission {
        /// The provider name.
        provider: &'static str,
        /// The provider-specific status code.
        code: i32,
        /// A description of the failure.
        message: String,
    },
}

impl BackendError {
    /// A submission failure of `provider`.
    pub fn submission(provider: &'static str, code: i32, message: impl Into<String>) -> Self {
        Self::Submission {
            provider,
            code,
            message: message.into(),
        }
    }

    /// An initialization failure of `provider`.
    pub fn initialization(provider: &'static str, code: i32, message: impl Into<String>) -> Self {
        Self::Initialization {
            provider,
            code,
            message: message.into(),
        }
    }

    /// Normalize a device error raised while `provider` submitted or waited for work.
    #[must_use]
    pub fn from_device(provider: &'static str, err: &DeviceError) -> Self {
        Self::submission(provider, err.code(), err.to_string())
    }

    /// The provider that failed.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Initialization { provider, .. } | Self::Submission { provider, .. } => provider,
        }
    }

    /// The provider-specific status code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Initialization { code, .. } | Self::Submission { code, .. } => *code,
        }
    }
}
