//! Defines device errors.

use std::io;

use thiserror::Error;

use crate::device::memory::Matrix;

/// An error reported by the device or its command queue.
///
/// Each variant maps to a status code following the OpenCL numbering, see [`DeviceError::code`].
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The worker executing the queue could not be started.
    #[error("device is not available: {0}")]
    Unavailable(#[source] io::Error),
    /// The queue no longer accepts commands.
    #[error("device queue was lost")]
    Lost,
    /// A launch range whose local size doesn't tile the global size.
    #[error("invalid work-group size {local:?} for global range {global:?}")]
    InvalidWorkGroupSize {
        /// The global range of the launch.
        global: [usize; 2],
        /// The local range of the launch.
        local: [usize; 2],
    },
    /// An access past the end of a device buffer.
    #[error("buffer `{matrix}` holds {available} elements but {requested} were addressed")]
    InvalidBufferSize {
        /// The addressed buffer.
        matrix: Matrix,
        /// Number of addressed elements.
        requested: usize,
        /// Number of elements in the buffer.
        available: usize,
    },
    /// A command panicked while executing on the device.
    #[error("command `{0}` aborted while executing")]
    CommandAborted(&'static str),
}

impl DeviceError {
    /// The status code of the error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Unavailable(_) => -2,
            Self::CommandAborted(_) => -5,
            Self::Lost => -36,
            Self::InvalidWorkGroupSize { .. } => -54,
            Self::InvalidBufferSize { .. } => -61,
        }
    }
}
