//! A benchmarking and verification harness for dense matrix-multiplication (GEMM) kernels.
//!
//! The harness sweeps a space of sub-problems of a configured `M x N x K` multiplication
//! `C = alpha * A * B + beta * C`, times a candidate backend against a reference kernel on each of
//! them and optionally reports how far the two results are apart.

#![deny(unsafe_code, rust_2018_idioms, rust_2021_compatibility)]
#![warn(missing_docs)]

pub mod backend;
pub mod bench;
pub mod cancel;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod kernel;
pub mod problem;
pub mod protocol;
pub mod repetition;
pub mod report;
pub mod verify;

pub use bench::{run, Summary};
pub use config::{BackendKind, Config, ConfigError};
pub use error::BenchError;
