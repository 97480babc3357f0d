//! Uniform submit/synchronize contract over the GEMM providers.
//!
//! A backend is created once before a sweep and torn down when dropped. For every problem it is
//! bound to the shared matrices, prepared, then driven through a sequence of submissions and
//! synchronizations by the timed execution protocol.

use crate::{
    context::Context,
    device::{memory::Matrix, Device, Event},
    problem::Problem,
};

pub mod error;
pub mod host_blas;
pub mod library;
pub mod reference;
pub mod tuned;

pub use error::BackendError;
pub use host_blas::HostBlas;
pub use library::GemmLibrary;
pub use reference::ReferenceKernel;
pub use tuned::TunedKernel;

/// Where the authoritative result of a backend lives after it synchronized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultLocation {
    /// In the device copy of the result matrix; reading it requires a download.
    Device,
    /// In a host buffer owned by the backend.
    Host,
}

/// A handle on a submitted GEMM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ticket {
    /// The GEMM is queued on the device.
    Queued(Event),
    /// The GEMM already completed when the submission returned.
    Completed,
}

/// Operations a GEMM provider must support to be benchmarked.
pub trait Backend {
    /// Set up the provider's context. Called once before the sweep.
    ///
    /// # Errors
    ///
    /// Returns an initialization error if the provider can't be set up.
    fn initialize(ctx: &Context) -> Result<Self, BackendError>
    where
        Self: Sized;

    /// The provider name used in reports and errors.
    fn name(&self) -> &'static str;

    /// Where the result lives once the backend synchronized.
    fn result_location(&self) -> ResultLocation;

    /// Refresh the backend's working copy of the result from the host before a new phase.
    ///
    /// # Errors
    ///
    /// Returns a submission error if the copy fails.
    fn bind(&mut self, ctx: &Context) -> Result<(), BackendError>;

    /// Select launch parameters for `problem`.
    ///
    /// # Errors
    ///
    /// Returns a submission error if the problem can't be handled.
    fn prepare(&mut self, _ctx: &Context, _problem: Problem) -> Result<(), BackendError> {
        Ok(())
    }

    /// Start one GEMM over the region addressed by `problem`.
    ///
    /// # Errors
    ///
    /// Returns a submission error if the provider rejects the call.
    fn submit(&mut self, ctx: &Context, problem: Problem) -> Result<Ticket, BackendError>;

    /// Block until the GEMM behind `ticket` completed.
    ///
    /// # Errors
    ///
    /// Returns a submission error if the provider reports a failure.
    fn wait(&mut self, ctx: &Context, ticket: Ticket) -> Result<(), BackendError>;

    /// Block until every submitted GEMM completed.
    ///
    /// # Errors
    ///
    /// Returns a submission error if the provider reports a failure.
    fn synchronize(&mut self, ctx: &Context) -> Result<(), BackendError>;

    /// The result, for backends whose result lives on the host.
    fn host_result(&self) -> Option<&[f32]> {
        None
    }
}

/// Upload the host result so a device-resident backend starts from the authoritative content.
pub(crate) fn rebind_device(provider: &'static str, ctx: &Context) -> Result<(), BackendError> {
    ctx.device()
        .upload(Matrix::Result, &ctx.host().result)
        .map_err(|err| BackendError::from_device(provider, &err))
}

/// Wait for a ticket of a device-resident backend.
pub(crate) fn wait_device(
    provider: &'static str,
    device: &Device,
    ticket: Ticket,
) -> Result<(), BackendError> {
    match ticket {
        Ticket::Queued(event) => device
            .wait(event)
            .map_err(|err| BackendError::from_device(provider, &err)),
        Ticket::Completed => Ok(()),
    }
}

/// Wait for everything queued on the device.
pub(crate) fn drain_device(provider: &'static str, device: &Device) -> Result<(), BackendError> {
    device
        .wait_all()
        .map_err(|err| BackendError::from_device(provider, &err))
}

/// Reject problems that don't fit the allocated matrices, returning the offending dimension.
pub(crate) fn check_dims(ctx: &Context, problem: Problem) -> Result<(), &'static str> {
    let full = ctx.config().full_problem();
    for (name, dim, limit) in [
        ("m", problem.m, full.m),
        ("n", problem.n, full.n),
        ("k", problem.k, full.k),
    ] {
        if dim == 0 || dim > limit {
            return Err(name);
        }
    }
    Ok(())
}
