//! The baseline kernel: one work item per output element.

use tracing::debug;

use crate::{
    backend::{self, Backend, BackendError, ResultLocation, Ticket},
    context::Context,
    device::NdRange,
    kernel,
    problem::Problem,
};

const NAME: &str = "reference";

/// The reference kernel queued on the device. Always used as the baseline.
#[derive(Debug, Default)]
pub struct ReferenceKernel {
    _private: (),
}

impl Backend for ReferenceKernel {
    fn initialize(_ctx: &Context) -> Result<Self, BackendError> {
        debug!(provider = NAME, "backend initialized");
        Ok(Self::default())
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn result_location(&self) -> ResultLocation {
        ResultLocation::Device
    }

    fn bind(&mut self, ctx: &Context) -> Result<(), BackendError> {
        backend::rebind_device(NAME, ctx)
    }

    fn submit(&mut self, ctx: &Context, problem: Problem) -> Result<Ticket, BackendError> {
        let (alpha, beta) = (ctx.config().alpha, ctx.config().beta);
        let event = ctx
            .device()
            .enqueue(NAME, NdRange::global([problem.m, problem.n]), move |memory| {
                kernel::reference(problem, alpha, beta, memory.operands(problem)?);
                Ok(())
            })
            .map_err(|err| BackendError::from_device(NAME, &err))?;
        Ok(Ticket::Queued(event))
    }

    fn wait(&mut self, ctx: &Context, ticket: Ticket) -> Result<(), BackendError> {
        backend::wait_device(NAME, ctx.device(), ticket)
    }

    fn synchronize(&mut self, ctx: &Context) -> Result<(), BackendError> {
        backend::drain_device(NAME, ctx.device())
    }
}

impl Drop for ReferenceKernel {
    fn drop(&mut self) {
        debug!(provider = NAME, "backend released");
    }
}
