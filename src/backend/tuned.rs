//! The hand-tuned tiled kernel.

use tracing::{debug, trace};

use crate::{
    backend::{self, Backend, BackendError, ResultLocation, Ticket},
    context::Context,
    device::NdRange,
    kernel::{self, TileConfig},
    problem::Problem,
};

const NAME: &str = "tuned";

/// The tiled kernel queued on the device, with launch parameters chosen per problem.
#[derive(Debug)]
pub struct TunedKernel {
    work_group_size: usize,
    launch: Option<(Problem, TileConfig)>,
}

impl TunedKernel {
    fn launch_for(&self, problem: Problem) -> TileConfig {
        match self.launch {
            Some((prepared, config)) if prepared == problem => config,
            _ => TileConfig::select(problem, self.work_group_size),
        }
    }
}

impl Backend for TunedKernel {
    fn initialize(ctx: &Context) -> Result<Self, BackendError> {
        let work_group_size = ctx.device().info().work_group_size;
        debug!(provider = NAME, work_group_size, "backend initialized");
        Ok(Self {
            work_group_size,
            launch: None,
        })
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

    fn prepare(&mut self, _ctx: &Context, problem: Problem) -> Result<(), BackendError> {
        let config = TileConfig::select(problem, self.work_group_size);
        trace!(%problem, tile = config.tile, k_block = config.k_block, "launch selected");
        self.launch = Some((problem, config));
        Ok(())
    }

    fn submit(&mut self, ctx: &Context, problem: Problem) -> Result<Ticket, BackendError> {
        let config = self.launch_for(problem);
        let (alpha, beta) = (ctx.config().alpha, ctx.config().beta);
        // Round the global range up so that partial tiles at the edges get a work-group too.
        let global = [
            problem.m.next_multiple_of(config.tile),
            problem.n.next_multiple_of(config.tile),
        ];
        let range = NdRange::tiled(global, [config.tile, config.tile]);
        let event = ctx
            .device()
            .enqueue(NAME, range, move |memory| {
                kernel::tiled(problem, config, alpha, beta, memory.operands(problem)?);
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

impl Drop for TunedKernel {
    fn drop(&mut self) {
        debug!(provider = NAME, "backend released");
    }
}
