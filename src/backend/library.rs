//! Adapter over the `gemm` crate, queued on the device like an accelerator BLAS.

use std::sync::Arc;

use gemm::Parallelism;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::{
    backend::{self, Backend, BackendError, ResultLocation, Ticket},
    context::Context,
    device::{memory::Operands, NdRange},
    problem::Problem,
};

const NAME: &str = "gemm";

/// Status codes of the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
enum Status {
    ThreadPool = -1,
    InvalidDimension = 1,
}

/// The `gemm` library executing on the device queue.
///
/// The library context is a thread pool owned by the backend for the lifetime of the sweep; the
/// queued calls keep it alive until they completed.
#[derive(Debug)]
pub struct GemmLibrary {
    pool: Arc<ThreadPool>,
}

impl Backend for GemmLibrary {
    fn initialize(ctx: &Context) -> Result<Self, BackendError> {
        let threads = ctx.device().info().compute_units.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gemm-{i}"))
            .build()
            .map_err(|err| {
                BackendError::initialization(NAME, Status::ThreadPool as i32, err.to_string())
            })?;
        debug!(provider = NAME, threads, "backend initialized");
        Ok(Self {
            pool: Arc::new(pool),
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

    #[allow(unsafe_code)]
    fn submit(&mut self, ctx: &Context, problem: Problem) -> Result<Ticket, BackendError> {
        backend::check_dims(ctx, problem).map_err(|dim| {
            BackendError::submission(
                NAME,
                Status::InvalidDimension as i32,
                format!("invalid dimension {dim} for {problem}"),
            )
        })?;
        let (alpha, beta) = (ctx.config().alpha, ctx.config().beta);
        let pool = Arc::clone(&self.pool);
        let event = ctx
            .device()
            .enqueue(NAME, NdRange::global([problem.m, problem.n]), move |memory| {
                let Problem { m, n, k } = problem;
                let Operands { a, b, c } = memory.operands(problem)?;
                let parallelism = Parallelism::Rayon(pool.current_num_threads());
                pool.install(|| {
                    // SAFETY: the operands are exactly `m*k`, `k*n` and `m*n` elements long and
                    // the strides describe column-major matrices with leading dimensions `m`, `k`
                    // and `m`, so every addressed element is in bounds.
                    unsafe {
                        gemm::gemm(
                            m,
                            n,
                            k,
                            c.as_mut_ptr(),
                            m as isize,
                            1,
                            beta != 0.0,
                            a.as_ptr(),
                            m as isize,
                            1,
                            b.as_ptr(),
                            k as isize,
                            1,
                            // The library scales the destination by its `alpha` and the product
                            // by its `beta`.
                            beta,
                            alpha,
                            false,
                            false,
                            false,
                            parallelism,
                        );
                    }
                });
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

impl Drop for GemmLibrary {
    fn drop(&mut self) {
        debug!(provider = NAME, "backend released");
    }
}
