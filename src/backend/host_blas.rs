//! Adapter over `matrixmultiply`, a BLAS executing synchronously on the host copies.

use tracing::debug;

use crate::{
    backend::{self, Backend, BackendError, ResultLocation, Ticket},
    context::Context,
    problem::Problem,
};

const NAME: &str = "matrixmultiply";

/// The `matrixmultiply` library running on the host.
///
/// Results are written to a host buffer owned by the backend, so verification never needs a
/// device download.
#[derive(Debug)]
pub struct HostBlas {
    result: Vec<f32>,
}

impl Backend for HostBlas {
    fn initialize(ctx: &Context) -> Result<Self, BackendError> {
        let len = ctx.host().result.len();
        debug!(provider = NAME, len, "backend initialized");
        Ok(Self {
            result: vec![0.0; len],
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn result_location(&self) -> ResultLocation {
        ResultLocation::Host
    }

    fn bind(&mut self, ctx: &Context) -> Result<(), BackendError> {
        self.result.clear();
        self.result.extend_from_slice(&ctx.host().result);
        Ok(())
    }

    #[allow(unsafe_code)]
    fn submit(&mut self, ctx: &Context, problem: Problem) -> Result<Ticket, BackendError> {
        // Codes follow the CBLAS convention of reporting the position of the invalid parameter.
        backend::check_dims(ctx, problem).map_err(|dim| {
            let position = match dim {
                "m" => 4,
                "n" => 5,
                _ => 6,
            };
            BackendError::submission(
                NAME,
                position,
                format!("parameter {position} ({dim}) had an illegal value for {problem}"),
            )
        })?;
        let Problem { m, n, k } = problem;
        let (alpha, beta) = (ctx.config().alpha, ctx.config().beta);
        let host = ctx.host();
        let (a, b, c) = (
            &host.weight[..m * k],
            &host.input[..k * n],
            &mut self.result[..m * n],
        );
        // SAFETY: `a`, `b` and `c` hold exactly `m*k`, `k*n` and `m*n` elements and the strides
        // describe column-major matrices with leading dimensions `m`, `k` and `m`.
        unsafe {
            matrixmultiply::sgemm(
                m,
                k,
                n,
                alpha,
                a.as_ptr(),
                1,
                m as isize,
                b.as_ptr(),
                1,
                k as isize,
                beta,
                c.as_mut_ptr(),
                1,
                m as isize,
            );
        }
        Ok(Ticket::Completed)
    }

    fn wait(&mut self, _ctx: &Context, _ticket: Ticket) -> Result<(), BackendError> {
        Ok(())
    }

    fn synchronize(&mut self, _ctx: &Context) -> Result<(), BackendError> {
        Ok(())
    }

    fn host_result(&self) -> Option<&[f32]> {
        Some(&self.result)
    }
}

impl Drop for HostBlas {
    fn drop(&mut self) {
        debug!(provider = NAME, "backend released");
    }
}
