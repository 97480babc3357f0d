//! Numerical agreement between the baseline and candidate results.

use std::borrow::Cow;

use crate::{
    backend::{Backend, BackendError, ResultLocation},
    context::Context,
    device::{error::DeviceError, memory::Matrix},
    problem::Problem,
};

/// Make the result of `backend` for `problem` host-visible.
///
/// Device-resident results are downloaded; host-resident results are borrowed as they are. Only
/// the leading `m x n` region is returned, the rest of the buffer is stale.
///
/// # Errors
///
/// Returns an error if the download fails.
pub fn capture<'b, B: Backend>(
    backend: &'b B,
    ctx: &Context,
    problem: Problem,
) -> Result<Cow<'b, [f32]>, BackendError> {
    let len = problem.output_len();
    match (backend.result_location(), backend.host_result()) {
        (ResultLocation::Host, Some(result)) => match result.get(..len) {
            Some(region) => Ok(Cow::Borrowed(region)),
            None => Err(BackendError::from_device(
                backend.name(),
                &DeviceError::InvalidBufferSize {
                    matrix: Matrix::Result,
                    requested: len,
                    available: result.len(),
                },
            )),
        },
        _ => ctx
            .device()
            .download(Matrix::Result, len)
            .map(Cow::Owned)
            .map_err(|err| BackendError::from_device(backend.name(), &err)),
    }
}

/// Sum of squared differences over the region both slices cover.
///
/// Accumulated in `f64`. The inputs are only read, so repeated calls return the same value.
#[must_use]
pub fn delta(expected: &[f32], actual: &[f32]) -> f64 {
    expected
        .iter()
        .zip(actual)
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::ReferenceKernel, config::Config};

    #[test]
    fn identical_results_agree() {
        let values = [0.5f32, -1.25, 3.0, 7.75];
        assert_eq!(delta(&values, &values), 0.0);
    }

    #[test]
    fn squared_differences() {
        let expected = [1.0f32, 2.0, 3.0];
        let actual = [1.0f32, 4.0, 0.0];
        assert_eq!(delta(&expected, &actual), 13.0);
        assert_eq!(delta(&expected, &actual), delta(&expected, &actual));
    }

    #[test]
    fn capture_downloads_active_region() {
        let ctx = Context::new(Config {
            m: 64,
            n: 64,
            k: 32,
            ..Config::default()
        })
        .unwrap();
        let backend = ReferenceKernel::initialize(&ctx).unwrap();
        let result = capture(&backend, &ctx, Problem::new(32, 32, 32)).unwrap();
        assert_eq!(result.len(), 32 * 32);
        assert!(matches!(result, Cow::Owned(_)));
    }
}
