//! The benchmark driver: sweeps the problem space and compares a candidate backend against the
//! reference kernel.

use tracing::{info, warn};

use crate::{
    backend::{Backend, BackendError, GemmLibrary, HostBlas, ReferenceKernel, TunedKernel},
    cancel::CancelToken,
    config::{BackendKind, Config},
    context::Context,
    error::BenchError,
    protocol::{self, Discipline},
    report::{Record, Reporter},
    repetition::RepetitionModel,
    verify,
};

/// What a sweep got through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Number of problems measured and reported.
    pub problems: usize,
    /// Whether the sweep stopped early because cancellation was requested.
    pub cancelled: bool,
}

/// Run the whole benchmark described by `config`.
///
/// An empty problem space completes immediately without touching the device or the reporter.
/// Backends are created once before the sweep and released once after it, whether it succeeded or
/// not.
///
/// # Errors
///
/// Returns the first configuration, device or backend error. No record is reported for a problem
/// whose measurement failed.
pub fn run(
    config: Config,
    cancel: &CancelToken,
    reporter: &mut dyn Reporter,
) -> Result<Summary, BenchError> {
    config.validate()?;
    if config.problem_space()?.is_empty() {
        info!(
            m = config.m,
            n = config.n,
            k = config.k,
            "no problem in the sweep"
        );
        return Ok(Summary::default());
    }
    reporter.begin(&config);

    let ctx = Context::new(config)?;
    let baseline = ReferenceKernel::initialize(&ctx)?;
    let summary = match ctx.config().backend {
        BackendKind::Tuned => run_with::<_, TunedKernel>(&ctx, baseline, cancel, reporter)?,
        BackendKind::Reference => {
            run_with::<_, ReferenceKernel>(&ctx, baseline, cancel, reporter)?
        }
        BackendKind::Gemm => run_with::<_, GemmLibrary>(&ctx, baseline, cancel, reporter)?,
        BackendKind::MatrixMultiply => {
            run_with::<_, HostBlas>(&ctx, baseline, cancel, reporter)?
        }
    };
    info!(
        problems = summary.problems,
        cancelled = summary.cancelled,
        "sweep finished"
    );
    Ok(summary)
}

/// Initialize the candidate `C` and sweep it against `baseline`.
///
/// Both backends are released before this returns, including when the candidate fails to
/// initialize.
///
/// # Errors
///
/// Returns the initialization error of the candidate, or the first error raised by either backend
/// during the sweep.
pub fn run_with<B, C>(
    ctx: &Context,
    mut baseline: B,
    cancel: &CancelToken,
    reporter: &mut dyn Reporter,
) -> Result<Summary, BenchError>
where
    B: Backend,
    C: Backend,
{
    let mut candidate = C::initialize(ctx)?;
    let summary = sweep(ctx, &mut baseline, &mut candidate, cancel, reporter)?;
    Ok(summary)
}

/// Measure `baseline` and `candidate` on every problem of the configured space.
///
/// Both sides run with the same repetition count and discipline, one after the other, each starting
/// from the host copy of the result. Cancellation is checked between problems; when requested, the
/// device is drained and the sweep stops.
///
/// # Errors
///
/// Returns the first error raised by either backend.
pub fn sweep<B, C>(
    ctx: &Context,
    baseline: &mut B,
    candidate: &mut C,
    cancel: &CancelToken,
    reporter: &mut dyn Reporter,
) -> Result<Summary, BackendError>
where
    B: Backend,
    C: Backend,
{
    let config = ctx.config();
    let model = RepetitionModel::new(config.repeat, config.full_problem());
    let discipline = Discipline::from_parallel(config.parallel);
    let mut summary = Summary::default();

    for problem in ctx.problem_space().iter() {
        if cancel.is_cancelled() {
            warn!(%problem, "sweep cancelled, draining the device");
            baseline.synchronize(ctx)?;
            candidate.synchronize(ctx)?;
            summary.cancelled = true;
            break;
        }

        let repetitions = model.repetitions(problem);

        baseline.bind(ctx)?;
        let baseline_time = protocol::measure(baseline, ctx, problem, repetitions, discipline)?;
        let expected = if config.verify {
            Some(verify::capture(&*baseline, ctx, problem)?.into_owned())
        } else {
            None
        };

        candidate.bind(ctx)?;
        let candidate_time = protocol::measure(candidate, ctx, problem, repetitions, discipline)?;
        let delta = match expected {
            Some(expected) => {
                let actual = verify::capture(&*candidate, ctx, problem)?;
                Some(verify::delta(&expected, &actual))
            }
            None => None,
        };

        reporter.report(&Record {
            problem,
            repetitions,
            baseline: baseline_time,
            candidate: candidate_time,
            delta,
        });
        summary.problems += 1;
    }
    Ok(summary)
}
