//! The timed execution protocol: warm-up, measured loop and drain for one backend and problem.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::{
    backend::{Backend, BackendError},
    context::Context,
    problem::Problem,
};

/// How submissions are ordered inside the measured loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Discipline {
    /// Wait after every submission, measuring per-call latency.
    #[default]
    Serialized,
    /// Issue every submission back to back and wait once, measuring sustained throughput.
    Pipelined,
}

impl Discipline {
    /// The discipline selected by the `parallel` flag.
    #[must_use]
    pub fn from_parallel(parallel: bool) -> Self {
        if parallel {
            Self::Pipelined
        } else {
            Self::Serialized
        }
    }
}

/// The states of a timed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Launch parameters are selected.
    Init,
    /// One untimed submission absorbs first-call costs.
    Warmup,
    /// The measured submissions are issued.
    TimedLoop,
    /// The final barrier closes the measurement.
    Drain,
    /// The measurement is available.
    Done,
}

/// The wall-clock time of a number of repetitions of one backend at one problem size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    repetitions: u64,
    elapsed: Duration,
}

impl Measurement {
    /// Create a measurement. Zero repetitions are raised to one and a zero elapsed time to one
    /// nanosecond, so that the per-call time is always positive and finite.
    #[must_use]
    pub fn new(repetitions: u64, elapsed: Duration) -> Self {
        Self {
            repetitions: repetitions.max(1),
            elapsed: elapsed.max(Duration::from_nanos(1)),
        }
    }

    /// Number of measured repetitions.
    #[must_use]
    pub fn repetitions(&self) -> u64 {
        self.repetitions
    }

    /// Time spent in the measured loop, including the final barrier.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Average time of one call.
    #[must_use]
    pub fn per_call(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed.as_secs_f64() / self.repetitions as f64)
    }

    /// Average time of one call in milliseconds.
    #[must_use]
    pub fn per_call_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1e3 / self.repetitions as f64
    }
}

/// One run of the protocol, advanced phase by phase.
///
/// Any error aborts the run; the partial timing is dropped with it.
#[derive(Debug)]
pub struct TimedRun<'a, B> {
    backend: &'a mut B,
    ctx: &'a Context,
    problem: Problem,
    repetitions: u64,
    discipline: Discipline,
    phase: Phase,
    started: Option<Instant>,
    elapsed: Duration,
}

impl<'a, B: Backend> TimedRun<'a, B> {
    /// Prepare a run of `repetitions` measured calls of `backend` on `problem`. A zero count is
    /// raised to one.
    pub fn new(
        backend: &'a mut B,
        ctx: &'a Context,
        problem: Problem,
        repetitions: u64,
        discipline: Discipline,
    ) -> Self {
        Self {
            backend,
            ctx,
            problem,
            repetitions: repetitions.max(1),
            discipline,
            phase: Phase::Init,
            started: None,
            elapsed: Duration::ZERO,
        }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Execute the current phase and move to the next one.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the backend.
    pub fn advance(&mut self) -> Result<Phase, BackendError> {
        let (ctx, problem) = (self.ctx, self.problem);
        self.phase = match self.phase {
            Phase::Init => {
                self.backend.prepare(ctx, problem)?;
                Phase::Warmup
            }
            Phase::Warmup => {
                self.backend.submit(ctx, problem)?;
                self.backend.synchronize(ctx)?;
                Phase::TimedLoop
            }
            Phase::TimedLoop => {
                self.started = Some(Instant::now());
                for _ in 0..self.repetitions {
                    let ticket = self.backend.submit(ctx, problem)?;
                    if self.discipline == Discipline::Serialized {
                        self.backend.wait(ctx, ticket)?;
                    }
                }
                Phase::Drain
            }
            Phase::Drain => {
                self.backend.synchronize(ctx)?;
                self.elapsed = self.started.map_or(Duration::ZERO, |start| start.elapsed());
                Phase::Done
            }
            Phase::Done => Phase::Done,
        };
        trace!(provider = self.backend.name(), phase = ?self.phase, "phase entered");
        Ok(self.phase)
    }

    /// Run the remaining phases and return the measurement.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the backend.
    pub fn finish(mut self) -> Result<Measurement, BackendError> {
        while self.phase != Phase::Done {
            self.advance()?;
        }
        Ok(Measurement::new(self.repetitions, self.elapsed))
    }
}

/// Measure `repetitions` calls of `backend` on `problem` with the given discipline.
///
/// # Errors
///
/// Returns the first error raised by the backend.
pub fn measure<B: Backend>(
    backend: &mut B,
    ctx: &Context,
    problem: Problem,
    repetitions: u64,
    discipline: Discipline,
) -> Result<Measurement, BackendError> {
    TimedRun::new(backend, ctx, problem, repetitions, discipline).finish()
}
