//! How many times each problem is repeated inside the timed loop.

use tracing::warn;

use crate::problem::Problem;

/// Computes the repetition count of every sub-problem of a sweep.
///
/// Per-call overhead dominates small problems, so they are repeated more often to reach a stable
/// average: `round(50 * (sqrt(repeat * M*N*K / (m*n*k)) - 0.8))`, clamped to at least 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepetitionModel {
    repeat: f64,
    full: Problem,
}

impl RepetitionModel {
    /// Create the model for a sweep below `full`, scaled by `repeat`.
    #[must_use]
    pub fn new(repeat: f64, full: Problem) -> Self {
        Self { repeat, full }
    }

    /// The unclamped count, which can be zero or negative for small `repeat` values.
    #[must_use]
    pub fn raw(&self, problem: Problem) -> i64 {
        let ratio = self.repeat * self.full.volume() / problem.volume();
        (50.0 * (ratio.sqrt() - 0.8)).round() as i64
    }

    /// The number of timed repetitions for `problem`, never less than 1.
    #[must_use]
    pub fn repetitions(&self, problem: Problem) -> u64 {
        let raw = self.raw(problem);
        if raw < 1 {
            warn!(%problem, raw, repeat = self.repeat, "repetition count clamped to 1");
            return 1;
        }
        raw.unsigned_abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_size_problem() {
        let full = Problem::new(2048, 512, 2048);
        assert_eq!(RepetitionModel::new(1.0, full).repetitions(full), 10);
        assert_eq!(RepetitionModel::new(4.0, full).repetitions(full), 60);
    }

    #[test]
    fn smaller_problems_repeat_more() {
        let full = Problem::new(2048, 512, 2048);
        let model = RepetitionModel::new(1.0, full);
        // 2048*512*2048 / (512*512*512) = 16, sqrt = 4.
        assert_eq!(model.repetitions(Problem::new(512, 512, 512)), 160);
        assert!(model.repetitions(Problem::new(32, 32, 32)) > 160);
    }

    #[test]
    fn clamped_to_one() {
        let full = Problem::new(64, 64, 64);
        let model = RepetitionModel::new(0.25, full);
        assert_eq!(model.raw(full), -15);
        assert_eq!(model.repetitions(full), 1);
    }
}
