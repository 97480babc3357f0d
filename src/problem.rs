//! The sweep of GEMM problem sizes.

use std::{fmt, iter};

use crate::config::ConfigError;

/// The smallest dimension included in a sweep.
pub const MIN_DIM: usize = 32;

/// The sizes of one GEMM: `C (m x n) = alpha * A (m x k) * B (k x n) + beta * C`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Problem {
    /// Rows of `A` and `C`.
    pub m: usize,
    /// Columns of `B` and `C`.
    pub n: usize,
    /// Columns of `A` and rows of `B`.
    pub k: usize,
}

impl Problem {
    /// Create a problem with the given sizes.
    #[must_use]
    pub const fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }

    /// The product `m * n * k`, which scales the work of the multiplication.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.m as f64 * self.n as f64 * self.k as f64
    }

    /// Number of elements of the addressed region of `C`.
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.m * self.n
    }

    /// Whether every dimension fits in `full`.
    #[must_use]
    pub fn fits_in(&self, full: &Self) -> bool {
        self.m <= full.m && self.n <= full.n && self.k <= full.k
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.m, self.n, self.k)
    }
}

/// All sub-problems obtained by dividing a full problem by powers of a step.
///
/// Each dimension is divided independently; the sequence is nested with `m` varying slowest and
/// `k` fastest. A dimension smaller than [`MIN_DIM`] yields no levels, making the whole space
/// empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProblemSpace {
    full: Problem,
    step: usize,
}

impl ProblemSpace {
    /// Create the space below `full` with the given divisor.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is smaller than 2, since the sweep would never end.
    pub fn new(full: Problem, step: usize) -> Result<Self, ConfigError> {
        if step < 2 {
            return Err(ConfigError::InvalidStep(step));
        }
        Ok(Self { full, step })
    }

    /// The full-size problem.
    #[must_use]
    pub fn full(&self) -> Problem {
        self.full
    }

    /// Lazily enumerate the sub-problems.
    pub fn iter(&self) -> impl Iterator<Item = Problem> {
        let Self { full, step } = *self;
        levels(full.m, step).flat_map(move |m| {
            levels(full.n, step)
                .flat_map(move |n| levels(full.k, step).map(move |k| Problem::new(m, n, k)))
        })
    }

    /// Number of sub-problems in the space.
    #[must_use]
    pub fn len(&self) -> usize {
        let count = |dim| levels(dim, self.step).count();
        count(self.full.m) * count(self.full.n) * count(self.full.k)
    }

    /// Whether the space holds no problem at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The sizes `full / step^i` that are at least [`MIN_DIM`].
fn levels(full: usize, step: usize) -> impl Iterator<Item = usize> + Clone {
    iter::successors(Some(full), move |&dim| Some(dim / step)).take_while(|&dim| dim >= MIN_DIM)
}
