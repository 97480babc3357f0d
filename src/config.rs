//! Benchmark configuration, interpreted from a flat key/value map.

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::warn;

use crate::problem::{Problem, ProblemSpace};

/// An error raised while interpreting the configuration map.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A value could not be parsed into the type expected by its key.
    #[error("invalid value `{value}` for `{key}`: expected {expected}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// The raw value.
        value: String,
        /// A description of what the key accepts.
        expected: &'static str,
    },
    /// The sweep divisor must be at least 2, otherwise the sweep never ends.
    #[error("step must be at least 2, got {0}")]
    InvalidStep(usize),
    /// The repetition scale factor must be a positive, finite number.
    #[error("repeat must be positive and finite, got {0}")]
    InvalidRepeat(f64),
    /// The device work-group granularity must be non-zero.
    #[error("work_group_size must be non-zero")]
    InvalidWorkGroupSize,
    /// More than one candidate backend was selected.
    #[error("backend flags are mutually exclusive, got both `{0}` and `{1}`")]
    ConflictingBackends(BackendKind, BackendKind),
}

/// The candidate GEMM provider compared against the baseline kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The tiled in-process kernel.
    #[default]
    Tuned,
    /// The baseline kernel compared against itself.
    Reference,
    /// The `gemm` library, queued on the device.
    Gemm,
    /// The `matrixmultiply` library, executed on the host copies.
    MatrixMultiply,
}

impl BackendKind {
    /// All selectable backends, in flag priority order.
    pub const ALL: [Self; 4] = [
        Self::Tuned,
        Self::Reference,
        Self::Gemm,
        Self::MatrixMultiply,
    ];

    /// The configuration key that selects this backend.
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            Self::Tuned => "tuned",
            Self::Reference => "reference",
            Self::Gemm => "gemm",
            Self::MatrixMultiply => "matrixmultiply",
        }
    }

    fn from_flag(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.flag() == key)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// Validated configuration of one benchmark invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Full number of rows of the weight and result matrices.
    pub m: usize,
    /// Full number of columns of the result matrix.
    pub n: usize,
    /// Full shared dimension.
    pub k: usize,
    /// Divisor applied to each dimension per sweep level.
    pub step: usize,
    /// Timing-stability scale factor.
    pub repeat: f64,
    /// GEMM scalar applied to `A*B`.
    pub alpha: f32,
    /// GEMM scalar applied to the previous content of `C`.
    pub beta: f32,
    /// Pipelined (`true`) or serialized (`false`) timing.
    pub parallel: bool,
    /// Whether to compute the numerical delta between baseline and candidate.
    pub verify: bool,
    /// The candidate backend.
    pub backend: BackendKind,
    /// Seed of the random generator filling the host matrices.
    pub seed: u64,
    /// Preferred work-group granularity of the device.
    pub work_group_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            m: 2048,
            n: 512,
            k: 2048,
            step: 4,
            repeat: 1.0,
            alpha: 1.0,
            beta: 0.0,
            parallel: false,
            verify: false,
            backend: BackendKind::Tuned,
            seed: 0,
            work_group_size: 256,
        }
    }
}

impl Config {
    /// Build a configuration from key/value pairs, starting from the defaults.
    ///
    /// Unknown keys are ignored with a warning. Backend flags set to a false value do not count as
    /// a selection.
    ///
    /// # Errors
    ///
    /// Returns an error if a value can't be parsed, or if the resulting configuration is invalid.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        let mut selected: Option<BackendKind> = None;
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                "M" | "m" => config.m = parse(key, value, "a non-negative integer")?,
                "N" | "n" => config.n = parse(key, value, "a non-negative integer")?,
                "K" | "k" => config.k = parse(key, value, "a non-negative integer")?,
                "step" => config.step = parse(key, value, "an integer")?,
                "repeat" => config.repeat = parse(key, value, "a number")?,
                "alpha" => config.alpha = parse(key, value, "a number")?,
                "beta" => config.beta = parse(key, value, "a number")?,
                "parallel" => config.parallel = parse_flag(key, value)?,
                "verify" => config.verify = parse_flag(key, value)?,
                "seed" => config.seed = parse(key, value, "a non-negative integer")?,
                "work_group_size" => {
                    config.work_group_size = parse(key, value, "a non-negative integer")?;
                }
                _ => match BackendKind::from_flag(key) {
                    Some(kind) => {
                        if !parse_flag(key, value)? {
                            continue;
                        }
                        match selected {
                            Some(previous) if previous != kind => {
                                return Err(ConfigError::ConflictingBackends(previous, kind));
                            }
                            _ => selected = Some(kind),
                        }
                    }
                    None => warn!(key, "unknown option ignored"),
                },
            }
        }
        config.backend = selected.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants that must hold before any timed work begins.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.problem_space()?;
        if !self.repeat.is_finite() || self.repeat <= 0.0 {
            return Err(ConfigError::InvalidRepeat(self.repeat));
        }
        if self.work_group_size == 0 {
            return Err(ConfigError::InvalidWorkGroupSize);
        }
        Ok(())
    }

    /// The full-size problem.
    #[must_use]
    pub fn full_problem(&self) -> Problem {
        Problem::new(self.m, self.n, self.k)
    }

    /// The sweep of sub-problems described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is smaller than 2.
    pub fn problem_space(&self) -> Result<ProblemSpace, ConfigError> {
        ProblemSpace::new(self.full_problem(), self.step)
    }
}

/// Split a `KEY=VALUE` argument.
///
/// # Errors
///
/// Returns a message if the argument has no `=` or an empty key.
pub fn parse_pair(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{arg}`")),
    }
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a boolean (1/0/true/false)",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_pairs(Vec::<(&str, &str)>::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.full_problem(), Problem::new(2048, 512, 2048));
        assert_eq!(config.backend, BackendKind::Tuned);
    }

    #[test]
    fn overrides() {
        let config = Config::from_pairs([
            ("M", "128"),
            ("N", "32"),
            ("K", "64"),
            ("step", "2"),
            ("repeat", "2.5"),
            ("alpha", "0.5"),
            ("beta", "1"),
            ("parallel", "1"),
            ("verify", "true"),
            ("gemm", "1"),
            ("seed", "42"),
        ])
        .unwrap();
        assert_eq!(config.full_problem(), Problem::new(128, 32, 64));
        assert_eq!(config.step, 2);
        assert!((config.repeat - 2.5).abs() < f64::EPSILON);
        assert!((config.alpha - 0.5).abs() < f32::EPSILON);
        assert!((config.beta - 1.0).abs() < f32::EPSILON);
        assert!(config.parallel);
        assert!(config.verify);
        assert_eq!(config.backend, BackendKind::Gemm);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = Config::from_pairs([("model", "whatever"), ("M", "64")]).unwrap();
        assert_eq!(config.m, 64);
    }

    #[test]
    fn disabled_backend_flags_do_not_conflict() {
        let config = Config::from_pairs([("gemm", "0"), ("matrixmultiply", "1")]).unwrap();
        assert_eq!(config.backend, BackendKind::MatrixMultiply);
    }

    #[test]
    fn conflicting_backends() {
        let err = Config::from_pairs([("gemm", "1"), ("reference", "1")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingBackends(BackendKind::Gemm, BackendKind::Reference)
        );
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            Config::from_pairs([("M", "-3")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::from_pairs([("verify", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            Config::from_pairs([("step", "1")]),
            Err(ConfigError::InvalidStep(1))
        );
        assert_eq!(
            Config::from_pairs([("repeat", "0")]),
            Err(ConfigError::InvalidRepeat(0.0))
        );
        assert_eq!(
            Config::from_pairs([("work_group_size", "0")]),
            Err(ConfigError::InvalidWorkGroupSize)
        );
        assert!(matches!(
            Config::from_pairs([("repeat", "NaN")]),
            Err(ConfigError::InvalidRepeat(_))
        ));
    }

    #[test]
    fn problem_space_checks_the_step() {
        let config = Config {
            step: 1,
            ..Config::default()
        };
        assert_eq!(config.problem_space(), Err(ConfigError::InvalidStep(1)));
        assert_eq!(Config::default().problem_space().map(|space| space.len()), Ok(4 * 3 * 4));
    }

    #[test]
    fn pairs() {
        assert_eq!(
            parse_pair("M=64"),
            Ok(("M".to_string(), "64".to_string()))
        );
        assert_eq!(
            parse_pair("log=a=b"),
            Ok(("log".to_string(), "a=b".to_string()))
        );
        assert!(parse_pair("M").is_err());
        assert!(parse_pair("=3").is_err());
    }
}
