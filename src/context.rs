//! The state shared by every component of a benchmark run.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Normal;
use tracing::info;

use crate::{
    config::Config,
    device::{memory::Matrix, Device},
    error::BenchError,
    problem::ProblemSpace,
};

/// Host-resident, authoritative copies of the three matrices.
#[derive(Clone, Debug, PartialEq)]
pub struct HostMatrices {
    /// `A`, `M x K` elements.
    pub weight: Vec<f32>,
    /// `B`, `N x K` elements.
    pub input: Vec<f32>,
    /// `C`, `M x N` elements, zero-initialized.
    pub result: Vec<f32>,
}

impl HostMatrices {
    /// Fill the matrices for `config` with Xavier-normal values drawn from a seeded generator.
    #[must_use]
    pub fn xavier(config: &Config) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let weight = xavier_normal(&mut rng, config.m, config.k);
        let input = xavier_normal(&mut rng, config.n, config.k);
        Self {
            weight,
            input,
            result: vec![0.0; config.m * config.n],
        }
    }

    /// The host copy of `matrix`.
    #[must_use]
    pub fn get(&self, matrix: Matrix) -> &[f32] {
        match matrix {
            Matrix::Weight => &self.weight,
            Matrix::Input => &self.input,
            Matrix::Result => &self.result,
        }
    }
}

fn xavier_normal<R: Rng>(rng: &mut R, fan_out: usize, fan_in: usize) -> Vec<f32> {
    let std = (2.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    match Normal::new(0.0, std) {
        Ok(dist) => rng.sample_iter(dist).take(fan_out * fan_in).collect(),
        Err(_) => vec![0.0; fan_out * fan_in],
    }
}

/// Configuration, device and host matrices of one benchmark process.
///
/// Created once and passed by reference to every component that needs it.
#[derive(Debug)]
pub struct Context {
    config: Config,
    space: ProblemSpace,
    host: HostMatrices,
    device: Device,
}

impl Context {
    /// Validate `config`, open the device, fill the host matrices and upload them.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the device can't be opened or an upload
    /// fails.
    pub fn new(config: Config) -> Result<Self, BenchError> {
        config.validate()?;
        let space = config.problem_space()?;
        let host = HostMatrices::xavier(&config);
        let device = Device::open(config.work_group_size)?;
        for matrix in [Matrix::Weight, Matrix::Input, Matrix::Result] {
            device.upload(matrix, host.get(matrix))?;
        }
        info!(
            device = %device.info().name,
            m = config.m,
            n = config.n,
            k = config.k,
            seed = config.seed,
            "matrices uploaded"
        );
        Ok(Self {
            config,
            space,
            host,
            device,
        })
    }

    /// The benchmark configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The sweep of sub-problems.
    #[must_use]
    pub fn problem_space(&self) -> &ProblemSpace {
        &self.space
    }

    /// The authoritative host matrices.
    #[must_use]
    pub fn host(&self) -> &HostMatrices {
        &self.host
    }

    /// The compute device.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn host_matrices_are_reproducible() {
        let config = Config {
            m: 64,
            n: 32,
            k: 48,
            seed: 7,
            ..Config::default()
        };
        let first = HostMatrices::xavier(&config);
        let second = HostMatrices::xavier(&config);
        assert_eq!(first, second);
        assert_eq!(first.weight.len(), 64 * 48);
        assert_eq!(first.input.len(), 32 * 48);
        assert!(first.result.iter().all(|&x| x == 0.0));
        assert!(first.weight.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let err = Context::new(Config {
            step: 1,
            ..Config::default()
        })
        .unwrap_err();
        assert!(matches!(err, BenchError::Config(ConfigError::InvalidStep(1))));
    }

    #[test]
    fn device_copies_match_host() {
        let config = Config {
            m: 32,
            n: 32,
            k: 32,
            ..Config::default()
        };
        let ctx = Context::new(config).unwrap();
        let weight = ctx.device().download(Matrix::Weight, 32 * 32).unwrap();
        assert_eq!(weight, ctx.host().weight);
    }
}
