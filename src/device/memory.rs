//! Buffers holding the three GEMM operands.

use std::fmt;

use crate::{device::error::DeviceError, problem::Problem};

/// One of the logical matrices of the benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Matrix {
    /// `A`, the `M x K` weight matrix.
    Weight,
    /// `B`, the `N x K` input matrix.
    Input,
    /// `C`, the `M x N` result matrix.
    Result,
}

impl Matrix {
    fn index(self) -> usize {
        match self {
            Self::Weight => 0,
            Self::Input => 1,
            Self::Result => 2,
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weight => "weight",
            Self::Input => "input",
            Self::Result => "result",
        })
    }
}

/// Borrowed column-major operands of one GEMM: `c = alpha * a * b + beta * c`.
#[derive(Debug)]
pub struct Operands<'a> {
    /// `m x k`, leading dimension `m`.
    pub a: &'a [f32],
    /// `k x n`, leading dimension `k`.
    pub b: &'a [f32],
    /// `m x n`, leading dimension `m`.
    pub c: &'a mut [f32],
}

/// The memory of a device. Only the queue worker touches it.
#[derive(Debug, Default)]
pub struct DeviceMemory {
    buffers: [Vec<f32>; 3],
}

impl DeviceMemory {
    /// The buffer backing `matrix`.
    #[must_use]
    pub fn buffer(&self, matrix: Matrix) -> &[f32] {
        &self.buffers[matrix.index()]
    }

    /// Replace the content of the buffer backing `matrix`.
    pub fn write(&mut self, matrix: Matrix, data: Vec<f32>) {
        self.buffers[matrix.index()] = data;
    }

    /// Copy the first `len` elements of the buffer backing `matrix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer holds fewer than `len` elements.
    pub fn read(&self, matrix: Matrix, len: usize) -> Result<Vec<f32>, DeviceError> {
        let buffer = self.buffer(matrix);
        check_len(matrix, len, buffer.len())?;
        Ok(buffer[..len].to_vec())
    }

    /// Borrow the leading regions addressed by `problem`.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the buffers is too small for the problem.
    pub fn operands(&mut self, problem: Problem) -> Result<Operands<'_>, DeviceError> {
        let Problem { m, n, k } = problem;
        let [weight, input, result] = &mut self.buffers;
        check_len(Matrix::Weight, m * k, weight.len())?;
        check_len(Matrix::Input, k * n, input.len())?;
        check_len(Matrix::Result, m * n, result.len())?;
        Ok(Operands {
            a: &weight[..m * k],
            b: &input[..k * n],
            c: &mut result[..m * n],
        })
    }
}

fn check_len(matrix: Matrix, requested: usize, available: usize) -> Result<(), DeviceError> {
    if requested > available {
        return Err(DeviceError::InvalidBufferSize {
            matrix,
            requested,
            available,
        });
    }
    Ok(())
}
