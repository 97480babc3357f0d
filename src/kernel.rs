//! Compute kernels for `C = alpha * A * B + beta * C` on column-major operands.
//!
//! `A` is `m x k` with leading dimension `m`, `B` is `k x n` with leading dimension `k` and `C` is
//! `m x n` with leading dimension `m`. When `beta` is zero, `C` is write-only.

use rayon::prelude::*;

use crate::{device::memory::Operands, problem::Problem};

/// Largest output tile edge of the tiled kernel.
pub const MAX_TILE: usize = 32;

/// Launch parameters of the tiled kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileConfig {
    /// Edge of the square output tile computed by one work-group.
    pub tile: usize,
    /// Depth of the panels of `A` and `B` accumulated at once.
    pub k_block: usize,
}

impl TileConfig {
    /// Select the launch parameters for `problem` on a device with the given work-group
    /// granularity.
    #[must_use]
    pub fn select(problem: Problem, work_group_size: usize) -> Self {
        let mut tile = MAX_TILE;
        while tile > 1 && tile * tile > work_group_size {
            tile /= 2;
        }
        let k_block = proper_local_size(problem.k, work_group_size)
            .min(problem.output_len())
            .max(1);
        Self { tile, k_block }
    }
}

/// The largest power of two not above `limit` that divides `dim`.
fn proper_local_size(dim: usize, limit: usize) -> usize {
    let mut size = 1;
    while size * 2 <= limit && dim % (size * 2) == 0 {
        size *= 2;
    }
    size
}

/// Reference GEMM: every output element is computed independently with a plain dot product.
pub fn reference(problem: Problem, alpha: f32, beta: f32, ops: Operands<'_>) {
    let Problem { m, n: _, k } = problem;
    let Operands { a, b, c } = ops;
    c.par_chunks_mut(m).enumerate().for_each(|(j, column)| {
        let b_col = &b[j * k..(j + 1) * k];
        for (i, out) in column.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (p, &bv) in b_col.iter().enumerate() {
                sum += a[i + p * m] * bv;
            }
            *out = combine(alpha, sum, beta, *out);
        }
    });
}

/// Tiled GEMM: each work-group computes a `tile x tile` block of `C`, streaming `k_block`-deep
/// panels of `A` and `B` through a local accumulator.
pub fn tiled(problem: Problem, config: TileConfig, alpha: f32, beta: f32, ops: Operands<'_>) {
    let Problem { m, n: _, k } = problem;
    let TileConfig { tile, k_block } = config;
    let Operands { a, b, c } = ops;
    c.par_chunks_mut(m * tile)
        .enumerate()
        .for_each(|(block, columns)| {
            let j0 = block * tile;
            let width = columns.len() / m;
            let mut acc = vec![0.0f32; tile * tile];
            for i0 in (0..m).step_by(tile) {
                let height = tile.min(m - i0);
                acc.fill(0.0);
                for p0 in (0..k).step_by(k_block) {
                    let depth = k_block.min(k - p0);
                    for jj in 0..width {
                        let b_panel = &b[(j0 + jj) * k + p0..(j0 + jj) * k + p0 + depth];
                        let acc_col = &mut acc[jj * tile..jj * tile + height];
                        for (pp, &bv) in b_panel.iter().enumerate() {
                            let a_col = &a[(p0 + pp) * m + i0..(p0 + pp) * m + i0 + height];
                            for (x, &av) in acc_col.iter_mut().zip(a_col) {
                                *x += av * bv;
                            }
                        }
                    }
                }
                for jj in 0..width {
                    let out = &mut columns[jj * m + i0..jj * m + i0 + height];
                    for (o, &x) in out.iter_mut().zip(&acc[jj * tile..jj * tile + height]) {
                        *o = combine(alpha, x, beta, *o);
                    }
                }
            }
        });
}

#[inline]
fn combine(alpha: f32, product: f32, beta: f32, previous: f32) -> f32 {
    if beta == 0.0 {
        alpha * product
    } else {
        alpha * product + beta * previous
    }
}
