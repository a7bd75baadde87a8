//! Cache-blocked f64 matrix multiplication: C = A @ B for square n×n.
//!
//! B is transposed once so both operands stream with unit stride. The loop
//! nest tiles twice (64×64 outer blocks for L2, 8×8 inner blocks for L1) and
//! the innermost 2×2 register micro-kernel keeps four accumulators live,
//! consuming the reduction dimension two steps at a time. Every load is
//! guarded against `n`, so any size works, not only multiples of 8.
//!
//! Accumulation order per output cell is fixed by the loop nest, so results
//! are deterministic and identical between single-lane and parallel runs.

use crate::descriptor::MatrixDescriptor;
use crate::lanes::{row_bands, WorkerGroup};
use crate::Strategy;

/// Outer tile edge (L2-sized block of f64).
pub const OUTER_TILE: usize = 64;
/// Inner tile edge (L1-sized block of f64).
pub const INNER_TILE: usize = 8;

/// Multiply two row-major n×n matrices.
///
/// `a` and `b` must each hold exactly `n * n` elements; the boundary has
/// validated this before the kernel runs.
pub fn matmul_f64(
    a: &[f64],
    b: &[f64],
    desc: &MatrixDescriptor,
    strategy: Strategy,
    group: &WorkerGroup,
) -> Vec<f64> {
    let n = desc.n;
    assert_eq!(a.len(), n * n, "matmul: A must be {}x{}", n, n);
    assert_eq!(b.len(), n * n, "matmul: B must be {}x{}", n, n);

    let mut c = vec![0.0f64; n * n];
    match strategy {
        Strategy::Naive => naive(a, b, &mut c, n),
        Strategy::CacheBlocked => {
            let bt = transpose(b, n);
            blocked_rows(a, &bt, &mut c, n, 0, n);
        }
        Strategy::Parallel => {
            let bt = transpose(b, n);
            let lanes = row_bands(n, n, OUTER_TILE);
            group.run(&mut c, &lanes, |lane, rows| {
                blocked_rows(a, &bt, rows, n, lane.range.start / n, lane.range.end / n);
            });
        }
    }
    c
}

/// Reference triple loop.
fn naive(a: &[f64], b: &[f64], c: &mut [f64], n: usize) {
    for i in 0..n {
        for j in 0..n {
            let mut acc = 0.0f64;
            for p in 0..n {
                acc += a[i * n + p] * b[p * n + j];
            }
            c[i * n + j] = acc;
        }
    }
}

/// Row-major transpose, O(n²).
pub fn transpose(b: &[f64], n: usize) -> Vec<f64> {
    let mut bt = vec![0.0f64; n * n];
    for i0 in (0..n).step_by(INNER_TILE) {
        let i_end = (i0 + INNER_TILE).min(n);
        for j0 in (0..n).step_by(INNER_TILE) {
            let j_end = (j0 + INNER_TILE).min(n);
            for i in i0..i_end {
                for j in j0..j_end {
                    bt[j * n + i] = b[i * n + j];
                }
            }
        }
    }
    bt
}

/// Compute rows `row_start..row_end` of C into `c_rows`.
///
/// `c_rows` holds exactly those rows (`(row_end - row_start) * n` elements),
/// which lets a lane own only its band of the output.
fn blocked_rows(a: &[f64], bt: &[f64], c_rows: &mut [f64], n: usize, row_start: usize, row_end: usize) {
    debug_assert_eq!(c_rows.len(), (row_end - row_start) * n);

    for ii in (row_start..row_end).step_by(OUTER_TILE) {
        let i_end = (ii + OUTER_TILE).min(row_end);
        for jj in (0..n).step_by(OUTER_TILE) {
            let j_end = (jj + OUTER_TILE).min(n);
            for kk in (0..n).step_by(OUTER_TILE) {
                let k_end = (kk + OUTER_TILE).min(n);

                for i0 in (ii..i_end).step_by(INNER_TILE) {
                    let i1 = (i0 + INNER_TILE).min(i_end);
                    for j0 in (jj..j_end).step_by(INNER_TILE) {
                        let j1 = (j0 + INNER_TILE).min(j_end);
                        let block = InnerBlock { i0, i1, j0, j1, k0: kk, k1: k_end };
                        micro_kernel_2x2(a, bt, c_rows, n, row_start, &block);
                    }
                }
            }
        }
    }
}

struct InnerBlock {
    i0: usize,
    i1: usize,
    j0: usize,
    j1: usize,
    k0: usize,
    k1: usize,
}

/// 2×2 register tile over one inner block.
///
/// Four partial sums accumulate over the block's reduction range two steps
/// at a time, then add into C. Rows/columns past the block edge load zero
/// and are never stored.
#[inline]
fn micro_kernel_2x2(a: &[f64], bt: &[f64], c_rows: &mut [f64], n: usize, row_start: usize, blk: &InnerBlock) {
    for i in (blk.i0..blk.i1).step_by(2) {
        let has_i1 = i + 1 < blk.i1;
        let a0 = i * n;
        let a1 = (i + 1) * n;

        for j in (blk.j0..blk.j1).step_by(2) {
            let has_j1 = j + 1 < blk.j1;
            let b0 = j * n;
            let b1 = (j + 1) * n;

            let (mut c00, mut c01, mut c10, mut c11) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);

            let mut p = blk.k0;
            while p + 1 < blk.k1 {
                let (x0p, x0q) = (a[a0 + p], a[a0 + p + 1]);
                let (x1p, x1q) = if has_i1 { (a[a1 + p], a[a1 + p + 1]) } else { (0.0, 0.0) };
                let (y0p, y0q) = (bt[b0 + p], bt[b0 + p + 1]);
                let (y1p, y1q) = if has_j1 { (bt[b1 + p], bt[b1 + p + 1]) } else { (0.0, 0.0) };

                c00 += x0p * y0p + x0q * y0q;
                c01 += x0p * y1p + x0q * y1q;
                c10 += x1p * y0p + x1q * y0q;
                c11 += x1p * y1p + x1q * y1q;
                p += 2;
            }
            // Odd reduction tail
            if p < blk.k1 {
                let x0 = a[a0 + p];
                let x1 = if has_i1 { a[a1 + p] } else { 0.0 };
                let y0 = bt[b0 + p];
                let y1 = if has_j1 { bt[b1 + p] } else { 0.0 };
                c00 += x0 * y0;
                c01 += x0 * y1;
                c10 += x1 * y0;
                c11 += x1 * y1;
            }

            let ci = (i - row_start) * n;
            c_rows[ci + j] += c00;
            if has_j1 {
                c_rows[ci + j + 1] += c01;
            }
            if has_i1 {
                c_rows[ci + n + j] += c10;
                if has_j1 {
                    c_rows[ci + n + j + 1] += c11;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(n: usize, seed: usize) -> Vec<f64> {
        (0..n * n).map(|i| ((i * 7 + seed) % 13) as f64 - 6.0).collect()
    }

    #[test]
    fn test_matmul_2x2_example() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let desc = MatrixDescriptor::new(2);
        let group = WorkerGroup::cooperative();
        for strategy in [Strategy::Naive, Strategy::CacheBlocked, Strategy::Parallel] {
            let c = matmul_f64(&a, &b, &desc, strategy, &group);
            assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0], "strategy {}", strategy);
        }
    }

    #[test]
    fn test_matmul_identity() {
        let n = 9;
        let a = square(n, 1);
        let eye: Vec<f64> = (0..n * n).map(|i| if i / n == i % n { 1.0 } else { 0.0 }).collect();
        let c = matmul_f64(&a, &eye, &MatrixDescriptor::new(n), Strategy::CacheBlocked, &WorkerGroup::cooperative());
        assert_eq!(c, a);
    }

    #[test]
    fn test_blocked_matches_naive_for_odd_sizes() {
        let group = WorkerGroup::cooperative();
        for &n in &[1usize, 2, 3, 7, 8, 15, 16, 65] {
            let a = square(n, 3);
            let b = square(n, 5);
            let desc = MatrixDescriptor::new(n);
            let reference = matmul_f64(&a, &b, &desc, Strategy::Naive, &group);
            let fast = matmul_f64(&a, &b, &desc, Strategy::CacheBlocked, &group);
            for (i, (&f, &r)) in fast.iter().zip(reference.iter()).enumerate() {
                assert!((f - r).abs() < 1e-9, "n={} mismatch at {}: fast={}, ref={}", n, i, f, r);
            }
        }
    }

    #[test]
    fn test_transpose() {
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(transpose(&b, 3), vec![1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_zero_size() {
        let c = matmul_f64(&[], &[], &MatrixDescriptor::new(0), Strategy::Parallel, &WorkerGroup::cooperative());
        assert!(c.is_empty());
    }

    #[test]
    fn test_parallel_bitwise_equals_blocked() {
        let n = 130;
        let a: Vec<f64> = (0..n * n).map(|i| ((i as f64) * 0.37).sin()).collect();
        let b: Vec<f64> = (0..n * n).map(|i| ((i as f64) * 0.11).cos()).collect();
        let desc = MatrixDescriptor::new(n);
        let single = matmul_f64(&a, &b, &desc, Strategy::CacheBlocked, &WorkerGroup::cooperative());
        let multi = matmul_f64(&a, &b, &desc, Strategy::Parallel, &WorkerGroup::new(3));
        assert!(single.iter().zip(multi.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}
