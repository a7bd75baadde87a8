//! End-to-end tests through the session entry points.
//! Run with: cargo test -p tessera-edge -- --nocapture

use tessera_core::{transfer, ElementWidth, ErrorKind, TesseraError};
use tessera_edge::{
    DispatchPolicy, ElementReader, HostArg, HostView, Session, Thresholds,
};
use tessera_kernels::hash::{self, HashVariant};
use tessera_kernels::{KernelKind, Strategy};

fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len(), "length mismatch: {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!(
            (x - y).abs() < tol,
            "element {} differs: {} vs {} (tol={})",
            i, x, y, tol
        );
    }
}

fn matrix(n: usize, seed: u64) -> Vec<f64> {
    (0..n * n)
        .map(|i| (((i as u64 * 2654435761 + seed) % 1000) as f64 - 500.0) / 97.0)
        .collect()
}

fn naive(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut c = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut s = 0.0;
            for k in 0..n {
                s += a[i * n + k] * b[k * n + j];
            }
            c[i * n + j] = s;
        }
    }
    c
}

fn fractal_args(w: f64, h: f64) -> Vec<HostArg<'static>> {
    [w, h, -2.5, 1.0, -1.25, 1.25].iter().map(|&v| HostArg::Number(v)).collect()
}

// ============================================================================
// Crossing counts
// ============================================================================

#[test]
fn test_matrix_crossings_independent_of_size() {
    let session = Session::guest();
    for n in [2usize, 65, 130] {
        let (a, b) = (matrix(n, 1), matrix(n, 2));
        let (ab, bb) = (transfer::le_bytes_of(&a), transfer::le_bytes_of(&b));
        let traced = session
            .matrix_multiply_traced(&[HostArg::from(&*ab), HostArg::from(&*bb), HostArg::Number(n as f64)])
            .unwrap();
        let crossings = traced.invocation.crossings;
        assert_eq!(session.last_invocation(), Some(traced.invocation));
        assert_eq!(crossings.imports, 2, "n={}", n);
        assert_eq!(crossings.exports, 1, "n={}", n);
        assert!(crossings.total() <= 3, "n={}: {:?}", n, crossings);
    }
}

#[test]
fn test_fractal_crossings_independent_of_size() {
    let session = Session::guest();
    for (w, h) in [(8.0, 8.0), (320.0, 200.0)] {
        let crossings = session.fractal_generate_traced(&fractal_args(w, h)).unwrap().invocation.crossings;
        assert!(crossings.total() <= 3, "{}x{}: {:?}", w, h, crossings);
        assert_eq!(crossings.exports, 1);
    }
}

#[test]
fn test_shared_session_counts_each_call_separately() {
    const THREADS: usize = 4;
    const CALLS: usize = 50;
    let n = 64;
    let (a, b) = (matrix(n, 9), matrix(n, 10));
    let (ab, bb) = (transfer::le_bytes_of(&a), transfer::le_bytes_of(&b));
    let session = Session::guest();

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let args = [HostArg::from(&*ab), HostArg::from(&*bb), HostArg::Number(n as f64)];
                for _ in 0..CALLS {
                    let crossings = session.matrix_multiply_traced(&args).unwrap().invocation.crossings;
                    assert_eq!(crossings.imports, 2);
                    assert_eq!(crossings.exports, 1);
                    assert_eq!(crossings.total(), 3);

                    let crossings = session.fractal_generate_traced(&fractal_args(16.0, 16.0)).unwrap().invocation.crossings;
                    assert_eq!(crossings.total(), 1);
                }
            });
        }
    });

    let totals = session.boundary().ledger().snapshot();
    assert_eq!(totals.imports, (THREADS * CALLS * 2) as u64);
    assert_eq!(totals.exports, (THREADS * CALLS * 2) as u64);
}

// ============================================================================
// Matrix
// ============================================================================

#[test]
fn test_matrix_matches_naive_unaligned_sizes() {
    let session = Session::guest();
    for n in [7usize, 8, 65] {
        let (a, b) = (matrix(n, 3), matrix(n, 4));
        let (ab, bb) = (transfer::le_bytes_of(&a), transfer::le_bytes_of(&b));
        let out = session
            .matrix_multiply(&[HostArg::from(&*ab), HostArg::from(&*bb), HostArg::Number(n as f64)])
            .unwrap();
        assert_eq!(out.width(), ElementWidth::F64);
        assert_close(&out.to_elements::<f64>().unwrap(), &naive(&a, &b, n), 1e-9);
    }
}

#[test]
fn test_matrix_parallel_host_matches_guest() {
    let n = 130;
    let (a, b) = (matrix(n, 5), matrix(n, 6));
    let (ab, bb) = (transfer::le_bytes_of(&a), transfer::le_bytes_of(&b));
    let args = [HostArg::from(&*ab), HostArg::from(&*bb), HostArg::Number(n as f64)];

    let guest = Session::guest().matrix_multiply(&args).unwrap();
    let host = Session::new(DispatchPolicy::host(4));
    let parallel = host.matrix_multiply(&args).unwrap();
    assert_eq!(host.last_plan().unwrap().strategy, Strategy::Parallel);
    assert_eq!(guest, parallel);
}

#[test]
fn test_matrix_zero_size() {
    let session = Session::guest();
    let out = session
        .matrix_multiply(&[HostArg::from(&[0u8; 0][..]), HostArg::from(&[0u8; 0][..]), HostArg::Number(0.0)])
        .unwrap();
    assert!(out.is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_arity_errors() {
    let session = Session::guest();
    let err = session.matrix_multiply(&[HostArg::Number(1.0)]).unwrap_err();
    assert_eq!(err, TesseraError::Arity { expected: 3, got: 1 });
    assert_eq!(err.kind(), ErrorKind::ArgumentError);

    let err = session.fractal_generate(&fractal_args(4.0, 4.0)[..5]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentError);

    let err = session.ray_render(&[HostArg::Number(4.0), HostArg::Missing]).unwrap_err();
    assert_eq!(err, TesseraError::Arity { expected: 2, got: 1 });
}

#[test]
fn test_failures_leave_no_invocation() {
    let session = Session::guest();
    let short = transfer::le_bytes_of(&[1.0f64, 2.0, 3.0]).into_owned();
    let full = transfer::le_bytes_of(&[1.0f64; 4]).into_owned();
    let err = session
        .matrix_multiply(&[short.as_slice().into(), full.as_slice().into(), HostArg::Number(2.0)])
        .unwrap_err();
    assert!(matches!(err, TesseraError::Undersized { needed: 4, available: 3, .. }));
    assert!(session.last_invocation().is_none());

    let failure = err.to_failure();
    assert!(failure.to_json().contains("ArgumentError"), "{}", failure.to_json());
}

#[test]
fn test_bad_scalars() {
    let session = Session::guest();
    let mut args = fractal_args(4.0, 4.0);
    args[2] = HostArg::Number(f64::NAN);
    assert!(matches!(session.fractal_generate(&args), Err(TesseraError::Argument(_))));

    let args = fractal_args(-1.0, 4.0);
    assert!(matches!(session.fractal_generate(&args), Err(TesseraError::Argument(_))));

    assert!(session.ray_render(&[HostArg::Number(2.5), HostArg::Number(2.0)]).is_err());
}

// ============================================================================
// Fractal
// ============================================================================

#[test]
fn test_fractal_edge_cases() {
    let session = Session::guest();
    let out = session.fractal_generate(&fractal_args(0.0, 10.0)).unwrap();
    assert!(out.is_empty());

    let mut args = fractal_args(6.0, 4.0);
    args.push(HostArg::Number(0.0));
    let out = session.fractal_generate(&args).unwrap();
    assert_eq!(out.to_elements::<i32>().unwrap(), vec![0; 24]);
}

// ============================================================================
// Hash dispatch
// ============================================================================

#[test]
fn test_hash_below_threshold_is_single_lane() {
    let session = Session::new(DispatchPolicy::host(4));
    let digest = session.hash_digest(HostView::Contiguous(b"payload"), 1_000).unwrap();
    let plan = session.last_plan().unwrap();
    assert_eq!(plan.kernel, KernelKind::Hash);
    assert!(!plan.is_multi_lane());
    assert_eq!(digest.variant, HashVariant::SingleLane);
    assert_eq!(digest.value, hash::hash_mix(b"payload", 1_000));
}

#[test]
fn test_hash_above_threshold_on_host_is_laned() {
    let policy = DispatchPolicy {
        thresholds: Thresholds {
            hash_min_iterations: 100,
            ..Thresholds::default()
        },
        ..DispatchPolicy::host(3)
    };
    let session = Session::new(policy);
    let digest = session.hash_digest(HostView::Contiguous(b"payload"), 500).unwrap();
    assert!(session.last_plan().unwrap().is_multi_lane());
    assert_eq!(digest.variant, HashVariant::Laned { lanes: 4 });
}

#[test]
fn test_guest_hash_is_canonical_at_any_size() {
    let session = Session::guest();
    let value = session.hash_mix(&[HostArg::from(&b"abc"[..]), HostArg::Number(60_000.0)]);
    assert_eq!(value, hash::hash_mix(b"abc", 60_000));
    assert!(!session.last_plan().unwrap().is_multi_lane());
}

// ============================================================================
// Degraded element-wise path
// ============================================================================

struct SliceReader<'a>(&'a [f64]);

impl ElementReader for SliceReader<'_> {
    fn width(&self) -> ElementWidth {
        ElementWidth::F64
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn read_le(&self, index: usize, out: &mut [u8]) {
        out.copy_from_slice(&self.0[index].to_le_bytes());
    }
}

#[test]
fn test_elementwise_input_same_result_more_crossings() {
    let n = 9;
    let (a, b) = (matrix(n, 7), matrix(n, 8));
    let bb = transfer::le_bytes_of(&b);
    let reader = SliceReader(&a);

    let session = Session::guest();
    let traced = session
        .matrix_multiply_traced(&[
            HostArg::Buffer(HostView::Elementwise(&reader)),
            HostArg::from(&*bb),
            HostArg::Number(n as f64),
        ])
        .unwrap();
    assert_close(&traced.output.to_elements::<f64>().unwrap(), &naive(&a, &b, n), 1e-9);

    let crossings = traced.invocation.crossings;
    assert_eq!(crossings.element_reads, (n * n) as u64);
    assert_eq!(crossings.imports, 1);
}

// ============================================================================
// Ray
// ============================================================================

#[test]
fn test_ray_output_and_samples() {
    let session = Session::guest();
    let out = session
        .ray_render(&[HostArg::Number(16.0), HostArg::Number(9.0), HostArg::Number(0.0)])
        .unwrap();
    assert_eq!(out.len(), 16 * 9 * 3);
    let one = session
        .ray_render(&[HostArg::Number(16.0), HostArg::Number(9.0)])
        .unwrap();
    assert_eq!(out, one, "samples = 0 renders like samples = 1");
}
