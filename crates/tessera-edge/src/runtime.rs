//! Session: the four kernel entry points behind the boundary.
//!
//! Every call follows the same order: arity check, scalar validation, bulk
//! import of buffer arguments, dispatch, compute in guest memory, one bulk
//! export. Anything that fails does so before a kernel runs, and nothing
//! but the crossing ledger and the last invocation outlives the call.
//!
//! Each call counts its own crossings, so a session shared between threads
//! still reports exact per-call figures through the `*_traced` entry points.

use parking_lot::Mutex;
use serde::Serialize;
use tessera_core::{ElementWidth, GuestBuffer, Result, TesseraError};
use tessera_kernels::descriptor::WorkDescriptor;
use tessera_kernels::hash::HashDigest;
use tessera_kernels::{
    cpu_matmul, fractal, hash, ray, FractalDescriptor, HashDescriptor, KernelKind, MatrixDescriptor,
    RayDescriptor, Viewport,
};

use crate::boundary::{Boundary, CallTransfer, CrossingCount, HostBytes, HostView};
use crate::plan::{DispatchPolicy, ExecutionPlan};

/// One positional argument as the host passed it.
#[derive(Debug, Clone, Copy)]
pub enum HostArg<'a> {
    Number(f64),
    Buffer(HostView<'a>),
    /// `undefined` / not passed.
    Missing,
}

impl From<f64> for HostArg<'_> {
    fn from(v: f64) -> Self {
        HostArg::Number(v)
    }
}

impl<'a> From<&'a [u8]> for HostArg<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        HostArg::Buffer(HostView::Contiguous(bytes))
    }
}

impl<'a> From<HostView<'a>> for HostArg<'a> {
    fn from(view: HostView<'a>) -> Self {
        HostArg::Buffer(view)
    }
}

/// Summary of one completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub kernel: KernelKind,
    pub plan: ExecutionPlan,
    pub crossings: CrossingCount,
    pub output_len: usize,
}

/// A call's output together with its own [`Invocation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Traced<T> {
    pub output: T,
    pub invocation: Invocation,
}

pub struct Session {
    boundary: Boundary,
    policy: DispatchPolicy,
    last: Mutex<Option<Invocation>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::guest()
    }
}

impl Session {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            boundary: Boundary::new(),
            policy,
            last: Mutex::new(None),
        }
    }

    /// Session with the single-thread guest policy.
    pub fn guest() -> Self {
        Self::new(DispatchPolicy::guest())
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Plan chosen by the most recent successful call.
    pub fn last_plan(&self) -> Option<ExecutionPlan> {
        self.last.lock().as_ref().map(|inv| inv.plan)
    }

    /// Summary of the most recent successful call. When the session is
    /// shared between threads this may belong to another thread's call;
    /// use the `*_traced` entry points for a call's own summary.
    pub fn last_invocation(&self) -> Option<Invocation> {
        *self.last.lock()
    }

    /// `matrixMultiply(bufferA, bufferB, size)` → f64 buffer of size².
    pub fn matrix_multiply(&self, args: &[HostArg<'_>]) -> Result<HostBytes> {
        self.matrix_multiply_traced(args).map(|t| t.output)
    }

    pub fn matrix_multiply_traced(&self, args: &[HostArg<'_>]) -> Result<Traced<HostBytes>> {
        require_arity(args, 3)?;
        let n = dimension(args, 2, "size")?;
        let count = n
            .checked_mul(n)
            .ok_or_else(|| TesseraError::Argument(format!("matrix size {} overflows", n)))?;
        let a_view = buffer(args, 0, "bufferA")?;
        let b_view = buffer(args, 1, "bufferB")?;

        let mut call = self.boundary.begin_call();
        let a = call.import::<f64>(a_view, count)?;
        let b = call.import::<f64>(b_view, count)?;

        let desc = MatrixDescriptor::new(n);
        let plan = self.policy.select(desc.kind(), desc.work_size());
        let c = {
            let group = plan.worker_group();
            cpu_matmul::matmul_f64(a.as_slice(), b.as_slice(), &desc, plan.strategy, &group)
        };
        Ok(self.finish(plan, call, GuestBuffer::from_vec(c)))
    }

    /// `fractalGenerate(width, height, xmin, xmax, ymin, ymax, maxIterations = 100)`
    /// → i32 buffer of width × height.
    pub fn fractal_generate(&self, args: &[HostArg<'_>]) -> Result<HostBytes> {
        self.fractal_generate_traced(args).map(|t| t.output)
    }

    pub fn fractal_generate_traced(&self, args: &[HostArg<'_>]) -> Result<Traced<HostBytes>> {
        require_arity(args, 6)?;
        let width = dimension(args, 0, "width")?;
        let height = dimension(args, 1, "height")?;
        let viewport = Viewport::new(
            bound(args, 2, "xmin")?,
            bound(args, 3, "xmax")?,
            bound(args, 4, "ymin")?,
            bound(args, 5, "ymax")?,
        );
        let max_iterations = optional_dimension(args, 6, "maxIterations", FractalDescriptor::DEFAULT_MAX_ITERATIONS as usize)?;
        if max_iterations > i32::MAX as usize {
            return Err(TesseraError::Argument(format!(
                "maxIterations {} does not fit an i32 escape count",
                max_iterations
            )));
        }
        output_len(ElementWidth::I32, &[width, height])?;

        let call = self.boundary.begin_call();
        let desc = FractalDescriptor::new(width, height, viewport, max_iterations as u32);
        let plan = self.policy.select(desc.kind(), desc.work_size());
        let counts = {
            let group = plan.worker_group();
            fractal::generate(&desc, plan.strategy, &group)
        };
        Ok(self.finish(plan, call, GuestBuffer::from_vec(counts)))
    }

    /// `hashMix(data, iterations)` → u32.
    ///
    /// Returns 0 when an argument is missing or unusable.
    pub fn hash_mix(&self, args: &[HostArg<'_>]) -> u32 {
        let digest = buffer(args, 0, "data").and_then(|view| {
            let iterations = dimension(args, 1, "iterations")?;
            let iterations = u32::try_from(iterations)
                .map_err(|_| TesseraError::Argument(format!("iterations {} exceeds u32", iterations)))?;
            self.hash_digest(view, iterations)
        });
        match digest {
            Ok(d) => d.value,
            Err(e) => {
                tracing::debug!("hashMix returning 0: {}", e);
                0
            }
        }
    }

    /// Typed hash entry point; reports which hash definition was used.
    pub fn hash_digest(&self, data: HostView<'_>, iterations: u32) -> Result<HashDigest> {
        self.hash_digest_traced(data, iterations).map(|t| t.output)
    }

    pub fn hash_digest_traced(&self, data: HostView<'_>, iterations: u32) -> Result<Traced<HashDigest>> {
        let mut call = self.boundary.begin_call();
        let bytes = call.import_bytes(data)?;

        let desc = HashDescriptor::new(iterations);
        let plan = self.policy.select(desc.kind(), desc.work_size());
        let digest = {
            let group = plan.worker_group();
            hash::hash(bytes.as_slice(), &desc, plan.strategy, self.policy.hash_lanes, &group)
        };

        let invocation = self.record(Invocation {
            kernel: KernelKind::Hash,
            plan,
            crossings: call.crossings(),
            output_len: 1,
        });
        Ok(Traced { output: digest, invocation })
    }

    /// `rayRender(width, height, samples = 1)` → f64 buffer of width × height × 3.
    pub fn ray_render(&self, args: &[HostArg<'_>]) -> Result<HostBytes> {
        self.ray_render_traced(args).map(|t| t.output)
    }

    pub fn ray_render_traced(&self, args: &[HostArg<'_>]) -> Result<Traced<HostBytes>> {
        require_arity(args, 2)?;
        let width = dimension(args, 0, "width")?;
        let height = dimension(args, 1, "height")?;
        let samples = optional_dimension(args, 2, "samples", 1)?;
        let samples = u32::try_from(samples)
            .map_err(|_| TesseraError::Argument(format!("samples {} exceeds u32", samples)))?;
        output_len(ElementWidth::F64, &[width, height, RayDescriptor::CHANNELS])?;

        let call = self.boundary.begin_call();
        let desc = RayDescriptor::new(width, height, samples);
        let plan = self.policy.select(desc.kind(), desc.work_size());
        let rgb = {
            let group = plan.worker_group();
            ray::render(&desc, plan.strategy, &group)
        };
        Ok(self.finish(plan, call, GuestBuffer::from_vec(rgb)))
    }

    /// Runtime summary for `backendInfo` / `tessera info`.
    pub fn info(&self) -> String {
        let t = &self.policy.thresholds;
        format!(
            "tessera-edge v{} | context: {:?} | single-lane: {} | thresholds: matrix n>={}, fractal px>={}, hash iters>={}, ray px>={} | hash lanes: {}",
            env!("CARGO_PKG_VERSION"),
            self.policy.context,
            self.policy.single_lane_strategy,
            t.matrix_min_size,
            t.fractal_min_pixels,
            t.hash_min_iterations,
            t.ray_min_pixels,
            self.policy.hash_lanes,
        )
    }

    fn finish<T: tessera_core::Element>(
        &self,
        plan: ExecutionPlan,
        mut call: CallTransfer<'_>,
        out: GuestBuffer<T>,
    ) -> Traced<HostBytes> {
        let output = call.export(out);
        let invocation = self.record(Invocation {
            kernel: plan.kernel,
            plan,
            crossings: call.crossings(),
            output_len: output.len(),
        });
        Traced { output, invocation }
    }

    fn record(&self, invocation: Invocation) -> Invocation {
        tracing::trace!(
            "{} done: {} on {} worker(s), {} crossing(s), {} output element(s)",
            invocation.kernel,
            invocation.plan.strategy,
            invocation.plan.workers,
            invocation.crossings.total(),
            invocation.output_len
        );
        *self.last.lock() = Some(invocation);
        invocation
    }
}

/// Positional arity: everything up to the last argument actually passed.
fn arity(args: &[HostArg<'_>]) -> usize {
    args.iter()
        .rposition(|a| !matches!(a, HostArg::Missing))
        .map_or(0, |i| i + 1)
}

fn require_arity(args: &[HostArg<'_>], expected: usize) -> Result<()> {
    let got = arity(args);
    if got < expected {
        return Err(TesseraError::Arity { expected, got });
    }
    Ok(())
}

fn number(args: &[HostArg<'_>], index: usize, name: &str) -> Result<f64> {
    match args.get(index) {
        Some(HostArg::Number(v)) => Ok(*v),
        Some(HostArg::Buffer(_)) => Err(TesseraError::Argument(format!("{} must be a number, got a buffer", name))),
        Some(HostArg::Missing) | None => Err(TesseraError::Argument(format!("{} is missing", name))),
    }
}

/// A finite viewport bound.
fn bound(args: &[HostArg<'_>], index: usize, name: &str) -> Result<f64> {
    let v = number(args, index, name)?;
    if !v.is_finite() {
        return Err(TesseraError::Argument(format!("{} must be finite, got {}", name, v)));
    }
    Ok(v)
}

/// A count or dimension: finite, non-negative, integral, at most u32::MAX.
fn dimension(args: &[HostArg<'_>], index: usize, name: &str) -> Result<usize> {
    let v = number(args, index, name)?;
    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v > u32::MAX as f64 {
        return Err(TesseraError::Argument(format!(
            "{} must be a non-negative integer, got {}",
            name, v
        )));
    }
    Ok(v as usize)
}

fn optional_dimension(args: &[HostArg<'_>], index: usize, name: &str, default: usize) -> Result<usize> {
    match args.get(index) {
        None | Some(HostArg::Missing) => Ok(default),
        Some(_) => dimension(args, index, name),
    }
}

fn buffer<'a>(args: &[HostArg<'a>], index: usize, name: &str) -> Result<HostView<'a>> {
    match args.get(index) {
        Some(HostArg::Buffer(view)) => Ok(*view),
        Some(HostArg::Number(_)) => Err(TesseraError::Argument(format!("{} must be a buffer, got a number", name))),
        Some(HostArg::Missing) | None => Err(TesseraError::Argument(format!("{} is missing", name))),
    }
}

/// Reject outputs whose element count or byte length would overflow.
fn output_len(width: ElementWidth, dims: &[usize]) -> Result<usize> {
    let count = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|count| width.storage_bytes(count).map(|_| count));
    count.ok_or_else(|| TesseraError::Argument(format!("output of {:?} {} elements overflows", dims, width)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::ErrorKind;

    #[test]
    fn test_arity_ignores_trailing_missing() {
        let args = [HostArg::Number(1.0), HostArg::Missing, HostArg::Number(2.0), HostArg::Missing];
        assert_eq!(arity(&args), 3);
        assert_eq!(arity(&[HostArg::Missing]), 0);
    }

    #[test]
    fn test_dimension_rejects_bad_numbers() {
        for bad in [-1.0, 1.5, f64::NAN, f64::INFINITY, 5.0e9] {
            let err = dimension(&[HostArg::Number(bad)], 0, "width").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentError, "{}", bad);
        }
        assert_eq!(dimension(&[HostArg::Number(0.0)], 0, "width").unwrap(), 0);
    }

    #[test]
    fn test_matrix_multiply_example() {
        let session = Session::guest();
        let a = tessera_core::transfer::le_bytes_of(&[1.0f64, 2.0, 3.0, 4.0]).into_owned();
        let b = tessera_core::transfer::le_bytes_of(&[5.0f64, 6.0, 7.0, 8.0]).into_owned();
        let out = session
            .matrix_multiply(&[a.as_slice().into(), b.as_slice().into(), HostArg::Number(2.0)])
            .unwrap();
        assert_eq!(out.to_elements::<f64>().unwrap(), vec![19.0, 22.0, 43.0, 50.0]);
        assert_eq!(session.last_invocation().unwrap().crossings.total(), 3);
    }

    #[test]
    fn test_fractal_defaults_iteration_bound() {
        let session = Session::guest();
        let args: Vec<HostArg> = [1.0, 1.0, 0.0, 1.0, 0.0, 1.0].iter().map(|&v| HostArg::Number(v)).collect();
        let out = session.fractal_generate(&args).unwrap();
        // Single pixel at c = (0, 0) never escapes.
        assert_eq!(out.to_elements::<i32>().unwrap(), vec![100]);
    }

    #[test]
    fn test_fractal_rejects_huge_bound() {
        let session = Session::guest();
        let args: Vec<HostArg> = [1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 3.0e9].iter().map(|&v| HostArg::Number(v)).collect();
        assert!(matches!(session.fractal_generate(&args), Err(TesseraError::Argument(_))));
    }

    #[test]
    fn test_hash_mix_zero_on_missing() {
        let session = Session::guest();
        assert_eq!(session.hash_mix(&[]), 0);
        assert_eq!(session.hash_mix(&[HostArg::from(&b"abc"[..])]), 0);
        assert_eq!(session.hash_mix(&[HostArg::Number(1.0), HostArg::Number(1.0)]), 0);
        assert_eq!(
            session.hash_mix(&[HostArg::from(&b"abc"[..]), HostArg::Number(3.0)]),
            hash::hash_mix(b"abc", 3)
        );
    }

    #[test]
    fn test_ray_samples_default() {
        let session = Session::guest();
        let out = session.ray_render(&[HostArg::Number(4.0), HostArg::Number(3.0)]).unwrap();
        assert_eq!(out.len(), 4 * 3 * 3);
        assert!(session.ray_render(&[HostArg::Number(4.0)]).is_err());
    }

    #[test]
    fn test_info_mentions_version() {
        assert!(Session::guest().info().contains(env!("CARGO_PKG_VERSION")));
    }
}
