//! Dispatch policy: picks one strategy per call from the work size.
//!
//! The policy is a plain threshold table plus the scheduling context the
//! guest runs in. Under `SingleThreadGuest` every kernel is single-lane
//! unless `force_multi_lane` is set, in which case the multi-lane path runs
//! cooperatively on the calling thread. Under `ParallelHost` a kernel goes
//! multi-lane only once its work size reaches the kernel's threshold.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_kernels::{KernelKind, Strategy, WorkerGroup};
use thiserror::Error;

/// Where the guest's compute runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionContext {
    /// One logical thread (a browser WASM instance without threads).
    SingleThreadGuest,
    /// A host that can run `workers` threads for one call.
    ParallelHost { workers: usize },
}

impl ExecutionContext {
    /// A parallel host sized to the machine's available parallelism.
    pub fn detect_host() -> Self {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        ExecutionContext::ParallelHost { workers }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionContext::SingleThreadGuest => 1,
            ExecutionContext::ParallelHost { workers } => (*workers).max(1),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::SingleThreadGuest
    }
}

/// Minimum work size per kernel before the multi-lane path is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Matrix side length n.
    pub matrix_min_size: usize,
    /// width × height.
    pub fractal_min_pixels: usize,
    /// Hash pass count.
    pub hash_min_iterations: usize,
    /// width × height.
    pub ray_min_pixels: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            matrix_min_size: 128,
            fractal_min_pixels: 256 * 256,
            hash_min_iterations: 50_000,
            ray_min_pixels: 256 * 256,
        }
    }
}

impl Thresholds {
    pub fn for_kernel(&self, kind: KernelKind) -> usize {
        match kind {
            KernelKind::Matrix => self.matrix_min_size,
            KernelKind::Fractal => self.fractal_min_pixels,
            KernelKind::Hash => self.hash_min_iterations,
            KernelKind::Ray => self.ray_min_pixels,
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid dispatch policy: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot read dispatch policy: {0}")]
    Io(#[from] std::io::Error),
}

/// Threshold table plus scheduling context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    pub context: ExecutionContext,
    pub thresholds: Thresholds,
    /// Lane count of the laned hash (fixed so the digest does not depend on
    /// the machine).
    pub hash_lanes: usize,
    /// Run multi-lane paths cooperatively in a single-thread guest when the
    /// threshold is met. Parity testing only.
    pub force_multi_lane: bool,
    /// Strategy used below threshold.
    pub single_lane_strategy: Strategy,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::guest()
    }
}

impl DispatchPolicy {
    /// Single-thread guest: every kernel single-lane.
    pub fn guest() -> Self {
        Self {
            context: ExecutionContext::SingleThreadGuest,
            thresholds: Thresholds::default(),
            hash_lanes: tessera_kernels::hash::DEFAULT_LANES,
            force_multi_lane: false,
            single_lane_strategy: Strategy::CacheBlocked,
        }
    }

    /// Parallel host with a fixed worker count.
    pub fn host(workers: usize) -> Self {
        Self {
            context: ExecutionContext::ParallelHost { workers: workers.max(1) },
            ..Self::guest()
        }
    }

    /// Parallel host sized to the machine.
    pub fn host_default() -> Self {
        Self {
            context: ExecutionContext::detect_host(),
            ..Self::guest()
        }
    }

    /// Parse a policy from JSON; missing fields take their defaults.
    ///
    /// ```json
    /// { "context": { "kind": "parallel_host", "workers": 8 },
    ///   "thresholds": { "matrix_min_size": 256 } }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Choose the plan for one call.
    pub fn select(&self, kernel: KernelKind, work_size: usize) -> ExecutionPlan {
        let threshold = self.thresholds.for_kernel(kernel);
        let meets = work_size >= threshold;

        let (strategy, workers) = match self.context {
            ExecutionContext::ParallelHost { .. } if meets => (Strategy::Parallel, self.context.workers()),
            ExecutionContext::SingleThreadGuest if meets && self.force_multi_lane => (Strategy::Parallel, 1),
            _ => (self.single_lane_strategy, 1),
        };

        let plan = ExecutionPlan {
            kernel,
            strategy,
            workers,
            work_size,
            threshold,
        };
        tracing::debug!(
            "dispatch {}: work size {} vs threshold {} -> {} on {} worker(s)",
            kernel,
            work_size,
            threshold,
            strategy,
            workers
        );
        plan
    }
}

/// The decision made for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub kernel: KernelKind,
    pub strategy: Strategy,
    pub workers: usize,
    pub work_size: usize,
    pub threshold: usize,
}

impl ExecutionPlan {
    pub fn is_multi_lane(&self) -> bool {
        self.strategy.is_multi_lane()
    }

    /// Build the worker group for this call. Joined and dropped by the caller
    /// before the call returns.
    pub fn worker_group(&self) -> WorkerGroup {
        if self.is_multi_lane() && self.workers > 1 {
            WorkerGroup::new(self.workers)
        } else {
            WorkerGroup::cooperative()
        }
    }
}
