use std::fmt;

use serde::{Deserialize, Serialize};

/// The four kernels behind the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    Matrix,
    Fractal,
    Hash,
    Ray,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelKind::Matrix => write!(f, "matrix"),
            KernelKind::Fractal => write!(f, "fractal"),
            KernelKind::Hash => write!(f, "hash"),
            KernelKind::Ray => write!(f, "ray"),
        }
    }
}

/// How a kernel executes. Chosen once per call by the dispatcher.
///
/// `Naive` is the reference loop nest, `CacheBlocked` the tiled single-lane
/// kernel, and `Parallel` splits the output into static lanes that a
/// [`crate::WorkerGroup`] drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Naive,
    CacheBlocked,
    Parallel,
}

impl Strategy {
    /// Whether this strategy runs more than one lane.
    pub fn is_multi_lane(&self) -> bool {
        matches!(self, Strategy::Parallel)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Naive => write!(f, "naive"),
            Strategy::CacheBlocked => write!(f, "cache-blocked"),
            Strategy::Parallel => write!(f, "parallel"),
        }
    }
}
