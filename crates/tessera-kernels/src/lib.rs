//! # tessera-kernels
//!
//! Pure compute kernels that run entirely in guest-private memory.
//!
//! Provides:
//! - Cache-blocked f64 matmul (transposed B, 64/8 tiling, 2×2 micro-kernel)
//! - Escape-time fractal with 64×64 tiles and lanes-of-4 iteration
//! - Keyed multiply-rotate hash, single-lane and iteration-partitioned
//! - Single-sphere ray renderer with stratified supersampling
//! - Static lane partitions and call-scoped worker groups
//!
//! Every kernel is a total function of its work descriptor. Each one takes
//! a [`Strategy`] chosen by the dispatcher instead of exposing separately
//! named naive/blocked/parallel entry points.

pub mod descriptor;
pub mod strategy;
pub mod lanes;
pub mod cpu_matmul;
pub mod fractal;
pub mod hash;
pub mod ray;

pub use descriptor::{FractalDescriptor, HashDescriptor, MatrixDescriptor, RayDescriptor, Viewport};
pub use lanes::{Lane, WorkerGroup};
pub use strategy::{KernelKind, Strategy};
