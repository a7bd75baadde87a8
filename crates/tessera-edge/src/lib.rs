//! # tessera-edge
//!
//! Host-facing side of the Tessera kernels: everything between a host
//! call and a kernel running in guest memory.
//!
//! ## Key Features
//! - Boundary adapter: one bulk copy per buffer in each direction, with a
//!   crossing ledger and a logged per-element fallback
//! - Dispatch policy: threshold table over an explicit scheduling context
//! - Session entry points with positional host arguments
//! - wasm-bindgen JS API + C FFI

pub mod boundary;
pub mod plan;
pub mod runtime;

pub mod wasm_api;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use boundary::{Boundary, CallTransfer, CrossingCount, CrossingLedger, ElementReader, HostBytes, HostView};
pub use plan::{DispatchPolicy, ExecutionContext, ExecutionPlan, PolicyError, Thresholds};
pub use runtime::{HostArg, Invocation, Session, Traced};
