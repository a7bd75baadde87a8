//! # tessera-core
//!
//! Shared building blocks for the Tessera kernel runtime.
//!
//! Provides:
//! - `Element` / `ElementWidth`: the fixed-width numeric types that may
//!   cross the host/guest boundary (f64, i32, u8)
//! - `GuestBuffer`: freshly allocated, guest-private storage for one call
//! - `transfer`: the single audited place where typed buffers are viewed
//!   as raw little-endian bytes
//! - `TesseraError`: the boundary error taxonomy (argument / encoding)

pub mod dtype;
pub mod error;
pub mod storage;
pub mod transfer;

pub use dtype::{Element, ElementWidth};
pub use error::{CallFailure, ErrorKind, TesseraError};
pub use storage::GuestBuffer;

pub type Result<T> = std::result::Result<T, TesseraError>;
