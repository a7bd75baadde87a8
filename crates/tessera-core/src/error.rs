use serde::{Deserialize, Serialize};

use crate::ElementWidth;

/// Boundary errors.
///
/// Kernels themselves are total; every failure is detected while the
/// boundary validates host arguments, before any compute starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TesseraError {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("argument error: expected at least {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("argument error: host buffer holds {available} {width} elements, need {needed}")]
    Undersized {
        width: ElementWidth,
        needed: usize,
        available: usize,
    },

    #[error("encoding error: {byte_len} bytes is not a whole number of {width} elements")]
    Misaligned { width: ElementWidth, byte_len: usize },

    #[error("encoding error: expected {expected} bytes for {count} {width} elements, got {got}")]
    LengthMismatch {
        width: ElementWidth,
        count: usize,
        expected: usize,
        got: usize,
    },

    #[error("encoding error: host buffer carries {got} elements, requested {expected}")]
    WidthMismatch {
        expected: ElementWidth,
        got: ElementWidth,
    },
}

impl TesseraError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TesseraError::Argument(_) | TesseraError::Arity { .. } | TesseraError::Undersized { .. } => {
                ErrorKind::ArgumentError
            }
            TesseraError::Misaligned { .. }
            | TesseraError::LengthMismatch { .. }
            | TesseraError::WidthMismatch { .. } => ErrorKind::EncodingError,
        }
    }

    /// Structured failure object handed back across the boundary.
    pub fn to_failure(&self) -> CallFailure {
        CallFailure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Error category visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ArgumentError,
    EncodingError,
}

impl ErrorKind {
    /// Stable numeric status used by the C ABI (0 is success).
    pub fn status_code(&self) -> i32 {
        match self {
            ErrorKind::ArgumentError => 1,
            ErrorKind::EncodingError => 2,
        }
    }
}

/// Serializable failure for hosts that cannot receive native errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallFailure {
    /// JSON rendering, e.g. `{"kind":"ArgumentError","message":"..."}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"kind\":\"{:?}\"}}", self.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let e = TesseraError::Arity { expected: 3, got: 2 };
        assert_eq!(e.kind(), ErrorKind::ArgumentError);

        let e = TesseraError::Misaligned { width: ElementWidth::F64, byte_len: 7 };
        assert_eq!(e.kind(), ErrorKind::EncodingError);
        assert_eq!(e.kind().status_code(), 2);
    }

    #[test]
    fn test_failure_json() {
        let e = TesseraError::Argument("size must be \"integral\"".into());
        let json = e.to_failure().to_json();
        assert!(json.starts_with("{\"kind\":\"ArgumentError\""), "got {}", json);
        assert!(json.contains("\\\"integral\\\""), "got {}", json);
    }
}
