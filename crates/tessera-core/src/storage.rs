use crate::{transfer, Element, ElementWidth, Result, TesseraError};

/// Guest-private numeric storage for a single call.
///
/// A `GuestBuffer` is created by the boundary (import) or by a kernel
/// (output) and consumed by the boundary on export. It is never shared with
/// the host and never pooled; dropping it releases the memory.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestBuffer<T: Element> {
    data: Vec<T>,
}

impl<T: Element> GuestBuffer<T> {
    /// Allocate zeroed storage for `numel` elements.
    pub fn zeros(numel: usize) -> Self {
        Self {
            data: vec![T::default(); numel],
        }
    }

    /// Take ownership of an already computed vector.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Create storage from little-endian bytes, validating the length.
    pub fn from_le_bytes(bytes: &[u8], numel: usize) -> Result<Self> {
        let expected = T::WIDTH
            .storage_bytes(numel)
            .ok_or_else(|| TesseraError::Argument(format!("{} elements overflow guest memory", numel)))?;
        if bytes.len() % T::WIDTH.size() != 0 {
            return Err(TesseraError::Misaligned {
                width: T::WIDTH,
                byte_len: bytes.len(),
            });
        }
        if bytes.len() != expected {
            return Err(TesseraError::LengthMismatch {
                width: T::WIDTH,
                count: numel,
                expected,
                got: bytes.len(),
            });
        }
        Ok(Self {
            data: transfer::vec_from_le_bytes(bytes, numel),
        })
    }

    /// Element width of this buffer.
    pub fn width(&self) -> ElementWidth {
        T::WIDTH
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Size in bytes once exported.
    pub fn nbytes(&self) -> usize {
        self.data.len() * T::WIDTH.size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}
