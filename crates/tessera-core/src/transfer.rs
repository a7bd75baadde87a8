//! Audited byte reinterpretation for bulk boundary transfers.
//!
//! This is the only module that views typed element buffers as raw bytes.
//! Every entry point asserts the byte length against the element count and
//! the alignment of the typed side before copying, and all casts go through
//! `bytemuck` so no pointer arithmetic happens here.
//!
//! Wire format is little-endian. On little-endian targets (wasm32, x86_64,
//! aarch64) each transfer is exactly one `copy_from_slice`; big-endian
//! targets swap in place after the copy.

use std::borrow::Cow;

use crate::Element;

/// Allocate `count` elements and fill them from `bytes` with one bulk copy.
///
/// Panics if `bytes.len() != count * T::WIDTH.size()`; callers validate
/// lengths and report a `TesseraError` before reaching this point.
pub fn vec_from_le_bytes<T: Element>(bytes: &[u8], count: usize) -> Vec<T> {
    let expected = count.saturating_mul(T::WIDTH.size());
    assert_eq!(
        bytes.len(),
        expected,
        "bulk import: {} bytes for {} {} elements",
        bytes.len(),
        count,
        T::WIDTH
    );

    let mut out = vec![T::default(); count];
    {
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
        assert_aligned::<T>(dst.as_ptr());
        dst.copy_from_slice(bytes);
    }

    #[cfg(target_endian = "big")]
    for v in out.iter_mut() {
        *v = v.from_le();
    }

    out
}

/// Copy typed elements into `dst` as little-endian bytes with one bulk copy.
///
/// Panics if `dst.len() != src.len() * T::WIDTH.size()`.
pub fn copy_to_le_bytes<T: Element>(src: &[T], dst: &mut [u8]) {
    assert_eq!(
        dst.len(),
        src.len() * T::WIDTH.size(),
        "bulk export: {} bytes for {} {} elements",
        dst.len(),
        src.len(),
        T::WIDTH
    );
    assert_aligned::<T>(src.as_ptr() as *const u8);

    #[cfg(target_endian = "little")]
    dst.copy_from_slice(bytemuck::cast_slice(src));

    #[cfg(target_endian = "big")]
    {
        let swapped: Vec<T> = src.iter().map(|v| v.to_le()).collect();
        dst.copy_from_slice(bytemuck::cast_slice(&swapped));
    }
}

/// Little-endian byte view of a typed slice, as a host would expose it.
///
/// Borrowed (zero-copy) on little-endian targets.
pub fn le_bytes_of<T: Element>(src: &[T]) -> Cow<'_, [u8]> {
    #[cfg(target_endian = "little")]
    {
        Cow::Borrowed(bytemuck::cast_slice(src))
    }

    #[cfg(target_endian = "big")]
    {
        let mut bytes = vec![0u8; src.len() * T::WIDTH.size()];
        copy_to_le_bytes(src, &mut bytes);
        Cow::Owned(bytes)
    }
}

/// Decode a single little-endian element (degraded per-element path).
pub fn element_from_le_bytes<T: Element>(bytes: &[u8]) -> T {
    assert_eq!(bytes.len(), T::WIDTH.size(), "element decode: wrong byte width");
    let v: T = bytemuck::pod_read_unaligned(bytes);
    v.from_le()
}

#[inline]
fn assert_aligned<T>(ptr: *const u8) {
    assert_eq!(
        ptr as usize % std::mem::align_of::<T>(),
        0,
        "typed buffer is not aligned for its element type"
    );
}
