//! Boundary transfer adapter between host and guest memory.
//!
//! Imports move a host buffer into freshly allocated guest memory and
//! exports move a guest buffer into a freshly allocated host-visible buffer.
//! When the host exposes a contiguous byte view each direction is a single
//! bulk copy, i.e. one boundary crossing regardless of size. Hosts that can
//! only hand out an element accessor force the per-element path, which
//! costs one crossing per element and is logged as degraded.
//!
//! Every transfer is recorded in a [`CrossingLedger`] so tests and the CLI
//! can count crossings instead of timing them.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_core::{transfer, Element, ElementWidth, GuestBuffer, Result, TesseraError};

/// Per-element accessor for hosts without a byte-addressable view.
pub trait ElementReader {
    /// Width of the elements the host stores.
    fn width(&self) -> ElementWidth;

    /// Number of elements available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the little-endian bytes of element `index` into `out`
    /// (`out.len() == self.width().size()`).
    fn read_le(&self, index: usize, out: &mut [u8]);
}

/// How the host exposes a buffer to the guest.
#[derive(Clone, Copy)]
pub enum HostView<'a> {
    /// Byte-addressable contiguous little-endian memory.
    Contiguous(&'a [u8]),
    /// Only an element accessor; every read is a boundary crossing.
    Elementwise(&'a dyn ElementReader),
}

impl std::fmt::Debug for HostView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostView::Contiguous(bytes) => write!(f, "Contiguous({} bytes)", bytes.len()),
            HostView::Elementwise(r) => write!(f, "Elementwise({} x {})", r.len(), r.width()),
        }
    }
}

/// A host-visible buffer produced by an export.
///
/// The bytes are little-endian and can be reinterpreted in place by the
/// host as `Float64Array` / `Int32Array` (or `double*` / `int32_t*`).
#[derive(Debug, Clone, PartialEq)]
pub struct HostBytes {
    bytes: Vec<u8>,
    width: ElementWidth,
    count: usize,
}

impl HostBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> ElementWidth {
        self.width
    }

    /// Number of elements (not bytes).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// View these bytes as a host handle, e.g. to feed an output back in.
    pub fn view(&self) -> HostView<'_> {
        HostView::Contiguous(&self.bytes)
    }

    /// Host-side decode, for tests and native callers.
    pub fn to_elements<T: Element>(&self) -> Result<Vec<T>> {
        if T::WIDTH != self.width {
            return Err(TesseraError::WidthMismatch {
                expected: T::WIDTH,
                got: self.width,
            });
        }
        Ok(transfer::vec_from_le_bytes(&self.bytes, self.count))
    }
}

/// Cumulative boundary crossings.
#[derive(Debug, Default)]
pub struct CrossingLedger {
    imports: AtomicU64,
    exports: AtomicU64,
    element_reads: AtomicU64,
}

/// Crossing counts, either a ledger snapshot or one call's own tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CrossingCount {
    pub imports: u64,
    pub exports: u64,
    pub element_reads: u64,
}

impl CrossingCount {
    pub fn total(&self) -> u64 {
        self.imports + self.exports + self.element_reads
    }
}

impl CrossingLedger {
    pub fn snapshot(&self) -> CrossingCount {
        CrossingCount {
            imports: self.imports.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            element_reads: self.element_reads.load(Ordering::Relaxed),
        }
    }

    fn add(&self, count: &CrossingCount) {
        self.imports.fetch_add(count.imports, Ordering::Relaxed);
        self.exports.fetch_add(count.exports, Ordering::Relaxed);
        self.element_reads.fetch_add(count.element_reads, Ordering::Relaxed);
    }
}

/// The only path by which data enters or leaves guest memory.
#[derive(Debug, Default)]
pub struct Boundary {
    ledger: CrossingLedger,
}

impl Boundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals over every call made through this boundary.
    pub fn ledger(&self) -> &CrossingLedger {
        &self.ledger
    }

    /// Open a per-call transfer. Its tally only sees that call's crossings,
    /// however many other calls share the boundary.
    pub fn begin_call(&self) -> CallTransfer<'_> {
        CallTransfer {
            boundary: self,
            crossings: CrossingCount::default(),
        }
    }

    /// Import `count` elements of `T` from a host buffer.
    pub fn import<T: Element>(&self, view: HostView<'_>, count: usize) -> Result<GuestBuffer<T>> {
        self.begin_call().import(view, count)
    }

    /// Import a whole host byte buffer (hash input), however long it is.
    pub fn import_bytes(&self, view: HostView<'_>) -> Result<GuestBuffer<u8>> {
        self.begin_call().import_bytes(view)
    }

    /// Export a guest buffer as one freshly allocated host buffer.
    pub fn export<T: Element>(&self, buffer: GuestBuffer<T>) -> HostBytes {
        self.begin_call().export(buffer)
    }
}

/// Transfers made on behalf of one call.
///
/// Every crossing is added both to the call's own tally and to the
/// boundary's shared ledger.
#[derive(Debug)]
pub struct CallTransfer<'b> {
    boundary: &'b Boundary,
    crossings: CrossingCount,
}

impl CallTransfer<'_> {
    /// Crossings made by this call so far.
    pub fn crossings(&self) -> CrossingCount {
        self.crossings
    }

    fn record(&mut self, count: CrossingCount) {
        self.crossings.imports += count.imports;
        self.crossings.exports += count.exports;
        self.crossings.element_reads += count.element_reads;
        self.boundary.ledger.add(&count);
    }

    /// Import `count` elements of `T` from a host buffer.
    ///
    /// All validation happens before any byte is copied:
    /// - fewer whole elements than `count` → argument error
    /// - a byte length that is not a multiple of the width, more bytes than
    ///   `count` needs, or a reader of a different width → encoding error
    pub fn import<T: Element>(&mut self, view: HostView<'_>, count: usize) -> Result<GuestBuffer<T>> {
        let width = T::WIDTH;
        match view {
            HostView::Contiguous(bytes) => {
                let needed = width
                    .storage_bytes(count)
                    .ok_or_else(|| TesseraError::Argument(format!("{} {} elements overflow guest memory", count, width)))?;
                if bytes.len() % width.size() != 0 {
                    return Err(TesseraError::Misaligned { width, byte_len: bytes.len() });
                }
                if bytes.len() < needed {
                    return Err(TesseraError::Undersized {
                        width,
                        needed: count,
                        available: bytes.len() / width.size(),
                    });
                }
                if bytes.len() > needed {
                    return Err(TesseraError::LengthMismatch {
                        width,
                        count,
                        expected: needed,
                        got: bytes.len(),
                    });
                }

                let buffer = GuestBuffer::from_le_bytes(bytes, count)?;
                self.record(CrossingCount { imports: 1, ..CrossingCount::default() });
                tracing::trace!("bulk import: {} {} elements ({} bytes)", count, width, bytes.len());
                Ok(buffer)
            }
            HostView::Elementwise(reader) => {
                if reader.width() != width {
                    return Err(TesseraError::WidthMismatch {
                        expected: width,
                        got: reader.width(),
                    });
                }
                if reader.len() < count {
                    return Err(TesseraError::Undersized {
                        width,
                        needed: count,
                        available: reader.len(),
                    });
                }
                if reader.len() > count {
                    return Err(TesseraError::LengthMismatch {
                        width,
                        count,
                        expected: count.saturating_mul(width.size()),
                        got: reader.len().saturating_mul(width.size()),
                    });
                }

                tracing::warn!(
                    "degraded import: host handle is not byte-addressable, reading {} {} elements one crossing at a time",
                    count,
                    width
                );
                let mut data = Vec::with_capacity(count);
                let mut scratch = [0u8; 8];
                let slot = &mut scratch[..width.size()];
                for i in 0..count {
                    reader.read_le(i, slot);
                    data.push(transfer::element_from_le_bytes::<T>(slot));
                }
                self.record(CrossingCount { element_reads: count as u64, ..CrossingCount::default() });
                Ok(GuestBuffer::from_vec(data))
            }
        }
    }

    /// Import a whole host byte buffer (hash input), however long it is.
    pub fn import_bytes(&mut self, view: HostView<'_>) -> Result<GuestBuffer<u8>> {
        let count = match view {
            HostView::Contiguous(bytes) => bytes.len(),
            HostView::Elementwise(reader) => reader.len(),
        };
        self.import::<u8>(view, count)
    }

    /// Export a guest buffer as one freshly allocated host buffer.
    pub fn export<T: Element>(&mut self, buffer: GuestBuffer<T>) -> HostBytes {
        let count = buffer.numel();
        let mut bytes = vec![0u8; buffer.nbytes()];
        transfer::copy_to_le_bytes(buffer.as_slice(), &mut bytes);
        self.record(CrossingCount { exports: 1, ..CrossingCount::default() });
        tracing::trace!("bulk export: {} {} elements ({} bytes)", count, T::WIDTH, bytes.len());
        HostBytes {
            bytes,
            width: T::WIDTH,
            count,
        }
    }
}

/// Little-endian host view over a typed slice (tests, CLI, wasm glue).
pub fn host_bytes_of<T: Element>(values: &[T]) -> Cow<'_, [u8]> {
    transfer::le_bytes_of(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecReader(Vec<f64>);

    impl ElementReader for VecReader {
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
    fn test_roundtrip_is_bit_identical() {
        let boundary = Boundary::new();
        let values = vec![0.0f64, -0.0, 1.0e-308, f64::INFINITY, f64::NAN, 3.5];
        let exported = boundary.export(GuestBuffer::from_vec(values.clone()));
        let back = boundary.import::<f64>(exported.view(), values.len()).unwrap();
        for (a, b) in values.iter().zip(back.as_slice()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }

        let ints = vec![i32::MIN, -1, 0, 1, i32::MAX];
        let exported = boundary.export(GuestBuffer::from_vec(ints.clone()));
        let back = boundary.import::<i32>(exported.view(), ints.len()).unwrap();
        assert_eq!(back.as_slice(), &ints[..]);

        let raw: Vec<u8> = (0..=255u8).collect();
        let exported = boundary.export(GuestBuffer::from_vec(raw.clone()));
        assert_eq!(exported.width(), ElementWidth::U8);
        assert_eq!(exported.as_bytes(), &raw[..]);
        let back = boundary.import_bytes(exported.view()).unwrap();
        assert_eq!(back.as_slice(), &raw[..]);
    }

    #[test]
    fn test_call_transfer_counts_only_its_own_crossings() {
        let boundary = Boundary::new();
        let bytes = host_bytes_of(&[1.0f64, 2.0]);

        let mut first = boundary.begin_call();
        let mut second = boundary.begin_call();
        let a = first.import::<f64>(HostView::Contiguous(&bytes), 2).unwrap();
        second.import::<f64>(HostView::Contiguous(&bytes), 2).unwrap();
        second.import::<f64>(HostView::Contiguous(&bytes), 2).unwrap();
        first.export(a);

        assert_eq!(first.crossings(), CrossingCount { imports: 1, exports: 1, element_reads: 0 });
        assert_eq!(second.crossings().total(), 2);
        assert_eq!(boundary.ledger().snapshot().total(), 4);
    }

    #[test]
    fn test_failed_import_is_not_counted() {
        let boundary = Boundary::new();
        let mut call = boundary.begin_call();
        assert!(call.import::<f64>(HostView::Contiguous(&[0u8; 12]), 2).is_err());
        assert_eq!(call.crossings().total(), 0);
    }

    #[test]
    fn test_bulk_import_is_one_crossing() {
        let boundary = Boundary::new();
        let values: Vec<f64> = (0..10_000).map(|i| i as f64).collect();
        let bytes = host_bytes_of(&values);
        boundary.import::<f64>(HostView::Contiguous(&bytes), values.len()).unwrap();
        let count = boundary.ledger().snapshot();
        assert_eq!(count.imports, 1);
        assert_eq!(count.total(), 1);
    }

    #[test]
    fn test_elementwise_import_is_degraded() {
        let boundary = Boundary::new();
        let reader = VecReader(vec![1.0, 2.0, 3.0]);
        let buf = boundary.import::<f64>(HostView::Elementwise(&reader), 3).unwrap();
        assert_eq!(buf.as_slice(), &[1.0, 2.0, 3.0]);
        let count = boundary.ledger().snapshot();
        assert_eq!(count.element_reads, 3);
        assert_eq!(count.imports, 0);
    }

    #[test]
    fn test_undersized_is_argument_error() {
        let boundary = Boundary::new();
        let err = boundary.import::<f64>(HostView::Contiguous(&[0u8; 16]), 3).unwrap_err();
        assert_eq!(err.kind(), tessera_core::ErrorKind::ArgumentError);

        let reader = VecReader(vec![1.0]);
        let err = boundary.import::<f64>(HostView::Elementwise(&reader), 2).unwrap_err();
        assert_eq!(err.kind(), tessera_core::ErrorKind::ArgumentError);
        assert_eq!(boundary.ledger().snapshot().total(), 0);
    }

    #[test]
    fn test_width_and_count_mismatch_is_encoding_error() {
        let boundary = Boundary::new();
        let err = boundary.import::<f64>(HostView::Contiguous(&[0u8; 20]), 2).unwrap_err();
        assert!(matches!(err, TesseraError::Misaligned { .. }));

        let err = boundary.import::<f64>(HostView::Contiguous(&[0u8; 32]), 2).unwrap_err();
        assert!(matches!(err, TesseraError::LengthMismatch { .. }));

        let reader = VecReader(vec![1.0, 2.0]);
        let err = boundary.import::<i32>(HostView::Elementwise(&reader), 2).unwrap_err();
        assert!(matches!(err, TesseraError::WidthMismatch { .. }));
        assert_eq!(err.kind(), tessera_core::ErrorKind::EncodingError);
    }

    #[test]
    fn test_export_layout_is_little_endian() {
        let boundary = Boundary::new();
        let out = boundary.export(GuestBuffer::from_vec(vec![1.0f64]));
        assert_eq!(out.as_bytes(), &1.0f64.to_le_bytes());
        assert_eq!(out.width(), ElementWidth::F64);
        assert_eq!(out.len(), 1);
        assert_eq!(out.byte_len(), 8);
    }

    #[test]
    fn test_import_bytes_takes_whole_buffer() {
        let boundary = Boundary::new();
        let buf = boundary.import_bytes(HostView::Contiguous(b"hello")).unwrap();
        assert_eq!(buf.as_slice(), b"hello");
    }
}
