//! C ABI for native hosts.
//!
//! Enable with the `ffi` feature flag.
//!
//! ```c
//! #include "tessera_edge.h"
//! TesseraBuffer a = { a_ptr, n * n * 8, NULL };
//! TesseraBuffer b = { b_ptr, n * n * 8, NULL };
//! TesseraOutput* out = NULL;
//! int status = tessera_matrix_multiply(&a, &b, (double)n, &out);
//! if (status == 0) { use((double*)out->data, out->byte_len / 8); }
//! tessera_free_output(out);
//! ```
//!
//! A buffer either points at contiguous little-endian bytes or, for hosts
//! that cannot expose their memory, carries a `TesseraReader` callback that
//! is invoked once per element.
//!
//! Status codes: 0 ok, 1 argument error, 2 encoding error, -1 null output
//! pointer.

use std::os::raw::c_void;

use tessera_core::{ElementWidth, TesseraError};

use crate::boundary::{ElementReader, HostBytes, HostView};
use crate::runtime::{HostArg, Session};

/// Per-element read callback: write element `index` as little-endian bytes
/// into `out` (`width` bytes).
pub type TesseraReadFn = unsafe extern "C" fn(ctx: *mut c_void, index: usize, out: *mut u8);

#[repr(C)]
pub struct TesseraReader {
    pub ctx: *mut c_void,
    pub len: usize,
    /// Element width in bytes: 8, 4 or 1.
    pub width: u32,
    pub read: Option<TesseraReadFn>,
}

/// Host buffer argument. `data` wins when non-null.
#[repr(C)]
pub struct TesseraBuffer {
    pub data: *const u8,
    pub byte_len: usize,
    pub reader: *const TesseraReader,
}

/// Result buffer owned by the library until `tessera_free_output`.
#[repr(C)]
pub struct TesseraOutput {
    pub data: *mut u8,
    pub byte_len: usize,
    /// Element width in bytes.
    pub element_width: u32,
}

struct CallbackReader<'a> {
    raw: &'a TesseraReader,
    read: TesseraReadFn,
    width: ElementWidth,
}

impl ElementReader for CallbackReader<'_> {
    fn width(&self) -> ElementWidth {
        self.width
    }

    fn len(&self) -> usize {
        self.raw.len
    }

    fn read_le(&self, index: usize, out: &mut [u8]) {
        // SAFETY: the host promised `read` writes exactly `width` bytes.
        unsafe { (self.read)(self.raw.ctx, index, out.as_mut_ptr()) }
    }
}

fn width_from_bytes(width: u32) -> Option<ElementWidth> {
    match width {
        8 => Some(ElementWidth::F64),
        4 => Some(ElementWidth::I32),
        1 => Some(ElementWidth::U8),
        _ => None,
    }
}

/// Resolved host buffer; keeps the callback adapter alive for the call.
enum Resolved<'a> {
    Missing,
    Bytes(&'a [u8]),
    Reader(CallbackReader<'a>),
    BadReader(u32),
}

impl<'a> Resolved<'a> {
    unsafe fn from_raw(buf: *const TesseraBuffer) -> Self {
        if buf.is_null() {
            return Resolved::Missing;
        }
        let buf = &*buf;
        if !buf.data.is_null() {
            return Resolved::Bytes(std::slice::from_raw_parts(buf.data, buf.byte_len));
        }
        if buf.reader.is_null() {
            return Resolved::Missing;
        }
        let raw = &*buf.reader;
        match (raw.read, width_from_bytes(raw.width)) {
            (Some(read), Some(width)) => Resolved::Reader(CallbackReader { raw, read, width }),
            (None, _) => Resolved::Missing,
            (_, None) => Resolved::BadReader(raw.width),
        }
    }

    fn arg(&self) -> Result<HostArg<'_>, TesseraError> {
        match self {
            Resolved::Missing => Ok(HostArg::Missing),
            Resolved::Bytes(bytes) => Ok(HostArg::Buffer(HostView::Contiguous(bytes))),
            Resolved::Reader(reader) => Ok(HostArg::Buffer(HostView::Elementwise(reader))),
            Resolved::BadReader(width) => Err(TesseraError::Argument(format!("reader element width {} is not 1, 4 or 8", width))),
        }
    }
}

unsafe fn write_output(result: Result<HostBytes, TesseraError>, out: *mut *mut TesseraOutput) -> i32 {
    if out.is_null() {
        return -1;
    }
    match result {
        Ok(bytes) => {
            let element_width = bytes.width().size() as u32;
            let byte_len = bytes.byte_len();
            let data = Box::into_raw(bytes.into_vec().into_boxed_slice()) as *mut u8;
            *out = Box::into_raw(Box::new(TesseraOutput {
                data,
                byte_len,
                element_width,
            }));
            0
        }
        Err(e) => {
            tracing::debug!("ffi call failed: {}", e);
            *out = std::ptr::null_mut();
            e.kind().status_code()
        }
    }
}

/// C = A × B for n×n f64 matrices.
#[no_mangle]
pub unsafe extern "C" fn tessera_matrix_multiply(
    a: *const TesseraBuffer,
    b: *const TesseraBuffer,
    size: f64,
    out: *mut *mut TesseraOutput,
) -> i32 {
    let (a, b) = (Resolved::from_raw(a), Resolved::from_raw(b));
    let result = a.arg().and_then(|a| {
        let b = b.arg()?;
        Session::guest().matrix_multiply(&[a, b, HostArg::Number(size)])
    });
    write_output(result, out)
}

/// Escape counts for a width×height grid. `max_iterations < 0` selects the
/// default bound.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn tessera_fractal_generate(
    width: f64,
    height: f64,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    max_iterations: f64,
    out: *mut *mut TesseraOutput,
) -> i32 {
    let bound = if max_iterations < 0.0 { HostArg::Missing } else { HostArg::Number(max_iterations) };
    let args = [
        HostArg::Number(width),
        HostArg::Number(height),
        HostArg::Number(xmin),
        HostArg::Number(xmax),
        HostArg::Number(ymin),
        HostArg::Number(ymax),
        bound,
    ];
    write_output(Session::guest().fractal_generate(&args), out)
}

/// Single-lane hash of `data`; 0 on a missing buffer.
#[no_mangle]
pub unsafe extern "C" fn tessera_hash_mix(data: *const TesseraBuffer, iterations: f64) -> u32 {
    let data = Resolved::from_raw(data);
    match data.arg() {
        Ok(arg) => Session::guest().hash_mix(&[arg, HostArg::Number(iterations)]),
        Err(_) => 0,
    }
}

/// RGB f64 image of width×height. `samples <= 0` means one sample.
#[no_mangle]
pub unsafe extern "C" fn tessera_ray_render(width: f64, height: f64, samples: f64, out: *mut *mut TesseraOutput) -> i32 {
    let samples = if samples <= 0.0 { HostArg::Missing } else { HostArg::Number(samples) };
    let args = [HostArg::Number(width), HostArg::Number(height), samples];
    write_output(Session::guest().ray_render(&args), out)
}

/// Free a TesseraOutput.
#[no_mangle]
pub unsafe extern "C" fn tessera_free_output(output: *mut TesseraOutput) {
    if !output.is_null() {
        let out = Box::from_raw(output);
        if !out.data.is_null() {
            let _ = Box::from_raw(std::slice::from_raw_parts_mut(out.data, out.byte_len) as *mut [u8]);
        }
    }
}
