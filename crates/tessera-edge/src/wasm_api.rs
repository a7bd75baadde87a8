//! JS bindings via wasm-bindgen.
//!
//! The exported functions are only compiled when targeting `wasm32`.
//! Build with: `wasm-pack build --target web crates/tessera-edge`
//!
//! ## JavaScript API
//!
//! ```js
//! import init, { matrixMultiply, fractalGenerate, hashMix, rayRender } from '@tessera/edge';
//!
//! await init();
//! const c = new Float64Array(matrixMultiply(a, b, n).buffer);        // a, b: Float64Array
//! const counts = new Int32Array(fractalGenerate(640, 480, -2.5, 1, -1.25, 1.25).buffer);
//! const h = hashMix(new TextEncoder().encode('abc'), 1000);
//! const rgb = new Float64Array(rayRender(320, 240, 4).buffer);
//! ```
//!
//! Typed-array arguments arrive in guest memory with one bulk copy and
//! results leave as one `Uint8Array` of little-endian bytes. Failures are
//! thrown as a JSON string `{"kind": "ArgumentError", "message": ...}`.
//!
//! Every call builds a fresh guest session; nothing survives between calls.

use tessera_core::CallFailure;

use crate::boundary::HostView;
use crate::runtime::{HostArg, Session};

fn number(v: Option<f64>) -> HostArg<'static> {
    v.map_or(HostArg::Missing, HostArg::Number)
}

fn view(bytes: Option<&[u8]>) -> HostArg<'_> {
    bytes.map_or(HostArg::Missing, |b| HostArg::Buffer(HostView::Contiguous(b)))
}

/// `matrixMultiply` over host-provided f64 arrays.
pub fn matrix_multiply_bytes(a: Option<&[f64]>, b: Option<&[f64]>, size: Option<f64>) -> Result<Vec<u8>, CallFailure> {
    let a = a.map(tessera_core::transfer::le_bytes_of);
    let b = b.map(tessera_core::transfer::le_bytes_of);
    let args = [view(a.as_deref()), view(b.as_deref()), number(size)];
    Session::guest()
        .matrix_multiply(&args)
        .map(|out| out.into_vec())
        .map_err(|e| e.to_failure())
}

/// `fractalGenerate`; `max_iterations` defaults to 100.
#[allow(clippy::too_many_arguments)]
pub fn fractal_generate_bytes(
    width: Option<f64>,
    height: Option<f64>,
    xmin: Option<f64>,
    xmax: Option<f64>,
    ymin: Option<f64>,
    ymax: Option<f64>,
    max_iterations: Option<f64>,
) -> Result<Vec<u8>, CallFailure> {
    let args = [width, height, xmin, xmax, ymin, ymax, max_iterations].map(number);
    Session::guest()
        .fractal_generate(&args)
        .map(|out| out.into_vec())
        .map_err(|e| e.to_failure())
}

/// `hashMix`; 0 when an argument is missing.
pub fn hash_mix_bytes(data: Option<&[u8]>, iterations: Option<f64>) -> u32 {
    Session::guest().hash_mix(&[view(data), number(iterations)])
}

/// `rayRender`; `samples` defaults to 1.
pub fn ray_render_bytes(width: Option<f64>, height: Option<f64>, samples: Option<f64>) -> Result<Vec<u8>, CallFailure> {
    let args = [width, height, samples].map(number);
    Session::guest()
        .ray_render(&args)
        .map(|out| out.into_vec())
        .map_err(|e| e.to_failure())
}

#[cfg(target_arch = "wasm32")]
mod exports {
    use wasm_bindgen::prelude::*;

    use super::*;

    fn throw(failure: CallFailure) -> JsValue {
        JsValue::from_str(&failure.to_json())
    }

    #[wasm_bindgen(js_name = "matrixMultiply")]
    pub fn matrix_multiply(a: Option<Box<[f64]>>, b: Option<Box<[f64]>>, size: Option<f64>) -> Result<Vec<u8>, JsValue> {
        matrix_multiply_bytes(a.as_deref(), b.as_deref(), size).map_err(throw)
    }

    #[wasm_bindgen(js_name = "fractalGenerate")]
    #[allow(clippy::too_many_arguments)]
    pub fn fractal_generate(
        width: Option<f64>,
        height: Option<f64>,
        xmin: Option<f64>,
        xmax: Option<f64>,
        ymin: Option<f64>,
        ymax: Option<f64>,
        max_iterations: Option<f64>,
    ) -> Result<Vec<u8>, JsValue> {
        fractal_generate_bytes(width, height, xmin, xmax, ymin, ymax, max_iterations).map_err(throw)
    }

    #[wasm_bindgen(js_name = "hashMix")]
    pub fn hash_mix(data: Option<Box<[u8]>>, iterations: Option<f64>) -> u32 {
        hash_mix_bytes(data.as_deref(), iterations)
    }

    #[wasm_bindgen(js_name = "rayRender")]
    pub fn ray_render(width: Option<f64>, height: Option<f64>, samples: Option<f64>) -> Result<Vec<u8>, JsValue> {
        ray_render_bytes(width, height, samples).map_err(throw)
    }

    #[wasm_bindgen(js_name = "backendInfo")]
    pub fn backend_info() -> String {
        Session::guest().info()
    }
}
