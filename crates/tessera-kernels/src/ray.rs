//! Single-sphere ray renderer.
//!
//! Scene: camera at the origin looking down −z, one sphere, a flat ambient
//! background and one directional light. Each pixel stores three
//! consecutive f64 channels (RGB) in [0, 1].
//!
//! All vector and quadratic math is written out inline in the pixel loop;
//! there are no shared vector helpers in the hot path.
//!
//! Supersampling uses stratified, deterministic sub-pixel offsets so extra
//! samples actually anti-alias instead of re-tracing the same ray.

use crate::descriptor::RayDescriptor;
use crate::lanes::{row_bands, WorkerGroup};
use crate::Strategy;

pub const SPHERE_CENTER: [f64; 3] = [0.0, 0.0, -3.0];
pub const SPHERE_RADIUS: f64 = 1.0;
pub const BACKGROUND: [f64; 3] = [0.2, 0.3, 0.5];
pub const ALBEDO: [f64; 3] = [1.0, 0.35, 0.25];
/// Direction towards the light (unnormalized).
pub const LIGHT_DIR: [f64; 3] = [1.0, 1.0, 1.0];

/// Render `width * height` RGB triples.
///
/// Ray rendering has no blocked form; `Naive` and `CacheBlocked` both run
/// the single-lane row loop, `Parallel` splits rows into bands.
pub fn render(desc: &RayDescriptor, strategy: Strategy, group: &WorkerGroup) -> Vec<f64> {
    let (w, h) = (desc.width, desc.height);
    let row_len = w * RayDescriptor::CHANNELS;
    let mut out = vec![0.0f64; row_len * h];
    if out.is_empty() {
        return out;
    }

    match strategy {
        Strategy::Naive | Strategy::CacheBlocked => render_rows(desc, &mut out, 0, h),
        Strategy::Parallel => {
            let lanes = row_bands(h, row_len, 16);
            group.run(&mut out, &lanes, |lane, band| {
                render_rows(desc, band, lane.range.start / row_len, lane.range.end / row_len);
            });
        }
    }
    out
}

/// Stratified offset of sample `s` of `samples` inside the unit pixel.
#[inline]
pub fn sample_offset(s: u32, samples: u32) -> (f64, f64) {
    let n = samples.max(1) as f64;
    let ox = (s as f64 + 0.5) / n;
    let radical = s.reverse_bits() as f64 / 4_294_967_296.0;
    let oy = (radical + 0.5 / n).fract();
    (ox, oy)
}

fn render_rows(desc: &RayDescriptor, band: &mut [f64], row_start: usize, row_end: usize) {
    let (w, h) = (desc.width as f64, desc.height as f64);
    let aspect = w / h;
    let samples = desc.samples.max(1);
    let inv_samples = 1.0 / samples as f64;

    let l_inv = 1.0 / (LIGHT_DIR[0] * LIGHT_DIR[0] + LIGHT_DIR[1] * LIGHT_DIR[1] + LIGHT_DIR[2] * LIGHT_DIR[2]).sqrt();
    let (lx, ly, lz) = (LIGHT_DIR[0] * l_inv, LIGHT_DIR[1] * l_inv, LIGHT_DIR[2] * l_inv);

    // Ray origin is (0,0,0), so oc = -center.
    let (ocx, ocy, ocz) = (-SPHERE_CENTER[0], -SPHERE_CENTER[1], -SPHERE_CENTER[2]);
    let c = ocx * ocx + ocy * ocy + ocz * ocz - SPHERE_RADIUS * SPHERE_RADIUS;
    let inv_r = 1.0 / SPHERE_RADIUS;

    for py in row_start..row_end {
        let row = &mut band[(py - row_start) * desc.width * 3..(py - row_start + 1) * desc.width * 3];
        for px in 0..desc.width {
            let (mut r, mut g, mut b) = (0.0f64, 0.0f64, 0.0f64);

            for s in 0..samples {
                let (ox, oy) = sample_offset(s, samples);
                let u = ((px as f64 + ox) / w * 2.0 - 1.0) * aspect;
                let v = 1.0 - (py as f64 + oy) / h * 2.0;

                let d_inv = 1.0 / (u * u + v * v + 1.0).sqrt();
                let (dx, dy, dz) = (u * d_inv, v * d_inv, -d_inv);

                // |d| = 1, so the quadratic reduces to t² + 2·half_b·t + c = 0.
                let half_b = ocx * dx + ocy * dy + ocz * dz;
                let disc = half_b * half_b - c;
                let t = if disc >= 0.0 { -half_b - disc.sqrt() } else { -1.0 };

                if t <= 0.0 {
                    r += BACKGROUND[0];
                    g += BACKGROUND[1];
                    b += BACKGROUND[2];
                } else {
                    let nx = (t * dx - SPHERE_CENTER[0]) * inv_r;
                    let ny = (t * dy - SPHERE_CENTER[1]) * inv_r;
                    let nz = (t * dz - SPHERE_CENTER[2]) * inv_r;
                    let lambert = (nx * lx + ny * ly + nz * lz).max(0.0);
                    r += ALBEDO[0] * lambert;
                    g += ALBEDO[1] * lambert;
                    b += ALBEDO[2] * lambert;
                }
            }

            let o = px * 3;
            row[o] = r * inv_samples;
            row[o + 1] = g * inv_samples;
            row[o + 2] = b * inv_samples;
        }
    }
}
