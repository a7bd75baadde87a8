//! Escape-time fractal (Mandelbrot set) coloring.
//!
//! The image is walked in 64×64 tiles. Inside a tile, pixels are iterated
//! four at a time: each lane keeps its own iterate `z`, its point `c` and an
//! active flag, emulating a 4-wide vector without SIMD intrinsics. A lane is
//! retired the moment |z|² > 4 and the group stops as soon as all four lanes
//! are retired, rather than always running to the iteration bound.

use crate::descriptor::FractalDescriptor;
use crate::lanes::{row_bands, WorkerGroup};
use crate::Strategy;

/// Tile edge in pixels.
pub const TILE: usize = 64;
/// Pixels iterated together.
pub const LANES: usize = 4;

const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Escape iteration of a single point; `max_iterations` if it never escapes.
pub fn escape_count(cx: f64, cy: f64, max_iterations: u32) -> u32 {
    let (mut zr, mut zi) = (0.0f64, 0.0f64);
    let mut iter = 0;
    while iter < max_iterations {
        let (x2, y2) = (zr * zr, zi * zi);
        if x2 + y2 > ESCAPE_RADIUS_SQ {
            break;
        }
        zi = 2.0 * zr * zi + cy;
        zr = x2 - y2 + cx;
        iter += 1;
    }
    iter
}

/// One escape count per pixel, row-major, `width * height` long.
pub fn generate(desc: &FractalDescriptor, strategy: Strategy, group: &WorkerGroup) -> Vec<i32> {
    let (w, h) = (desc.width, desc.height);
    let mut out = vec![0i32; w * h];
    if out.is_empty() {
        return out;
    }

    match strategy {
        Strategy::Naive => {
            for py in 0..h {
                for px in 0..w {
                    let (cx, cy) = desc.point(px, py);
                    out[py * w + px] = escape_count(cx, cy, desc.max_iterations) as i32;
                }
            }
        }
        Strategy::CacheBlocked => render_band(desc, &mut out, 0, h),
        Strategy::Parallel => {
            let lanes = row_bands(h, w, TILE);
            group.run(&mut out, &lanes, |lane, band| {
                render_band(desc, band, lane.range.start / w, lane.range.end / w);
            });
        }
    }
    out
}

/// Render rows `row_start..row_end` into `band`, tile by tile.
fn render_band(desc: &FractalDescriptor, band: &mut [i32], row_start: usize, row_end: usize) {
    let w = desc.width;
    for ty in (row_start..row_end).step_by(TILE) {
        let ty_end = (ty + TILE).min(row_end);
        for tx in (0..w).step_by(TILE) {
            let tx_end = (tx + TILE).min(w);
            for py in ty..ty_end {
                let row_off = (py - row_start) * w;
                let mut px = tx;
                while px < tx_end {
                    let live = (tx_end - px).min(LANES);
                    iterate_lanes(desc, py, px, &mut band[row_off + px..row_off + px + live]);
                    px += LANES;
                }
            }
        }
    }
}

/// Iterate up to four horizontally adjacent pixels starting at (px0, py).
///
/// `out.len()` lanes are live; the rest start retired.
#[inline]
fn iterate_lanes(desc: &FractalDescriptor, py: usize, px0: usize, out: &mut [i32]) {
    let (dx, dy) = desc.steps();
    let ci = desc.viewport.ymin + py as f64 * dy;
    let max = desc.max_iterations;

    let mut cr = [0.0f64; LANES];
    let mut zr = [0.0f64; LANES];
    let mut zi = [0.0f64; LANES];
    let mut active = [false; LANES];
    let mut counts = [max; LANES];

    for l in 0..out.len() {
        cr[l] = desc.viewport.xmin + (px0 + l) as f64 * dx;
        active[l] = true;
    }

    for iter in 0..max {
        let mut any = false;
        for l in 0..LANES {
            if !active[l] {
                continue;
            }
            let (x, y) = (zr[l], zi[l]);
            let (x2, y2) = (x * x, y * y);
            if x2 + y2 > ESCAPE_RADIUS_SQ {
                active[l] = false;
                counts[l] = iter;
                continue;
            }
            zi[l] = 2.0 * x * y + ci;
            zr[l] = x2 - y2 + cr[l];
            any = true;
        }
        if !any {
            break;
        }
    }

    for (dst, &count) in out.iter_mut().zip(counts.iter()) {
        *dst = count as i32;
    }
}
