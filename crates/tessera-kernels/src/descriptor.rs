//! Work descriptors, the immutable per-call kernel parameters.
//!
//! Descriptors are built by the boundary from already validated scalar
//! arguments and dropped when the call returns. Output length is a pure
//! function of the descriptor.

use crate::KernelKind;

/// Parameters common to every descriptor.
pub trait WorkDescriptor {
    /// Which kernel this descriptor drives.
    fn kind(&self) -> KernelKind;

    /// Number of output elements the kernel produces.
    fn output_len(&self) -> usize;

    /// The size the dispatch policy compares against its thresholds.
    fn work_size(&self) -> usize;
}

/// C[n,n] = A[n,n] @ B[n,n]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixDescriptor {
    pub n: usize,
}

impl MatrixDescriptor {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Elements per input operand.
    pub fn input_len(&self) -> usize {
        self.n * self.n
    }
}

impl WorkDescriptor for MatrixDescriptor {
    fn kind(&self) -> KernelKind {
        KernelKind::Matrix
    }

    fn output_len(&self) -> usize {
        self.n * self.n
    }

    fn work_size(&self) -> usize {
        self.n
    }
}

/// Rectangle of the complex plane mapped onto the pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Viewport {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(-2.5, 1.0, -1.25, 1.25)
    }
}

/// Escape-time fractal over a width×height grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalDescriptor {
    pub width: usize,
    pub height: usize,
    pub viewport: Viewport,
    pub max_iterations: u32,
}

impl FractalDescriptor {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

    pub fn new(width: usize, height: usize, viewport: Viewport, max_iterations: u32) -> Self {
        Self { width, height, viewport, max_iterations }
    }

    /// Horizontal and vertical step in the complex plane per pixel.
    pub fn steps(&self) -> (f64, f64) {
        let dx = if self.width == 0 {
            0.0
        } else {
            (self.viewport.xmax - self.viewport.xmin) / self.width as f64
        };
        let dy = if self.height == 0 {
            0.0
        } else {
            (self.viewport.ymax - self.viewport.ymin) / self.height as f64
        };
        (dx, dy)
    }

    /// The point `c` sampled by pixel (px, py).
    #[inline]
    pub fn point(&self, px: usize, py: usize) -> (f64, f64) {
        let (dx, dy) = self.steps();
        (
            self.viewport.xmin + px as f64 * dx,
            self.viewport.ymin + py as f64 * dy,
        )
    }
}

impl WorkDescriptor for FractalDescriptor {
    fn kind(&self) -> KernelKind {
        KernelKind::Fractal
    }

    fn output_len(&self) -> usize {
        self.width * self.height
    }

    fn work_size(&self) -> usize {
        self.width * self.height
    }
}

/// Keyed hash over a byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashDescriptor {
    pub iterations: u32,
}

impl HashDescriptor {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl WorkDescriptor for HashDescriptor {
    fn kind(&self) -> KernelKind {
        KernelKind::Hash
    }

    fn output_len(&self) -> usize {
        1
    }

    fn work_size(&self) -> usize {
        self.iterations as usize
    }
}

/// Single-sphere render at width×height with `samples` rays per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayDescriptor {
    pub width: usize,
    pub height: usize,
    pub samples: u32,
}

impl RayDescriptor {
    /// RGB channels stored per pixel.
    pub const CHANNELS: usize = 3;

    /// `samples == 0` is treated as a single sample.
    pub fn new(width: usize, height: usize, samples: u32) -> Self {
        Self {
            width,
            height,
            samples: samples.max(1),
        }
    }
}

impl WorkDescriptor for RayDescriptor {
    fn kind(&self) -> KernelKind {
        KernelKind::Ray
    }

    fn output_len(&self) -> usize {
        self.width * self.height * Self::CHANNELS
    }

    fn work_size(&self) -> usize {
        self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lengths() {
        assert_eq!(MatrixDescriptor::new(7).output_len(), 49);
        let f = FractalDescriptor::new(640, 480, Viewport::default(), 100);
        assert_eq!(f.output_len(), 640 * 480);
        assert_eq!(HashDescriptor::new(10).output_len(), 1);
        assert_eq!(RayDescriptor::new(4, 3, 2).output_len(), 36);
    }

    #[test]
    fn test_fractal_point_mapping() {
        let f = FractalDescriptor::new(4, 2, Viewport::new(-2.0, 2.0, -1.0, 1.0), 10);
        assert_eq!(f.point(0, 0), (-2.0, -1.0));
        assert_eq!(f.point(2, 1), (0.0, 0.0));
    }

    #[test]
    fn test_zero_samples_is_one() {
        assert_eq!(RayDescriptor::new(1, 1, 0).samples, 1);
    }
}
