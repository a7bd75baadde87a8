use std::fmt;

use serde::{Deserialize, Serialize};

/// Element widths that may cross the host/guest boundary.
///
/// Floats are IEEE 754 doubles, integers are two's-complement 32-bit, and
/// raw bytes carry hash input. All multi-byte widths are little-endian on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementWidth {
    /// 64-bit IEEE 754 double-precision float
    F64,
    /// 32-bit signed integer
    I32,
    /// Unsigned byte
    U8,
}

impl ElementWidth {
    /// Size in bytes of a single element.
    pub fn size(&self) -> usize {
        match self {
            ElementWidth::F64 => 8,
            ElementWidth::I32 => 4,
            ElementWidth::U8 => 1,
        }
    }

    /// Number of bytes needed to store `n` elements, or `None` on overflow.
    pub fn storage_bytes(&self, n: usize) -> Option<usize> {
        n.checked_mul(self.size())
    }

    /// Whether this width carries floating-point values.
    pub fn is_float(&self) -> bool {
        matches!(self, ElementWidth::F64)
    }
}

impl fmt::Display for ElementWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementWidth::F64 => write!(f, "f64"),
            ElementWidth::I32 => write!(f, "i32"),
            ElementWidth::U8 => write!(f, "u8"),
        }
    }
}

/// A plain-old-data numeric type with a fixed boundary width.
///
/// `to_le`/`from_le` are identity on little-endian targets; on big-endian
/// targets they swap so exported bytes are always little-endian.
pub trait Element: bytemuck::Pod + Default + Send + Sync + fmt::Debug + PartialEq {
    const WIDTH: ElementWidth;

    fn to_le(self) -> Self;
    fn from_le(self) -> Self;
}

impl Element for f64 {
    const WIDTH: ElementWidth = ElementWidth::F64;

    #[inline]
    fn to_le(self) -> Self {
        f64::from_bits(self.to_bits().to_le())
    }

    #[inline]
    fn from_le(self) -> Self {
        f64::from_bits(u64::from_le(self.to_bits()))
    }
}

impl Element for i32 {
    const WIDTH: ElementWidth = ElementWidth::I32;

    #[inline]
    fn to_le(self) -> Self {
        i32::to_le(self)
    }

    #[inline]
    fn from_le(self) -> Self {
        i32::from_le(self)
    }
}

impl Element for u8 {
    const WIDTH: ElementWidth = ElementWidth::U8;

    #[inline]
    fn to_le(self) -> Self {
        self
    }

    #[inline]
    fn from_le(self) -> Self {
        self
    }
}
