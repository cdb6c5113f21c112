//! 2D Vector
//!
//! World-space positions as the client sends them, plus the u16-per-axis
//! compression used by the network transform.

use std::fmt;
use std::ops::{Add, Mul, Sub, Neg};
use serde::{Serialize, Deserialize};

/// Lower bound of the compressed coordinate range.
pub const POSITION_MIN: f32 = -50.0;

/// Upper bound of the compressed coordinate range.
pub const POSITION_MAX: f32 = 50.0;

/// 2D vector with f32 components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vector2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector pointing up (+Y)
    pub const UP: Self = Self { x: 0.0, y: 1.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Rotate counter-clockwise by `degrees`.
    pub fn rotate(self, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Quantize both axes into u16 over [`POSITION_MIN`, `POSITION_MAX`].
    pub fn compress(self) -> (u16, u16) {
        (compress_axis(self.x), compress_axis(self.y))
    }

    /// Inverse of [`Vector2::compress`].
    pub fn decompress(x: u16, y: u16) -> Self {
        Self {
            x: decompress_axis(x),
            y: decompress_axis(y),
        }
    }
}

fn compress_axis(value: f32) -> u16 {
    let t = ((value - POSITION_MIN) / (POSITION_MAX - POSITION_MIN)).clamp(0.0, 1.0);
    (t * u16::MAX as f32).round() as u16
}

fn decompress_axis(value: u16) -> f32 {
    let t = value as f32 / u16::MAX as f32;
    POSITION_MIN + (POSITION_MAX - POSITION_MIN) * t
}

impl Add for Vector2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vector2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector2({:.3}, {:.3})", self.x, self.y)
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vector2, b: Vector2) -> bool {
        (a - b).length() < 0.01
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = Vector2::UP.rotate(90.0);
        assert!(approx(v, Vector2::new(-1.0, 0.0)), "got {:?}", v);
    }

    #[test]
    fn test_compression_is_close() {
        let original = Vector2::new(-12.34, 40.5);
        let (x, y) = original.compress();
        let restored = Vector2::decompress(x, y);
        assert!(approx(original, restored), "got {:?}", restored);
    }

    #[test]
    fn test_compression_clamps_out_of_range() {
        let (x, y) = Vector2::new(-500.0, 500.0).compress();
        assert_eq!(x, 0);
        assert_eq!(y, u16::MAX);
    }
}
