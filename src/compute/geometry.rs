//! 2D vectors and angle arithmetic.
//!
//! Angles are in degrees. 0° points up the screen (negative y) and angles
//! grow clockwise, so 90° points along +x and 180° points down.

use nalgebra::Vector2;

/// A point or displacement in screen coordinates (y grows downward).
pub type Vec2 = Vector2<f64>;

/// Heading arithmetic for screen-space vectors.
pub trait Heading {
    /// Unit vector pointing along `degrees`.
    fn from_heading(degrees: f64) -> Self;

    /// Direction of this vector in degrees, in (-180, 180].
    fn heading(&self) -> f64;

    /// Rotate clockwise (in screen space) by `degrees`.
    fn rotated_by(&self, degrees: f64) -> Self;

    fn all_finite(&self) -> bool;
}

impl Heading for Vec2 {
    #[inline]
    fn from_heading(degrees: f64) -> Self {
        let rad = degrees.to_radians();
        Vec2::new(rad.sin(), -rad.cos())
    }

    #[inline]
    fn heading(&self) -> f64 {
        self.x.atan2(-self.y).to_degrees()
    }

    #[inline]
    fn rotated_by(&self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    #[inline]
    fn all_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Normalize an angle into [0, 360).
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if r >= 360.0 { 0.0 } else { r }
}

/// Wrap an angle difference into [-180, 180].
#[inline]
pub fn wrap_signed(degrees: f64) -> f64 {
    normalize_degrees(degrees + 180.0) - 180.0
}

/// Permitted arc `center ± half_width`, compared in a common 0-360° frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleRange {
    /// Lower bound, normalized into [0, 360).
    pub min: f64,
    /// Upper bound, normalized into [0, 360). May be smaller than `min`
    /// when the arc wraps through 0°.
    pub max: f64,
    span: f64,
}

impl AngleRange {
    pub fn around(center: f64, half_width: f64) -> Self {
        let span = (2.0 * half_width.max(0.0)).min(360.0);
        Self {
            min: normalize_degrees(center - half_width),
            max: normalize_degrees(center + half_width),
            span,
        }
    }

    /// Whether the arc covers the whole circle.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.span >= 360.0
    }

    pub fn contains(&self, degrees: f64) -> bool {
        self.is_full() || normalize_degrees(degrees - self.min) <= self.span
    }

    /// The angle itself when permitted, otherwise the angularly closer bound.
    /// Result is normalized into [0, 360).
    pub fn clamp(&self, degrees: f64) -> f64 {
        let offset = normalize_degrees(degrees - self.min);
        if self.is_full() || offset <= self.span {
            return normalize_degrees(degrees);
        }
        let past_max = offset - self.span;
        let before_min = 360.0 - offset;
        if past_max <= before_min {
            self.max
        } else {
            self.min
        }
    }
}
