#![forbid(unsafe_code)]

//! Geometric primitives.

/// Live pixel dimensions of the grid container.
///
/// Values come straight from the host (`clientWidth` / `clientHeight` in the
/// browser), so they are CSS pixels and may be fractional. A container that has
/// not been laid out yet reports zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerSize {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl ContainerSize {
    /// Container with no measurable area.
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    /// Create a new container size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are finite and strictly positive.
    ///
    /// Anything else means "not yet measurable": a detached element, a
    /// container that has not been laid out, or a bogus host value.
    #[inline]
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Area in square pixels, or `0.0` when not measurable.
    #[inline]
    pub fn area(&self) -> f64 {
        if self.is_measurable() {
            self.width * self.height
        } else {
            0.0
        }
    }
}

impl From<(f64, f64)> for ContainerSize {
    fn from((width, height): (f64, f64)) -> Self {
        Self::new(width, height)
    }
}

impl From<(u32, u32)> for ContainerSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(f64::from(width), f64::from(height))
    }
}

/// Whole-pixel key used to decide whether a width changed materially.
///
/// Rounds up, so a sub-pixel wobble below the next integer never counts as a
/// change. Non-finite input maps to `0`.
#[inline]
pub fn pixel_ceil(value: f64) -> i64 {
    if value.is_finite() {
        value.ceil() as i64
    } else {
        0
    }
}
