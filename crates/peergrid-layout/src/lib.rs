#![forbid(unsafe_code)]

//! Fixed-aspect tile grid solver.
//!
//! Given a tile count and a container, [`TileGrid::solve`] finds the row count
//! that gives every tile the largest possible area while keeping all tiles the
//! same size and at a fixed width/height ratio.
//!
//! ```
//! use peergrid_layout::{ContainerSize, TileGrid};
//!
//! let grid = TileGrid::default();
//! let result = grid.solve(1, ContainerSize::new(800.0, 600.0));
//!
//! assert_eq!((result.rows, result.columns), (1, 1));
//! assert!((result.tile_width - 720.0).abs() < 1e-9);
//! ```
//!
//! # Search
//!
//! There is no closed form once rows are integral, so the solver walks row
//! counts upward:
//!
//! 1. For `r` rows, use `ceil(n / r)` columns and size tiles to fill the width.
//! 2. If `r` rows of that height overflow the container, size tiles to fill
//!    the height instead and stop. Adding rows only shrinks them from here.
//! 3. Otherwise stop once the leftover height cannot hold another row.
//!
//! The accepted candidate is the maximum of
//! `min(width / ceil(n / r), ratio * height / r)` over the searched rows, which
//! makes the tile size non-increasing in `n` for a fixed container.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `tile_count == 0` | [`LayoutResult::EMPTY`], no search |
//! | width or height `<= 0`, NaN, or infinite | [`LayoutResult::EMPTY`] |
//! | more tiles than `max_rows` rows can hold | search stops at `max_rows` |

use std::fmt;

pub use peergrid_core::geometry::{ContainerSize, pixel_ceil};

/// Width/height ratio used for video tiles.
pub const VIDEO_ASPECT_RATIO: f64 = 1.334;

/// Multiplier applied to solved sizes to leave a margin around each tile.
pub const DEFAULT_SHRINK_FACTOR: f64 = 0.9;

/// Upper bound on the row search.
pub const DEFAULT_MAX_ROWS: u32 = 99;

/// Invalid grid configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridConfigError {
    /// Aspect ratio was not a finite positive number.
    InvalidAspectRatio(f64),
    /// Shrink factor was outside `(0, 1]`.
    InvalidShrinkFactor(f64),
    /// The row search needs at least one row.
    ZeroMaxRows,
}

impl fmt::Display for GridConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAspectRatio(v) => {
                write!(f, "aspect ratio must be finite and positive, got {v}")
            }
            Self::InvalidShrinkFactor(v) => {
                write!(f, "shrink factor must be in (0, 1], got {v}")
            }
            Self::ZeroMaxRows => f.write_str("max rows must be at least 1"),
        }
    }
}

impl std::error::Error for GridConfigError {}

/// A validated width/height ratio.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct AspectRatio(f64);

impl AspectRatio {
    /// The standard video tile ratio.
    pub const VIDEO: Self = Self(VIDEO_ASPECT_RATIO);

    /// Validate a raw ratio.
    pub fn new(ratio: f64) -> Result<Self, GridConfigError> {
        if ratio.is_finite() && ratio > 0.0 {
            Ok(Self(ratio))
        } else {
            Err(GridConfigError::InvalidAspectRatio(ratio))
        }
    }

    /// The raw ratio.
    #[inline]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::VIDEO
    }
}

/// Raw solver settings, before validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Tile width divided by tile height.
    pub aspect_ratio: f64,
    /// Applied uniformly to both dimensions after solving.
    pub shrink_factor: f64,
    /// Largest row count the search will try.
    pub max_rows: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: VIDEO_ASPECT_RATIO,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl GridConfig {
    /// Set the aspect ratio.
    #[must_use]
    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Set the shrink factor.
    #[must_use]
    pub fn with_shrink_factor(mut self, factor: f64) -> Self {
        self.shrink_factor = factor;
        self
    }

    /// Set the row search bound.
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), GridConfigError> {
        AspectRatio::new(self.aspect_ratio)?;
        if !(self.shrink_factor.is_finite() && self.shrink_factor > 0.0 && self.shrink_factor <= 1.0)
        {
            return Err(GridConfigError::InvalidShrinkFactor(self.shrink_factor));
        }
        if self.max_rows == 0 {
            return Err(GridConfigError::ZeroMaxRows);
        }
        Ok(())
    }
}

/// Inputs for one recomputation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRequest {
    /// Number of tiles to place.
    pub tile_count: usize,
    /// Current container size.
    pub container: ContainerSize,
    /// Required tile ratio.
    pub aspect_ratio: AspectRatio,
}

impl LayoutRequest {
    /// Build a request at the standard video ratio.
    #[must_use]
    pub fn new(tile_count: usize, container: ContainerSize) -> Self {
        Self {
            tile_count,
            container,
            aspect_ratio: AspectRatio::VIDEO,
        }
    }

    /// Override the ratio.
    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }
}

/// Solved grid partition and per-tile size.
///
/// `rows` is the number of rows actually occupied by `tile_count` tiles at
/// `columns` per row. Both are zero for [`LayoutResult::EMPTY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutResult {
    /// Occupied rows.
    pub rows: u32,
    /// Tiles per row.
    pub columns: u32,
    /// Tile width in pixels, margin already applied.
    pub tile_width: f64,
    /// Tile height in pixels, margin already applied.
    pub tile_height: f64,
}

impl LayoutResult {
    /// Nothing to draw.
    pub const EMPTY: Self = Self {
        rows: 0,
        columns: 0,
        tile_width: 0.0,
        tile_height: 0.0,
    };

    /// Whether this result has no drawable area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns == 0 || self.tile_width <= 0.0 || self.tile_height <= 0.0
    }

    /// Width rounded up to whole pixels.
    #[inline]
    pub fn rounded_width(&self) -> i64 {
        pixel_ceil(self.tile_width)
    }

    /// Whether this result differs visibly from `previous`.
    ///
    /// Only the rounded width is compared: the height follows from the ratio,
    /// and sub-pixel movement must not count as a change.
    #[must_use]
    pub fn differs_from(&self, previous: Option<&LayoutResult>) -> bool {
        match previous {
            Some(prev) => prev.rounded_width() != self.rounded_width(),
            None => true,
        }
    }

    /// The uniform style every visible tile receives.
    #[inline]
    pub fn style(&self) -> TileStyle {
        TileStyle {
            width: self.tile_width,
            height: self.tile_height,
        }
    }
}

/// Inline sizing applied to every tile in one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileStyle {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl TileStyle {
    /// Size shown before any layout has been solved.
    pub const PLACEHOLDER: Self = Self {
        width: 400.0,
        height: 300.0,
    };

    /// Render as an inline CSS declaration block.
    #[must_use]
    pub fn to_css(&self) -> String {
        format!("width: {:.3}px; height: {:.3}px", self.width, self.height)
    }
}

/// A configured solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    aspect_ratio: AspectRatio,
    shrink_factor: f64,
    max_rows: u32,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::VIDEO,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl TileGrid {
    /// Build a solver from a validated configuration.
    pub fn new(config: GridConfig) -> Result<Self, GridConfigError> {
        config.validate()?;
        Ok(Self {
            aspect_ratio: AspectRatio::new(config.aspect_ratio)?,
            shrink_factor: config.shrink_factor,
            max_rows: config.max_rows,
        })
    }

    /// The configured ratio.
    #[inline]
    pub const fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// The configured margin multiplier.
    #[inline]
    pub const fn shrink_factor(&self) -> f64 {
        self.shrink_factor
    }

    /// The row search bound.
    #[inline]
    pub const fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Solve for `tile_count` tiles in `container`.
    pub fn solve(&self, tile_count: usize, container: ContainerSize) -> LayoutResult {
        self.solve_with_ratio(tile_count, container, self.aspect_ratio)
    }

    /// Solve a request. The request's ratio overrides the configured one.
    pub fn solve_request(&self, request: &LayoutRequest) -> LayoutResult {
        self.solve_with_ratio(request.tile_count, request.container, request.aspect_ratio)
    }

    fn solve_with_ratio(
        &self,
        tile_count: usize,
        container: ContainerSize,
        ratio: AspectRatio,
    ) -> LayoutResult {
        if tile_count == 0 || !container.is_measurable() {
            return LayoutResult::EMPTY;
        }

        let (columns, width, height) =
            search_rows(tile_count, container, ratio.get(), self.max_rows);
        let rows = tile_count.div_ceil(columns);

        let result = LayoutResult {
            rows: saturating_u32(rows),
            columns: saturating_u32(columns),
            tile_width: width * self.shrink_factor,
            tile_height: height * self.shrink_factor,
        };
        peergrid_core::trace!(
            tile_count,
            rows = result.rows,
            columns = result.columns,
            tile_width = result.tile_width,
            tile_height = result.tile_height,
            "tile grid solved"
        );
        result
    }
}

/// Solve with the default margin and row bound.
///
/// Invalid ratios and degenerate containers yield [`LayoutResult::EMPTY`].
pub fn solve(tile_count: usize, width: f64, height: f64, aspect_ratio: f64) -> LayoutResult {
    match AspectRatio::new(aspect_ratio) {
        Ok(ratio) => TileGrid::default().solve_with_ratio(
            tile_count,
            ContainerSize::new(width, height),
            ratio,
        ),
        Err(_) => LayoutResult::EMPTY,
    }
}

/// Row search. Returns `(columns, width, height)` before shrink.
///
/// Callers guarantee `tile_count > 0`, a measurable container, and
/// `max_rows >= 1`.
fn search_rows(
    tile_count: usize,
    container: ContainerSize,
    ratio: f64,
    max_rows: u32,
) -> (usize, f64, f64) {
    let ContainerSize { width, height } = container;
    let mut accepted = (tile_count, 0.0, 0.0);

    for rows in 1..=max_rows.max(1) {
        let r = f64::from(rows);
        let columns = tile_count.div_ceil(rows as usize);
        let w = width / columns as f64;
        let h = w / ratio;

        if r * h > height {
            let h = height / r;
            accepted = (columns, ratio * h, h);
            break;
        }

        accepted = (columns, w, h);
        if height - r * h < h {
            break;
        }
    }

    accepted
}

#[inline]
fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
