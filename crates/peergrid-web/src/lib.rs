#![forbid(unsafe_code)]

//! `peergrid-web` embeds the peergrid tile engine in a browser page.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding environment (JS) pushes container
//!   sizes, tile counts, and frame ticks.
//! - **Deterministic time**: every call carries the host's monotonic
//!   timestamp in milliseconds (`performance.now()`).
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! [`GridHost`] is the platform-neutral core and is fully testable natively.
//! On `wasm32` it is wrapped by the `PeerGrid` class exported through
//! `wasm-bindgen`.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::PeerGrid;

use core::time::Duration;

use peergrid_core::{ContainerSize, TriggerSource};
use peergrid_layout::TileStyle;
use peergrid_runtime::{
    ConfigError, ContainerProbe, GridScheduler, SchedulerAction, SchedulerConfig,
};
use serde::{Deserialize, Serialize};
use web_time::Instant;

/// Web frontend error type.
#[derive(Debug)]
pub enum WebError {
    /// The options JSON could not be parsed.
    Options(serde_json::Error),
    /// The options were well-formed but rejected.
    Config(ConfigError),
    /// A style could not be encoded.
    Encode(serde_json::Error),
}

impl core::fmt::Display for WebError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Options(err) => write!(f, "invalid options: {err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode style: {err}"),
        }
    }
}

impl std::error::Error for WebError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Options(err) | Self::Encode(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ConfigError> for WebError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Options accepted from the host as JSON.
///
/// Every field is optional; omitted fields keep the engine defaults.
///
/// ```
/// use peergrid_web::GridOptions;
///
/// let options = GridOptions::from_json(r#"{"quietPeriodMs": 100, "maxRows": 8}"#).unwrap();
/// let config = options.into_config().unwrap();
/// assert_eq!(config.quiet_period_ms, 100);
/// assert_eq!(config.grid.max_rows, 8);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct GridOptions {
    /// Debounce quiet period (ms).
    pub quiet_period_ms: Option<u64>,
    /// Tile width / height.
    pub aspect_ratio: Option<f64>,
    /// Margin multiplier in `(0, 1]`.
    pub shrink_factor: Option<f64>,
    /// Row search bound.
    pub max_rows: Option<u32>,
    /// Record the decision ledger.
    pub log_decisions: Option<bool>,
    /// Style shown before the first layout.
    pub initial_style: Option<TileStyle>,
}

impl GridOptions {
    /// Parse host options. An empty or whitespace-only string means defaults.
    pub fn from_json(json: &str) -> Result<Self, WebError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(WebError::Options)
    }

    /// Resolve into a validated scheduler configuration.
    pub fn into_config(self) -> Result<SchedulerConfig, ConfigError> {
        let mut config = SchedulerConfig::default();
        if let Some(ms) = self.quiet_period_ms {
            config.quiet_period_ms = ms;
        }
        if let Some(ratio) = self.aspect_ratio {
            config.grid.aspect_ratio = ratio;
        }
        if let Some(shrink) = self.shrink_factor {
            config.grid.shrink_factor = shrink;
        }
        if let Some(rows) = self.max_rows {
            config.grid.max_rows = rows;
        }
        if let Some(enabled) = self.log_decisions {
            config.enable_logging = enabled;
        }
        if let Some(style) = self.initial_style {
            config.initial_style = style;
        }
        config.grid.validate()?;
        Ok(config)
    }
}

/// Latest container size pushed by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostProbe {
    size: ContainerSize,
}

impl HostProbe {
    /// Probe reporting `size`.
    #[must_use]
    pub const fn new(size: ContainerSize) -> Self {
        Self { size }
    }

    /// Record a new observation.
    pub fn set(&mut self, size: ContainerSize) {
        self.size = size;
    }
}

impl ContainerProbe for HostProbe {
    fn measure(&self) -> Option<ContainerSize> {
        Some(self.size)
    }
}

/// Maps host millisecond timestamps onto a monotonic [`Instant`].
///
/// Timestamps that go backwards, are negative, or are not finite never move
/// the clock back.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    epoch: Instant,
    now: Instant,
}

impl HostClock {
    /// Clock whose zero is `epoch`.
    #[must_use]
    pub fn new(epoch: Instant) -> Self {
        Self { epoch, now: epoch }
    }

    /// Advance to host time `ms` and return the resulting instant.
    pub fn at(&mut self, ms: f64) -> Instant {
        let offset = Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::ZERO);
        let candidate = self.epoch.checked_add(offset).unwrap_or(self.now);
        if candidate > self.now {
            self.now = candidate;
        }
        self.now
    }

    /// Most recent instant handed out.
    #[must_use]
    pub const fn now(&self) -> Instant {
        self.now
    }
}

/// Host-driven grid: one scheduler plus the host's clock and probe.
#[derive(Debug)]
pub struct GridHost {
    scheduler: GridScheduler<HostProbe>,
    clock: HostClock,
}

impl GridHost {
    /// Build a host from parsed options.
    pub fn new(options: GridOptions) -> Result<Self, WebError> {
        let config = options.into_config()?;
        Ok(Self {
            scheduler: GridScheduler::new(config)?,
            clock: HostClock::new(Instant::now()),
        })
    }

    /// Build a host from a JSON options string.
    pub fn from_json(json: &str) -> Result<Self, WebError> {
        Self::new(GridOptions::from_json(json)?)
    }

    /// Replace the clock epoch (for testing).
    #[must_use]
    pub fn with_epoch(mut self, epoch: Instant) -> Self {
        self.clock = HostClock::new(epoch);
        self
    }

    /// Bind the grid element with its current size.
    pub fn mount(&mut self, width: f64, height: f64, now_ms: f64) {
        let now = self.clock.at(now_ms);
        self.scheduler
            .attach_at(HostProbe::new(ContainerSize::new(width, height)), now);
    }

    /// Release the grid element. Returns `false` if nothing was mounted.
    pub fn unmount(&mut self, now_ms: f64) -> bool {
        let now = self.clock.at(now_ms);
        self.scheduler.detach_at(now).is_some()
    }

    /// Report a size observation of the grid element itself.
    pub fn observe_resize(&mut self, width: f64, height: f64, now_ms: f64) -> bool {
        self.push_size(width, height, TriggerSource::ElementResize, now_ms)
    }

    /// Report a viewport resize along with the element's current size.
    pub fn viewport_resize(&mut self, width: f64, height: f64, now_ms: f64) -> bool {
        self.push_size(width, height, TriggerSource::ViewportResize, now_ms)
    }

    fn push_size(&mut self, width: f64, height: f64, source: TriggerSource, now_ms: f64) -> bool {
        let now = self.clock.at(now_ms);
        if let Some(probe) = self.scheduler.probe_mut() {
            probe.set(ContainerSize::new(width, height));
        }
        self.scheduler.request_at(source, now)
    }

    /// Report the tile count after a render pass.
    pub fn set_tile_count(&mut self, tile_count: usize, now_ms: f64) -> bool {
        let now = self.clock.at(now_ms);
        self.scheduler.update_tile_count_at(tile_count, now)
    }

    /// Advance to `now_ms`. Returns `true` when a new style must be applied.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let now = self.clock.at(now_ms);
        matches!(self.scheduler.tick_at(now), SchedulerAction::Apply(_))
    }

    /// Milliseconds until the pending recompute fires, if one is armed.
    pub fn next_deadline(&self, now_ms: f64) -> Option<f64> {
        let mut clock = self.clock;
        let now = clock.at(now_ms);
        self.scheduler
            .time_until_fire(now)
            .map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Style every visible tile should carry right now.
    pub fn style(&self) -> TileStyle {
        self.scheduler.current_style()
    }

    /// Current tile width in pixels.
    pub fn tile_width(&self) -> f64 {
        self.style().width
    }

    /// Current tile height in pixels.
    pub fn tile_height(&self) -> f64 {
        self.style().height
    }

    /// Current style as a JSON object `{"width":..,"height":..}`.
    pub fn style_json(&self) -> Result<String, WebError> {
        serde_json::to_string(&self.style()).map_err(WebError::Encode)
    }

    /// Current style as an inline CSS declaration block.
    pub fn style_css(&self) -> String {
        self.style().to_css()
    }

    /// Decision ledger as JSONL (empty unless `logDecisions` was set).
    pub fn decision_logs_jsonl(&self) -> String {
        self.scheduler.decision_logs_jsonl()
    }

    /// Underlying scheduler.
    pub fn scheduler(&self) -> &GridScheduler<HostProbe> {
        &self.scheduler
    }
}
