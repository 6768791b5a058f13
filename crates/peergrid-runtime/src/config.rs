#![forbid(unsafe_code)]

//! Scheduler configuration.
//!
//! # Env Var Contract
//!
//! All variables are optional; unset means "use the default".
//!
//! - `PEERGRID_QUIET_PERIOD_MS` - debounce quiet period in milliseconds (200)
//! - `PEERGRID_LOG_DECISIONS` - `1`/`true` to record the decision ledger
//! - `PEERGRID_ASPECT_RATIO` - tile width / height (1.334)
//! - `PEERGRID_SHRINK_FACTOR` - margin multiplier in `(0, 1]` (0.9)
//! - `PEERGRID_MAX_ROWS` - row search bound (99)
//!
//! Invalid values are reported, never silently replaced.

use std::fmt;

use peergrid_layout::{GridConfig, GridConfigError, TileGrid, TileStyle};

/// Env var holding the quiet period.
pub const ENV_QUIET_PERIOD_MS: &str = "PEERGRID_QUIET_PERIOD_MS";
/// Env var enabling the decision ledger.
pub const ENV_LOG_DECISIONS: &str = "PEERGRID_LOG_DECISIONS";
/// Env var holding the aspect ratio.
pub const ENV_ASPECT_RATIO: &str = "PEERGRID_ASPECT_RATIO";
/// Env var holding the shrink factor.
pub const ENV_SHRINK_FACTOR: &str = "PEERGRID_SHRINK_FACTOR";
/// Env var holding the row search bound.
pub const ENV_MAX_ROWS: &str = "PEERGRID_MAX_ROWS";

/// Default debounce quiet period.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 200;

/// Configuration error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// An env var held a value that could not be parsed.
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value as read.
        value: String,
    },
    /// The solver settings were rejected.
    Grid(GridConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: {value:?}"),
            Self::Grid(err) => write!(f, "invalid grid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Grid(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<GridConfigError> for ConfigError {
    fn from(err: GridConfigError) -> Self {
        Self::Grid(err)
    }
}

/// Configuration for [`GridScheduler`](crate::GridScheduler).
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Quiet period after the last trigger before solving (ms).
    pub quiet_period_ms: u64,

    /// Solver settings.
    pub grid: GridConfig,

    /// Style reported before the first layout is applied.
    pub initial_style: TileStyle,

    /// Record every decision in an in-memory ledger (JSONL exportable).
    pub enable_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            grid: GridConfig::default(),
            initial_style: TileStyle::PLACEHOLDER,
            enable_logging: false,
        }
    }
}

impl SchedulerConfig {
    /// Set the quiet period.
    #[must_use]
    pub fn with_quiet_period_ms(mut self, ms: u64) -> Self {
        self.quiet_period_ms = ms;
        self
    }

    /// Replace the solver settings.
    #[must_use]
    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    /// Set the pre-layout style.
    #[must_use]
    pub fn with_initial_style(mut self, style: TileStyle) -> Self {
        self.initial_style = style;
        self
    }

    /// Enable or disable decision logging.
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Build the solver described by `grid`.
    pub fn build_grid(&self) -> Result<TileGrid, ConfigError> {
        Ok(TileGrid::new(self.grid)?)
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, starting from the defaults.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var(&lookup, ENV_QUIET_PERIOD_MS, |v| v.parse::<u64>().ok())? {
            config.quiet_period_ms = ms;
        }
        if let Some(enabled) = parse_var(&lookup, ENV_LOG_DECISIONS, parse_bool)? {
            config.enable_logging = enabled;
        }
        if let Some(ratio) = parse_var(&lookup, ENV_ASPECT_RATIO, |v| v.parse::<f64>().ok())? {
            config.grid.aspect_ratio = ratio;
        }
        if let Some(shrink) = parse_var(&lookup, ENV_SHRINK_FACTOR, |v| v.parse::<f64>().ok())? {
            config.grid.shrink_factor = shrink;
        }
        if let Some(rows) = parse_var(&lookup, ENV_MAX_ROWS, |v| v.parse::<u32>().ok())? {
            config.grid.max_rows = rows;
        }

        config.grid.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(
    lookup: &F,
    key: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse(trimmed)
        .map(Some)
        .ok_or(ConfigError::InvalidValue { key, value: raw })
}

fn parse_bool(value: &str) -> Option<bool> {
    if value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("no")
    {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = SchedulerConfig::from_env_with(|_| None).unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.quiet_period_ms, 200);
        assert!(!config.enable_logging);
    }

    #[test]
    fn overrides_are_applied() {
        let config = SchedulerConfig::from_env_with(lookup_from(&[
            (ENV_QUIET_PERIOD_MS, "50"),
            (ENV_LOG_DECISIONS, "true"),
            (ENV_ASPECT_RATIO, "1.777"),
            (ENV_SHRINK_FACTOR, " 0.8 "),
            (ENV_MAX_ROWS, "12"),
        ]))
        .unwrap();
        assert_eq!(config.quiet_period_ms, 50);
        assert!(config.enable_logging);
        assert_eq!(config.grid.aspect_ratio, 1.777);
        assert_eq!(config.grid.shrink_factor, 0.8);
        assert_eq!(config.grid.max_rows, 12);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            SchedulerConfig::from_env_with(lookup_from(&[(ENV_QUIET_PERIOD_MS, "  ")])).unwrap();
        assert_eq!(config.quiet_period_ms, DEFAULT_QUIET_PERIOD_MS);
    }

    #[test]
    fn unparsable_value_is_reported() {
        let err = SchedulerConfig::from_env_with(lookup_from(&[(ENV_QUIET_PERIOD_MS, "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_QUIET_PERIOD_MS,
                value: "soon".to_string(),
            }
        );
        assert!(err.to_string().contains(ENV_QUIET_PERIOD_MS));
    }

    #[test]
    fn invalid_grid_is_reported_with_source() {
        let err = SchedulerConfig::from_env_with(lookup_from(&[(ENV_SHRINK_FACTOR, "2.0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Grid(GridConfigError::InvalidShrinkFactor(2.0)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn build_grid_rejects_bad_config() {
        let config = SchedulerConfig::default().with_grid(GridConfig::default().with_max_rows(0));
        assert_eq!(
            config.build_grid().unwrap_err(),
            ConfigError::Grid(GridConfigError::ZeroMaxRows)
        );
    }
}
