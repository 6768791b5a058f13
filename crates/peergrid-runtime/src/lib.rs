#![forbid(unsafe_code)]

//! Runtime side of the peergrid tile engine.
//!
//! The solver in `peergrid-layout` is pure; this crate decides when to run
//! it. [`GridScheduler`] folds resize observations, viewport resizes, and
//! post-render notifications into a single debounced recompute, discards
//! results that would not change the rendered tile width, and cancels all
//! pending work when the container goes away.
//!
//! Configuration comes from [`SchedulerConfig`], either built in code or read
//! from `PEERGRID_*` environment variables via [`SchedulerConfig::from_env`].

pub mod config;
pub mod scheduler;

pub use config::{ConfigError, DEFAULT_QUIET_PERIOD_MS, SchedulerConfig};
pub use scheduler::{
    ContainerProbe, DecisionLog, EngineState, GridScheduler, PendingTimer, Phase,
    SchedulerAction, SchedulerStats, SkipReason, TelemetryHooks,
};
