#![forbid(unsafe_code)]

//! Debounced grid recomputation.
//!
//! [`GridScheduler`] decides *when* to run the tile solver. It provides:
//!
//! - **Last-trigger-wins debounce**: every trigger re-arms a single timer; a
//!   burst of resize events collapses into one solve after the quiet period.
//! - **Change suppression**: a solved layout whose rounded width matches the
//!   last applied one is discarded, so applying a size that echoes back as a
//!   resize observation of the same size cannot loop.
//! - **Lifecycle safety**: triggers are ignored while detached, and detaching
//!   cancels any pending timer unconditionally.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use peergrid_core::{ContainerSize, TriggerSource};
//! use peergrid_runtime::{GridScheduler, SchedulerAction, SchedulerConfig};
//! use web_time::Instant;
//!
//! let mut scheduler = GridScheduler::new(SchedulerConfig::default()).unwrap();
//! let t0 = Instant::now();
//!
//! scheduler.attach_at(ContainerSize::new(800.0, 600.0), t0);
//! scheduler.update_tile_count_at(1, t0);
//!
//! assert!(matches!(scheduler.tick_at(t0), SchedulerAction::Waiting { .. }));
//! let action = scheduler.tick_at(t0 + Duration::from_millis(200));
//! assert!(matches!(action, SchedulerAction::Apply(_)));
//! ```
//!
//! # State Machine
//!
//! ```text
//!            trigger                 trigger (re-arm)
//!   Idle ───────────────▶ Pending ◀──────────────┐
//!    ▲                      │  └─────────────────┘
//!    │   tick ≥ deadline    │
//!    └──────────────────────┘  solve → apply | suppress | skip
//! ```
//!
//! At most one timer is outstanding. `detach` returns to `Idle` from any
//! state and clears the applied layout.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Trigger while detached | Ignored, counted in `stats().ignored` |
//! | Fire with zero tiles | `Skipped(NoTiles)`, no solve |
//! | Fire with unmeasurable container | `Skipped(Unmeasurable)`, no solve |
//! | `quiet_period_ms = 0` | Fires on the next tick |
//! | `detach` with nothing pending | No-op apart from clearing state |

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use peergrid_core::{ContainerSize, TriggerSource};
use peergrid_layout::{LayoutResult, TileGrid, TileStyle};
use web_time::Instant;

use crate::config::{ConfigError, SchedulerConfig};

#[inline]
fn duration_since_or_zero(now: Instant, earlier: Instant) -> Duration {
    now.checked_duration_since(earlier)
        .unwrap_or(Duration::ZERO)
}

#[inline]
fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Reads the live size of the grid container.
///
/// Implemented by whatever observes the host element. Returning `None` means
/// the element is gone; the scheduler then skips the solve.
pub trait ContainerProbe {
    /// Current container size.
    fn measure(&self) -> Option<ContainerSize>;
}

impl ContainerProbe for ContainerSize {
    fn measure(&self) -> Option<ContainerSize> {
        Some(*self)
    }
}

impl ContainerProbe for Option<ContainerSize> {
    fn measure(&self) -> Option<ContainerSize> {
        *self
    }
}

impl ContainerProbe for Rc<Cell<ContainerSize>> {
    fn measure(&self) -> Option<ContainerSize> {
        Some(self.get())
    }
}

/// Coarse scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No timer armed.
    #[default]
    Idle,
    /// A timer is armed and will fire at its deadline.
    Pending,
}

impl Phase {
    /// Get the stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
        }
    }
}

/// The single outstanding debounce timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTimer {
    /// When the timer fires.
    pub deadline: Instant,
    /// First trigger of the current burst.
    pub window_start: Instant,
    /// Source of the most recent trigger.
    pub source: TriggerSource,
    /// Triggers folded into this timer after the first.
    pub coalesced: u32,
}

/// Per-grid engine state: the applied layout and the pending timer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    last_applied: Option<LayoutResult>,
    pending: Option<PendingTimer>,
}

impl EngineState {
    /// Current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::Pending
        } else {
            Phase::Idle
        }
    }

    /// Last layout handed downstream.
    #[inline]
    pub fn last_applied(&self) -> Option<&LayoutResult> {
        self.last_applied.as_ref()
    }

    /// The armed timer, if any.
    #[inline]
    pub fn pending(&self) -> Option<&PendingTimer> {
        self.pending.as_ref()
    }

    fn clear(&mut self) {
        self.last_applied = None;
        self.pending = None;
    }
}

/// Why a fired timer did not solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Tile count was zero.
    NoTiles,
    /// The probe reported no usable container size.
    Unmeasurable,
}

impl SkipReason {
    /// Get the stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoTiles => "no_tiles",
            Self::Unmeasurable => "unmeasurable",
        }
    }
}

/// Outcome of [`GridScheduler::tick_at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerAction {
    /// Nothing armed.
    Idle,
    /// Timer armed but not yet due.
    Waiting {
        /// Time left until the deadline.
        remaining: Duration,
    },
    /// A new layout must be applied downstream.
    Apply(LayoutResult),
    /// Solved, but the rounded width matched the applied layout.
    Suppressed,
    /// Fired without solving.
    Skipped(SkipReason),
}

impl SchedulerAction {
    /// The layout to apply, if this action carries one.
    #[must_use]
    pub fn layout(&self) -> Option<&LayoutResult> {
        match self {
            Self::Apply(result) => Some(result),
            _ => None,
        }
    }
}

/// One entry of the decision ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionLog {
    /// Monotonic decision index.
    pub event_idx: u64,
    /// Milliseconds since the first logged decision.
    pub elapsed_ms: f64,
    /// Decision label (`arm`, `rearm`, `ignore_detached`, `apply`,
    /// `suppress`, `skip`, `cancel`, `attach`, `detach`).
    pub action: &'static str,
    /// Trigger source, when the decision was caused by one.
    pub source: Option<TriggerSource>,
    /// Skip reason for `skip` decisions.
    pub skip_reason: Option<SkipReason>,
    /// Tile count at decision time.
    pub tile_count: usize,
    /// Container size used for the solve.
    pub container: Option<ContainerSize>,
    /// Solved layout for `apply` and `suppress`.
    pub result: Option<LayoutResult>,
    /// Triggers folded into the timer that fired or was cancelled.
    pub coalesced: u32,
    /// Time from the first trigger of the burst to this decision (ms).
    pub window_ms: Option<f64>,
}

impl DecisionLog {
    /// Serialize to a single JSONL line.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let source = self.source.map_or("null".to_string(), |s| format!("\"{}\"", s.as_str()));
        let skip = self
            .skip_reason
            .map_or("null".to_string(), |r| format!("\"{}\"", r.as_str()));
        let (cw, ch) = self
            .container
            .map_or((0.0, 0.0), |c| (c.width, c.height));
        let result = self.result.unwrap_or(LayoutResult::EMPTY);
        let window = self
            .window_ms
            .map_or("null".to_string(), |v| format!("{v:.3}"));
        format!(
            r#"{{"event":"grid_decision","idx":{},"elapsed_ms":{:.3},"action":"{}","source":{},"skip_reason":{},"tile_count":{},"container_w":{:.3},"container_h":{:.3},"rows":{},"columns":{},"tile_w":{:.3},"tile_h":{:.3},"coalesced":{},"window_ms":{}}}"#,
            self.event_idx,
            self.elapsed_ms,
            self.action,
            source,
            skip,
            self.tile_count,
            cw,
            ch,
            result.rows,
            result.columns,
            result.tile_width,
            result.tile_height,
            self.coalesced,
            window,
        )
    }
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Triggers accepted while attached.
    pub triggers: u64,
    /// Triggers dropped because no container was attached.
    pub ignored: u64,
    /// Triggers that re-armed an already pending timer.
    pub coalesced: u64,
    /// Timers that reached their deadline.
    pub fires: u64,
    /// Solver invocations.
    pub solves: u64,
    /// Layouts handed downstream.
    pub applies: u64,
    /// Solves discarded by change suppression.
    pub suppressed: u64,
    /// Fires that skipped the solve.
    pub skipped: u64,
    /// Timers cancelled by detach.
    pub cancelled: u64,
}

type OnApply = Box<dyn Fn(&LayoutResult)>;
type OnDecision = Box<dyn Fn(&DecisionLog)>;

/// Callbacks for observing scheduler decisions.
///
/// ```
/// use peergrid_runtime::{GridScheduler, SchedulerConfig, TelemetryHooks};
/// use peergrid_core::ContainerSize;
///
/// let hooks = TelemetryHooks::new()
///     .on_apply(|layout| println!("tiles now {:.0}px wide", layout.tile_width))
///     .with_tracing(true);
///
/// let scheduler = GridScheduler::<ContainerSize>::new(SchedulerConfig::default())
///     .unwrap()
///     .with_telemetry_hooks(hooks);
/// ```
pub struct TelemetryHooks {
    on_apply: Option<OnApply>,
    on_decision: Option<OnDecision>,
    emit_tracing: bool,
}

impl Default for TelemetryHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TelemetryHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHooks")
            .field("on_apply", &self.on_apply.is_some())
            .field("on_decision", &self.on_decision.is_some())
            .field("emit_tracing", &self.emit_tracing)
            .finish()
    }
}

impl TelemetryHooks {
    /// Create an empty hooks instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_apply: None,
            on_decision: None,
            emit_tracing: false,
        }
    }

    /// Called with every layout handed downstream.
    #[must_use]
    pub fn on_apply<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LayoutResult) + 'static,
    {
        self.on_apply = Some(Box::new(callback));
        self
    }

    /// Called with every ledger entry, logging enabled or not.
    #[must_use]
    pub fn on_decision<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DecisionLog) + 'static,
    {
        self.on_decision = Some(Box::new(callback));
        self
    }

    /// Emit each decision as a `tracing` event under `peergrid.decision`.
    #[must_use]
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.emit_tracing = enabled;
        self
    }

    fn fire_apply(&self, result: &LayoutResult) {
        if let Some(ref cb) = self.on_apply {
            cb(result);
        }
    }

    fn fire_decision(&self, entry: &DecisionLog) {
        if let Some(ref cb) = self.on_decision {
            cb(entry);
        }
        if self.emit_tracing {
            let result = entry.result.unwrap_or(LayoutResult::EMPTY);
            tracing::info!(
                target: "peergrid.decision",
                event_idx = entry.event_idx,
                elapsed_ms = entry.elapsed_ms,
                action = entry.action,
                source = entry.source.map_or("none", TriggerSource::as_str),
                tile_count = entry.tile_count,
                rows = result.rows,
                columns = result.columns,
                tile_w = result.tile_width,
                tile_h = result.tile_height,
                coalesced = entry.coalesced,
                "grid_decision"
            );
        }
    }
}

/// Debounced, change-suppressing driver for [`TileGrid`].
pub struct GridScheduler<P> {
    config: SchedulerConfig,
    grid: TileGrid,
    quiet_period: Duration,

    /// Attached container, `None` while unmounted.
    probe: Option<P>,

    /// Latest tile count reported by the render hook.
    tile_count: usize,

    state: EngineState,
    stats: SchedulerStats,

    event_idx: u64,
    log_start: Option<Instant>,
    logs: Vec<DecisionLog>,
    telemetry_hooks: Option<TelemetryHooks>,
}

impl<P: std::fmt::Debug> std::fmt::Debug for GridScheduler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridScheduler")
            .field("config", &self.config)
            .field("probe", &self.probe)
            .field("tile_count", &self.tile_count)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("telemetry_hooks", &self.telemetry_hooks)
            .finish_non_exhaustive()
    }
}

impl<P: ContainerProbe> GridScheduler<P> {
    /// Create a detached scheduler.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        let grid = config.build_grid()?;
        Ok(Self {
            quiet_period: Duration::from_millis(config.quiet_period_ms),
            config,
            grid,
            probe: None,
            tile_count: 0,
            state: EngineState::default(),
            stats: SchedulerStats::default(),
            event_idx: 0,
            log_start: None,
            logs: Vec::new(),
            telemetry_hooks: None,
        })
    }

    /// Attach telemetry hooks.
    #[must_use]
    pub fn with_telemetry_hooks(mut self, hooks: TelemetryHooks) -> Self {
        self.telemetry_hooks = Some(hooks);
        self
    }

    /// Bind the container and arm the initial recompute.
    pub fn attach(&mut self, probe: P) {
        self.attach_at(probe, Instant::now());
    }

    /// Bind the container at a specific time (for testing).
    ///
    /// Re-attaching replaces the previous container and starts from a clean
    /// state, exactly as if `detach` had been called first.
    pub fn attach_at(&mut self, probe: P, now: Instant) {
        if self.probe.is_some() {
            self.detach_at(now);
        }
        self.probe = Some(probe);
        self.log_decision(now, "attach", None, None, None, None);
        tracing::debug!(target: "peergrid.scheduler", "container attached");
        self.request_at(TriggerSource::Attach, now);
    }

    /// Unbind the container, cancelling any pending timer.
    pub fn detach(&mut self) -> Option<P> {
        self.detach_at(Instant::now())
    }

    /// Unbind the container at a specific time (for testing).
    ///
    /// Never fails: with nothing pending only the state is cleared.
    pub fn detach_at(&mut self, now: Instant) -> Option<P> {
        if let Some(timer) = self.state.pending {
            self.stats.cancelled += 1;
            self.log_decision(now, "cancel", Some(timer.source), None, None, Some(&timer));
            tracing::debug!(
                target: "peergrid.scheduler",
                coalesced = timer.coalesced,
                "pending recompute cancelled"
            );
        }
        self.state.clear();
        let probe = self.probe.take();
        if probe.is_some() {
            self.log_decision(now, "detach", None, None, None, None);
            tracing::debug!(target: "peergrid.scheduler", "container detached");
        }
        probe
    }

    /// Request a recompute.
    ///
    /// Returns `false` if the request was ignored because nothing is attached.
    pub fn request(&mut self, source: TriggerSource) -> bool {
        self.request_at(source, Instant::now())
    }

    /// Request a recompute at a specific time (for testing).
    pub fn request_at(&mut self, source: TriggerSource, now: Instant) -> bool {
        if self.probe.is_none() {
            self.stats.ignored += 1;
            self.log_decision(now, "ignore_detached", Some(source), None, None, None);
            tracing::trace!(
                target: "peergrid.scheduler",
                source = source.as_str(),
                "trigger ignored while detached"
            );
            return false;
        }

        self.stats.triggers += 1;
        let deadline = now + self.quiet_period;
        let timer = match self.state.pending {
            Some(prev) => {
                self.stats.coalesced += 1;
                PendingTimer {
                    deadline,
                    window_start: prev.window_start,
                    source,
                    coalesced: prev.coalesced.saturating_add(1),
                }
            }
            None => PendingTimer {
                deadline,
                window_start: now,
                source,
                coalesced: 0,
            },
        };
        self.state.pending = Some(timer);

        let action = if timer.coalesced == 0 { "arm" } else { "rearm" };
        self.log_decision(now, action, Some(source), None, None, Some(&timer));
        tracing::trace!(
            target: "peergrid.scheduler",
            source = source.as_str(),
            coalesced = timer.coalesced,
            "recompute armed"
        );
        true
    }

    /// Record the tile count after a render pass and request a recompute.
    pub fn update_tile_count(&mut self, tile_count: usize) -> bool {
        self.update_tile_count_at(tile_count, Instant::now())
    }

    /// Record the tile count at a specific time (for testing).
    pub fn update_tile_count_at(&mut self, tile_count: usize, now: Instant) -> bool {
        self.tile_count = tile_count;
        self.request_at(TriggerSource::PostUpdate, now)
    }

    /// Advance the scheduler.
    pub fn tick(&mut self) -> SchedulerAction {
        self.tick_at(Instant::now())
    }

    /// Advance the scheduler at a specific time (for testing).
    pub fn tick_at(&mut self, now: Instant) -> SchedulerAction {
        let Some(timer) = self.state.pending else {
            return SchedulerAction::Idle;
        };
        if now < timer.deadline {
            return SchedulerAction::Waiting {
                remaining: timer.deadline - now,
            };
        }
        self.state.pending = None;
        self.stats.fires += 1;
        self.fire(timer, now)
    }

    fn fire(&mut self, timer: PendingTimer, now: Instant) -> SchedulerAction {
        if self.tile_count == 0 {
            return self.skip(SkipReason::NoTiles, &timer, now);
        }

        let container = match self.probe.as_ref().and_then(ContainerProbe::measure) {
            Some(size) if size.is_measurable() => size,
            _ => return self.skip(SkipReason::Unmeasurable, &timer, now),
        };

        self.stats.solves += 1;
        let result = self.grid.solve(self.tile_count, container);

        if !result.differs_from(self.state.last_applied.as_ref()) {
            self.stats.suppressed += 1;
            self.log_decision(
                now,
                "suppress",
                Some(timer.source),
                Some(container),
                Some(result),
                Some(&timer),
            );
            tracing::debug!(
                target: "peergrid.scheduler",
                tile_w = result.tile_width,
                "layout suppressed, rounded width unchanged"
            );
            return SchedulerAction::Suppressed;
        }

        self.state.last_applied = Some(result);
        self.stats.applies += 1;
        self.log_decision(
            now,
            "apply",
            Some(timer.source),
            Some(container),
            Some(result),
            Some(&timer),
        );
        tracing::debug!(
            target: "peergrid.scheduler",
            tile_count = self.tile_count,
            rows = result.rows,
            columns = result.columns,
            tile_w = result.tile_width,
            tile_h = result.tile_height,
            coalesced = timer.coalesced,
            "layout applied"
        );
        if let Some(ref hooks) = self.telemetry_hooks {
            hooks.fire_apply(&result);
        }
        SchedulerAction::Apply(result)
    }

    fn skip(&mut self, reason: SkipReason, timer: &PendingTimer, now: Instant) -> SchedulerAction {
        self.stats.skipped += 1;
        let container = self.probe.as_ref().and_then(ContainerProbe::measure);
        self.log_skip(now, reason, timer, container);
        tracing::debug!(
            target: "peergrid.scheduler",
            reason = reason.as_str(),
            "recompute skipped"
        );
        SchedulerAction::Skipped(reason)
    }

    /// Time until the pending timer fires.
    pub fn time_until_fire(&self, now: Instant) -> Option<Duration> {
        let timer = self.state.pending?;
        Some(timer.deadline.checked_duration_since(now).unwrap_or(Duration::ZERO))
    }

    /// Whether a container is attached.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.probe.is_some()
    }

    /// Attached probe.
    #[inline]
    pub fn probe(&self) -> Option<&P> {
        self.probe.as_ref()
    }

    /// Attached probe, mutably. Hosts that push sizes update it here.
    #[inline]
    pub fn probe_mut(&mut self) -> Option<&mut P> {
        self.probe.as_mut()
    }

    /// Latest tile count.
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// Check if a timer is armed.
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.state.pending.is_some()
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Engine state snapshot.
    #[inline]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Last applied layout.
    #[inline]
    pub fn last_applied(&self) -> Option<&LayoutResult> {
        self.state.last_applied.as_ref()
    }

    /// Style to render right now: the applied layout, or the initial style.
    pub fn current_style(&self) -> TileStyle {
        self.state
            .last_applied
            .map_or(self.config.initial_style, |r| r.style())
    }

    /// Configuration in use.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Solver in use.
    #[inline]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Lifetime counters.
    #[inline]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Decision ledger (empty unless logging is enabled).
    pub fn logs(&self) -> &[DecisionLog] {
        &self.logs
    }

    /// Drop the ledger.
    pub fn clear_logs(&mut self) {
        self.logs.clear();
        self.log_start = None;
    }

    /// Ledger as JSONL, one decision per line.
    #[must_use]
    pub fn decision_logs_jsonl(&self) -> String {
        self.logs
            .iter()
            .map(DecisionLog::to_jsonl)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn recording(&self) -> bool {
        self.config.enable_logging || self.telemetry_hooks.is_some()
    }

    fn log_skip(
        &mut self,
        now: Instant,
        reason: SkipReason,
        timer: &PendingTimer,
        container: Option<ContainerSize>,
    ) {
        if let Some(mut entry) = self.build_entry(now, "skip", Some(timer.source), container, None, Some(timer)) {
            entry.skip_reason = Some(reason);
            self.record(entry);
        }
    }

    fn log_decision(
        &mut self,
        now: Instant,
        action: &'static str,
        source: Option<TriggerSource>,
        container: Option<ContainerSize>,
        result: Option<LayoutResult>,
        timer: Option<&PendingTimer>,
    ) {
        if let Some(entry) = self.build_entry(now, action, source, container, result, timer) {
            self.record(entry);
        }
    }

    fn build_entry(
        &mut self,
        now: Instant,
        action: &'static str,
        source: Option<TriggerSource>,
        container: Option<ContainerSize>,
        result: Option<LayoutResult>,
        timer: Option<&PendingTimer>,
    ) -> Option<DecisionLog> {
        if !self.recording() {
            return None;
        }
        let start = *self.log_start.get_or_insert(now);
        let entry = DecisionLog {
            event_idx: self.event_idx,
            elapsed_ms: ms(duration_since_or_zero(now, start)),
            action,
            source,
            skip_reason: None,
            tile_count: self.tile_count,
            container,
            result,
            coalesced: timer.map_or(0, |t| t.coalesced),
            window_ms: timer.map(|t| ms(duration_since_or_zero(now, t.window_start))),
        };
        self.event_idx += 1;
        Some(entry)
    }

    fn record(&mut self, entry: DecisionLog) {
        if let Some(ref hooks) = self.telemetry_hooks {
            hooks.fire_decision(&entry);
        }
        if self.config.enable_logging {
            self.logs.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig::default().with_logging(true)
    }

    fn shared(w: f64, h: f64) -> Rc<Cell<ContainerSize>> {
        Rc::new(Cell::new(ContainerSize::new(w, h)))
    }

    fn after(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    /// Attached scheduler with `tiles` tiles whose first layout is applied.
    fn settled(tiles: usize, size: &Rc<Cell<ContainerSize>>, base: Instant) -> GridScheduler<Rc<Cell<ContainerSize>>> {
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(size.clone(), base);
        s.update_tile_count_at(tiles, base);
        let action = s.tick_at(after(base, 200));
        assert!(matches!(action, SchedulerAction::Apply(_)), "got {action:?}");
        s
    }

    #[test]
    fn new_scheduler_is_idle_and_detached() {
        let s = GridScheduler::<ContainerSize>::new(SchedulerConfig::default()).unwrap();
        assert!(!s.is_attached());
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.current_style(), TileStyle::PLACEHOLDER);
        assert!(s.last_applied().is_none());
    }

    #[test]
    fn invalid_grid_config_is_rejected() {
        let config = SchedulerConfig::default()
            .with_grid(peergrid_layout::GridConfig::default().with_aspect_ratio(0.0));
        assert!(GridScheduler::<ContainerSize>::new(config).is_err());
    }

    #[test]
    fn attach_arms_initial_recompute() {
        let base = Instant::now();
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        assert_eq!(s.phase(), Phase::Pending);
        assert_eq!(s.state().pending().map(|t| t.source), Some(TriggerSource::Attach));
        assert_eq!(s.time_until_fire(base), Some(Duration::from_millis(200)));
    }

    #[test]
    fn fires_only_after_quiet_period() {
        let base = Instant::now();
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        s.update_tile_count_at(1, base);

        assert_eq!(
            s.tick_at(after(base, 199)),
            SchedulerAction::Waiting {
                remaining: Duration::from_millis(1)
            }
        );
        let action = s.tick_at(after(base, 200));
        let layout = action.layout().copied().unwrap();
        assert_eq!((layout.rows, layout.columns), (1, 1));
        assert!((layout.tile_width - 720.0).abs() < 1e-9);
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.tick_at(after(base, 400)), SchedulerAction::Idle);
    }

    #[test]
    fn new_trigger_supersedes_pending_timer() {
        let base = Instant::now();
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        s.update_tile_count_at(2, after(base, 150));

        // Original deadline passed, but the re-arm moved it.
        assert!(matches!(s.tick_at(after(base, 250)), SchedulerAction::Waiting { .. }));
        assert!(matches!(s.tick_at(after(base, 350)), SchedulerAction::Apply(_)));

        let stats = s.stats();
        assert_eq!(stats.triggers, 2);
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.fires, 1);
    }

    #[test]
    fn burst_collapses_into_one_solve_with_final_size() {
        let base = Instant::now();
        let size = shared(1000.0, 1000.0);
        let mut s = settled(4, &size, base);
        let start = after(base, 1000);

        for i in 0..10u64 {
            size.set(ContainerSize::new(1000.0 + 25.0 * i as f64, 1000.0));
            s.request_at(TriggerSource::ElementResize, start + Duration::from_millis(i * 5));
        }
        let last = start + Duration::from_millis(45);

        let mut applied = Vec::new();
        let mut t = start;
        while t <= last + Duration::from_millis(400) {
            if let SchedulerAction::Apply(layout) = s.tick_at(t) {
                applied.push((t, layout));
            }
            t += Duration::from_millis(16);
        }

        assert_eq!(applied.len(), 1);
        let (when, layout) = applied[0];
        assert!(when >= last + Duration::from_millis(200));
        assert_eq!(layout, s.grid().solve(4, ContainerSize::new(1225.0, 1000.0)));
        assert_eq!(s.stats().solves, 2);
    }

    #[test]
    fn identical_rounded_width_is_suppressed() {
        let base = Instant::now();
        let size = shared(800.0, 600.0);
        let mut s = settled(1, &size, base);

        // Half a pixel narrower keeps ceil(0.9 * w) at 720.
        size.set(ContainerSize::new(799.5, 600.0));
        s.request_at(TriggerSource::ElementResize, after(base, 500));
        assert_eq!(s.tick_at(after(base, 700)), SchedulerAction::Suppressed);

        let stats = s.stats();
        assert_eq!(stats.solves, 2);
        assert_eq!(stats.applies, 1);
        assert_eq!(stats.suppressed, 1);
        assert!((s.last_applied().unwrap().tile_width - 720.0).abs() < 1e-9);
    }

    #[test]
    fn applied_size_echo_terminates() {
        let base = Instant::now();
        let size = shared(1200.0, 800.0);
        let mut s = settled(3, &size, base);
        let mut t = after(base, 200);

        // Applying a style re-renders (post-update) and the observer reports
        // the same container. Both must settle without another apply.
        for _ in 0..5 {
            s.update_tile_count_at(3, t);
            s.request_at(TriggerSource::ElementResize, t);
            t += Duration::from_millis(200);
            assert_eq!(s.tick_at(t), SchedulerAction::Suppressed);
            assert_eq!(s.phase(), Phase::Idle);
        }
        assert_eq!(s.stats().applies, 1);
    }

    #[test]
    fn zero_tiles_skip_without_solving() {
        let base = Instant::now();
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        assert_eq!(
            s.tick_at(after(base, 200)),
            SchedulerAction::Skipped(SkipReason::NoTiles)
        );
        assert_eq!(s.stats().solves, 0);
        assert!(s.last_applied().is_none());
    }

    #[test]
    fn zero_tiles_keep_previous_layout() {
        let base = Instant::now();
        let size = shared(800.0, 600.0);
        let mut s = settled(2, &size, base);
        let before = *s.last_applied().unwrap();

        s.update_tile_count_at(0, after(base, 300));
        assert_eq!(
            s.tick_at(after(base, 500)),
            SchedulerAction::Skipped(SkipReason::NoTiles)
        );
        assert_eq!(s.last_applied(), Some(&before));
    }

    #[test]
    fn unmeasurable_container_skips() {
        let base = Instant::now();
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(ContainerSize::ZERO, base);
        s.update_tile_count_at(3, base);
        assert_eq!(
            s.tick_at(after(base, 200)),
            SchedulerAction::Skipped(SkipReason::Unmeasurable)
        );

        let mut gone = GridScheduler::<Option<ContainerSize>>::new(test_config()).unwrap();
        gone.attach_at(None, base);
        gone.update_tile_count_at(3, base);
        assert_eq!(
            gone.tick_at(after(base, 200)),
            SchedulerAction::Skipped(SkipReason::Unmeasurable)
        );
        assert_eq!(gone.stats().solves, 0);
    }

    #[test]
    fn detach_cancels_pending_and_clears_state() {
        let base = Instant::now();
        let size = shared(800.0, 600.0);
        let mut s = settled(2, &size, base);
        s.request_at(TriggerSource::ViewportResize, after(base, 300));
        assert!(s.has_pending());

        let probe = s.detach_at(after(base, 310));
        assert!(probe.is_some());
        assert!(!s.has_pending());
        assert!(s.last_applied().is_none());
        assert_eq!(s.current_style(), TileStyle::PLACEHOLDER);
        assert_eq!(s.stats().cancelled, 1);
        assert_eq!(s.tick_at(after(base, 600)), SchedulerAction::Idle);
    }

    #[test]
    fn detach_without_pending_is_harmless() {
        let mut s = GridScheduler::<ContainerSize>::new(test_config()).unwrap();
        assert!(s.detach().is_none());
        assert!(s.detach().is_none());
        assert_eq!(s.stats().cancelled, 0);
    }

    #[test]
    fn triggers_while_detached_are_ignored() {
        let base = Instant::now();
        let mut s = GridScheduler::<ContainerSize>::new(test_config()).unwrap();
        assert!(!s.request_at(TriggerSource::ViewportResize, base));
        assert!(!s.update_tile_count_at(4, base));
        assert_eq!(s.tile_count(), 4);
        assert!(!s.has_pending());
        assert_eq!(s.stats().ignored, 2);
        assert!(s.logs().iter().all(|e| e.action == "ignore_detached"));
    }

    #[test]
    fn reattach_starts_clean() {
        let base = Instant::now();
        let size = shared(800.0, 600.0);
        let mut s = settled(1, &size, base);
        s.attach_at(shared(1600.0, 900.0), after(base, 300));
        assert!(s.last_applied().is_none());
        assert!(matches!(s.tick_at(after(base, 500)), SchedulerAction::Apply(_)));
    }

    #[test]
    fn post_update_is_handled_like_resize() {
        let base = Instant::now();
        for source in TriggerSource::ALL {
            let size = shared(1200.0, 800.0);
            let mut s = settled(1, &size, base);
            size.set(ContainerSize::new(600.0, 800.0));
            s.request_at(source, after(base, 300));
            let action = s.tick_at(after(base, 500));
            assert!(matches!(action, SchedulerAction::Apply(_)), "{source}: {action:?}");
        }
    }

    #[test]
    fn zero_quiet_period_fires_on_next_tick() {
        let base = Instant::now();
        let mut s = GridScheduler::new(SchedulerConfig::default().with_quiet_period_ms(0)).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        s.update_tile_count_at(1, base);
        assert!(matches!(s.tick_at(base), SchedulerAction::Apply(_)));
    }

    #[test]
    fn ledger_records_decisions_in_order() {
        let base = Instant::now();
        let size = shared(800.0, 600.0);
        let mut s = settled(1, &size, base);
        s.request_at(TriggerSource::ElementResize, after(base, 300));
        s.tick_at(after(base, 500));
        s.detach_at(after(base, 600));

        let actions: Vec<_> = s.logs().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            ["attach", "arm", "rearm", "apply", "arm", "suppress", "detach"]
        );
        let idx: Vec<_> = s.logs().iter().map(|e| e.event_idx).collect();
        assert!(idx.windows(2).all(|w| w[0] < w[1]));

        let jsonl = s.decision_logs_jsonl();
        assert_eq!(jsonl.lines().count(), 7);
        assert!(jsonl.lines().all(|l| l.starts_with('{') && l.ends_with('}')));
        assert!(jsonl.contains(r#""action":"apply""#));
        assert!(jsonl.contains(r#""source":"post_update""#));

        s.clear_logs();
        assert!(s.logs().is_empty());
    }

    #[test]
    fn skip_entries_carry_reason() {
        let base = Instant::now();
        let mut s = GridScheduler::new(test_config()).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        s.tick_at(after(base, 200));
        let entry = s.logs().last().unwrap();
        assert_eq!(entry.action, "skip");
        assert_eq!(entry.skip_reason, Some(SkipReason::NoTiles));
        assert!(entry.to_jsonl().contains(r#""skip_reason":"no_tiles""#));
    }

    #[test]
    fn logging_disabled_keeps_ledger_empty() {
        let base = Instant::now();
        let mut s = GridScheduler::new(SchedulerConfig::default()).unwrap();
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        s.update_tile_count_at(1, base);
        s.tick_at(after(base, 200));
        assert!(s.logs().is_empty());
        assert_eq!(s.stats().applies, 1);
    }

    #[test]
    fn hooks_observe_applies_and_decisions() {
        let applied = Rc::new(RefCell::new(Vec::new()));
        let decisions = Rc::new(Cell::new(0u32));
        let hooks = {
            let applied = applied.clone();
            let decisions = decisions.clone();
            TelemetryHooks::new()
                .on_apply(move |r| applied.borrow_mut().push(r.rounded_width()))
                .on_decision(move |_| decisions.set(decisions.get() + 1))
        };

        let base = Instant::now();
        let mut s = GridScheduler::new(SchedulerConfig::default())
            .unwrap()
            .with_telemetry_hooks(hooks);
        s.attach_at(ContainerSize::new(800.0, 600.0), base);
        s.update_tile_count_at(1, base);
        s.tick_at(after(base, 200));

        assert_eq!(*applied.borrow(), vec![720]);
        // attach, arm, rearm, apply
        assert_eq!(decisions.get(), 4);
        assert!(s.logs().is_empty());
    }

    #[test]
    fn current_style_tracks_applied_layout() {
        let base = Instant::now();
        let size = shared(800.0, 600.0);
        let s = settled(1, &size, base);
        let style = s.current_style();
        assert!((style.width - 720.0).abs() < 1e-9);
        assert!((style.height - 720.0 / peergrid_layout::VIDEO_ASPECT_RATIO).abs() < 1e-9);
    }
}
