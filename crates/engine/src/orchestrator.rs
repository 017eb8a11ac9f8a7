//! Blink orchestration for one mounted view.
//!
//! Lifecycle:
//! - [`BlinkOrchestrator::mount`] builds the timers and replays any persisted
//!   compare-with-previous highlights. Replay is only reachable from `mount`,
//!   so it happens at most once per instance.
//! - [`BlinkOrchestrator::on_data_update`] runs a fresh detection pass each
//!   time the host's inputs change.
//! - [`BlinkOrchestrator::unmount`] (or drop) stops every timer and releases
//!   the redraw subscription. Persisted entries survive for the next mount.
//!
//! Per-rule phases: `Idle -> Recovering -> Active -> Idle`. `Recovering` only
//! occurs during `mount`, for compare rules with a non-empty persisted entry.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use cellblink_config::BlinkSettings;
use cellblink_core::{
    series_for, BlinkRule, CellCoord, CellKey, FieldSeries, RecoveryKey, RuleSet, Snapshot,
    ThresholdRule, ViewIdentity,
};

use crate::diff::{cells_in_column, differing_cells};
use crate::recovery::RecoveryStore;
use crate::redraw::{RedrawBus, Subscription};
use crate::scheduler::Scheduler;
use crate::threshold::{evaluate_rule, ThresholdOutcome};
use crate::timers::{HighlightListener, HighlightMap, HighlightTimers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePhase {
    /// No highlight running for this rule.
    Idle,
    /// Replaying persisted highlights during mount.
    Recovering,
    /// At least one highlight timer is running.
    Active,
}

/// Everything the host knows at the moment its inputs changed.
#[derive(Debug, Clone, Copy)]
pub struct DataUpdate<'a> {
    pub current: Option<&'a Snapshot>,
    pub previous: Option<&'a Snapshot>,
    /// Time-stamped values per column, for threshold rules
    pub series: &'a [FieldSeries],
    pub visible_columns: &'a [String],
    pub visible_row_count: usize,
    pub now: DateTime<Utc>,
}

impl<'a> DataUpdate<'a> {
    /// All columns and rows of `current` visible, no series.
    pub fn new(current: &'a Snapshot, previous: Option<&'a Snapshot>, now: DateTime<Utc>) -> Self {
        Self {
            current: Some(current),
            previous,
            series: &[],
            visible_columns: &current.columns,
            visible_row_count: current.row_count(),
            now,
        }
    }

    pub fn with_series(mut self, series: &'a [FieldSeries]) -> Self {
        self.series = series;
        self
    }

    pub fn with_visible_columns(mut self, columns: &'a [String]) -> Self {
        self.visible_columns = columns;
        self
    }

    pub fn with_visible_rows(mut self, count: usize) -> Self {
        self.visible_row_count = count;
        self
    }
}

pub struct BlinkOrchestrator<S: Scheduler>
where
    S::Handle: 'static,
{
    view: ViewIdentity,
    rules: RuleSet,
    diff_duration: Duration,
    store: Rc<dyn RecoveryStore>,
    timers: HighlightTimers<S>,
    phases: BTreeMap<String, RulePhase>,
    redraw: Option<Subscription>,
}

impl<S: Scheduler> BlinkOrchestrator<S>
where
    S::Handle: 'static,
{
    /// Mount for `view` and resume any highlights persisted by a previous mount.
    pub fn mount(
        view: ViewIdentity,
        rules: RuleSet,
        settings: &BlinkSettings,
        scheduler: S,
        store: Rc<dyn RecoveryStore>,
    ) -> Self {
        let timers = HighlightTimers::new(scheduler, settings.toggle_interval(), store.clone());
        let phases = rules.iter().map(|(column, _)| (column.to_string(), RulePhase::Idle)).collect();

        let mut this = Self {
            view,
            rules,
            diff_duration: settings.diff_duration(),
            store,
            timers,
            phases,
            redraw: None,
        };
        this.recover();
        this
    }

    fn recover(&mut self) {
        let columns: Vec<String> = self.rules.compare_columns().map(str::to_string).collect();
        for column in columns {
            let key = self.view.recovery_key(column.as_str());
            let coords = match self.store.get(&key) {
                Some(coords) if !coords.is_empty() => coords,
                _ => continue,
            };

            self.phases.insert(column.clone(), RulePhase::Recovering);
            log::debug!("resuming {} highlight(s) for {}", coords.len(), key);
            self.start_compare(&column, &coords, &key);
            self.phases.insert(column, RulePhase::Active);
        }
    }

    /// Receive redraw notifications until unmount. Replaces any earlier
    /// subscription.
    pub fn attach_redraw(&mut self, bus: &dyn RedrawBus) {
        let view = self.view.id;
        self.redraw = Some(bus.subscribe(Box::new(move || log::trace!("view {} redraw", view))));
    }

    /// Receives the full highlight map whenever a highlight starts, toggles,
    /// expires or is stopped.
    pub fn set_listener(&self, listener: impl FnMut(&HighlightMap) + 'static) {
        let listener: HighlightListener = Box::new(listener);
        self.timers.set_listener(listener);
    }

    /// Run one detection pass over the host's current inputs.
    pub fn on_data_update(&mut self, update: &DataUpdate<'_>) {
        let Some(current) = update.current else { return };
        if self.rules.is_empty() || current.columns.is_empty() || update.visible_columns.is_empty() {
            return;
        }

        let changed = if self.rules.compare_columns().next().is_some() {
            differing_cells(update.previous, update.current)
        } else {
            Vec::new()
        };

        for (col, column) in current.columns.iter().enumerate() {
            let Some(rule) = self.rules.get(column).cloned() else { continue };
            match rule {
                BlinkRule::CompareWithPrevious => {
                    self.detect_changes(column, cells_in_column(&changed, col));
                }
                BlinkRule::Threshold(rule) => self.detect_threshold(column, &rule, update),
            }
        }
    }

    fn detect_changes(&mut self, column: &str, changed: Vec<CellCoord>) {
        // Nothing changed: in-flight highlights keep running and their
        // persisted entry stays until they expire
        if changed.is_empty() {
            return;
        }
        let key = self.view.recovery_key(column);
        self.store.put(&key, &changed);
        self.start_compare(column, &changed, &key);
        self.phases.insert(column.to_string(), RulePhase::Active);
    }

    fn detect_threshold(&mut self, column: &str, rule: &ThresholdRule, update: &DataUpdate<'_>) {
        let outcome = evaluate_rule(rule, series_for(update.series, column), update.now);
        let ThresholdOutcome::Met { remaining } = outcome else { return };
        if update.visible_row_count == 0 {
            return;
        }
        for row in 0..update.visible_row_count {
            self.timers.start(CellKey::threshold(column, row), remaining, None);
        }
        self.phases.insert(column.to_string(), RulePhase::Active);
    }

    fn start_compare(&self, column: &str, coords: &[CellCoord], recovery: &RecoveryKey) {
        for coord in coords {
            self.timers.start(
                CellKey::compare(column, coord.row),
                self.diff_duration,
                Some(recovery.clone()),
            );
        }
    }

    /// Copy of the current highlight map.
    pub fn highlights(&self) -> HighlightMap {
        self.timers.states()
    }

    pub fn is_highlighted(&self, key: &CellKey) -> bool {
        self.timers.is_highlighted(key)
    }

    /// True while a highlight timer for `key` is running, whatever its
    /// current on/off state.
    pub fn is_blinking(&self, key: &CellKey) -> bool {
        self.timers.is_active(key)
    }

    /// Phase of the rule for `column`, or `None` if no rule is configured.
    pub fn rule_phase(&self, column: &str) -> Option<RulePhase> {
        let phase = *self.phases.get(column)?;
        match phase {
            RulePhase::Active if self.timers.active_in_column(column) == 0 => Some(RulePhase::Idle),
            phase => Some(phase),
        }
    }

    pub fn view(&self) -> &ViewIdentity {
        &self.view
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Tear down: stop every timer and release the redraw subscription.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<S: Scheduler> Drop for BlinkOrchestrator<S>
where
    S::Handle: 'static,
{
    fn drop(&mut self) {
        log::debug!("unmounting blink orchestrator for view {}", self.view.id);
        self.timers.stop_all();
        self.redraw.take();
    }
}
