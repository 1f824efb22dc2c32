//! Period-Chaining Driver.
//!
//! Folds over the rebalancing periods in chronological order, carrying the
//! anchor value as the accumulator:
//!
//! 1. **LoadingPeriod** -- snapshot and price series loaded and validated
//! 2. **ComputingDivisor** -- weights assigned, divisor anchored to the carried value
//! 3. **EmittingDailyValues** -- one level per day on the 86,400 s grid
//! 4. **CarryingForwardAnchor** -- level at the exact period end becomes the next anchor
//!
//! A failing period is skipped and leaves the anchor unchanged. Only a run
//! that emits no value at all is an error.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::IndexError;
use crate::index_construction::daily_value::{compute_daily_value, compute_daily_values};
use crate::index_construction::divisor::{compute_divisor, Divisor};
use crate::index_construction::weighting::{calculate_weights, WeightingScheme};
use crate::store::{InMemoryStore, PeriodData, PriceStore};
use crate::types::{
    with_metadata, AssetId, ComputationOutput, ConstituentSnapshot, IndexValue, Money,
    PriceSeries, RebalancingPeriod, Timestamp,
};
use crate::IndexResult;

fn default_base_value() -> Money {
    dec!(100)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Engine parameters, fixed for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub weighting: WeightingScheme,
    /// Level the index opens at in its first period.
    #[serde(default = "default_base_value")]
    pub base_value: Money,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weighting: WeightingScheme::default(),
            base_value: default_base_value(),
        }
    }
}

/// States of the period-chaining driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Idle,
    LoadingPeriod,
    ComputingDivisor,
    EmittingDailyValues,
    CarryingForwardAnchor,
    Done,
    Failed,
}

/// How a period ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeriodStatus {
    Completed,
    /// Skipped in `stage`; the anchor was carried through unchanged.
    Failed { stage: DriverState, reason: String },
}

/// Per-period account of what the driver did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub label: String,
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    #[serde(flatten)]
    pub status: PeriodStatus,
    pub constituents: usize,
    pub anchor_in: Money,
    pub anchor_out: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divisor: Option<Decimal>,
    pub points_emitted: usize,
    /// Grid timestamps that produced no value.
    pub gaps: Vec<Timestamp>,
    /// Constituents excluded from weighting or from the divisor.
    pub skipped_assets: Vec<AssetId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Output of a full engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRun {
    pub weighting: WeightingScheme,
    pub base_value: Money,
    /// Strictly increasing by timestamp, every value positive.
    pub history: Vec<IndexValue>,
    pub periods: Vec<PeriodReport>,
    pub final_state: DriverState,
    /// Anchor that would seed a following period.
    pub final_anchor: Money,
    pub cancelled: bool,
}

impl IndexRun {
    pub fn periods_completed(&self) -> usize {
        self.periods
            .iter()
            .filter(|p| p.status == PeriodStatus::Completed)
            .count()
    }

    pub fn periods_failed(&self) -> usize {
        self.periods.len() - self.periods_completed()
    }

    pub fn first_value(&self) -> Option<&IndexValue> {
        self.history.first()
    }

    pub fn last_value(&self) -> Option<&IndexValue> {
        self.history.last()
    }
}

/// JSON input: engine parameters plus the in-memory period data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCalculationInput {
    #[serde(default)]
    pub weighting: WeightingScheme,
    #[serde(default = "default_base_value")]
    pub base_value: Money,
    pub periods: Vec<PeriodData>,
}

#[derive(Serialize)]
struct RunAssumptions {
    weighting: WeightingScheme,
    base_value: Money,
    periods: usize,
    missing_prices: &'static str,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Chain-linked index calculator.
#[derive(Debug, Clone)]
pub struct IndexEngine {
    config: EngineConfig,
}

impl IndexEngine {
    pub fn new(config: EngineConfig) -> IndexResult<Self> {
        if config.base_value <= Decimal::ZERO {
            return Err(IndexError::InvalidInput {
                field: "base_value".into(),
                reason: format!("Base value must be positive, got {}", config.base_value),
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every period the store lists.
    pub fn run(&self, store: &dyn PriceStore) -> IndexResult<IndexRun> {
        self.run_until(store, &AtomicBool::new(false))
    }

    /// Run every period, checking `cancel` before starting each one. A
    /// cancelled run keeps the values computed so far.
    pub fn run_until(&self, store: &dyn PriceStore, cancel: &AtomicBool) -> IndexResult<IndexRun> {
        let periods = store.list_periods()?;
        tracing::info!(
            periods = periods.len(),
            weighting = %self.config.weighting,
            "calculating index"
        );
        trace_state(DriverState::Idle, "-");

        let state = periods
            .iter()
            .fold(ChainState::new(self.config.base_value), |state, period| {
                if state.cancelled || cancel.load(Ordering::Relaxed) {
                    return state.cancel(period);
                }
                self.step(state, store, period)
            });

        state.finish(&self.config)
    }

    fn step(
        &self,
        mut state: ChainState,
        store: &dyn PriceStore,
        period: &RebalancingPeriod,
    ) -> ChainState {
        let anchor_in = state.anchor;
        match self.process_period(store, period, anchor_in) {
            Ok(outcome) => {
                tracing::info!(
                    period = %period.label,
                    points = outcome.values.len(),
                    anchor_out = %outcome.anchor_out,
                    "period completed"
                );
                state.absorb(period, anchor_in, outcome);
            }
            Err(failure) => {
                tracing::warn!(
                    period = %period.label,
                    stage = ?failure.stage,
                    "period skipped: {}",
                    failure.error
                );
                trace_state(DriverState::Failed, &period.label);
                state.skip(period, anchor_in, failure);
            }
        }
        state
    }

    fn process_period(
        &self,
        store: &dyn PriceStore,
        period: &RebalancingPeriod,
        anchor: Money,
    ) -> Result<PeriodOutcome, PeriodFailure> {
        // --- LoadingPeriod ---
        trace_state(DriverState::LoadingPeriod, &period.label);
        let loading = |error| PeriodFailure::new(DriverState::LoadingPeriod, error);
        period.validate().map_err(loading)?;
        let snapshot = store.get_snapshot(&period.label).map_err(loading)?;
        if snapshot.is_empty() {
            return Err(loading(IndexError::Configuration(format!(
                "empty constituent snapshot for {}",
                period.label
            ))));
        }
        let (series, mut warnings) = load_series(store, period, &snapshot).map_err(loading)?;

        // --- ComputingDivisor ---
        trace_state(DriverState::ComputingDivisor, &period.label);
        let divisor_stage = |error| PeriodFailure::new(DriverState::ComputingDivisor, error);
        let weights = calculate_weights(self.config.weighting, &snapshot, &series, period.start_ts)
            .map_err(divisor_stage)?;
        warnings.extend(weights.warnings.iter().map(|w| format!("{}: {w}", period.label)));
        let divisor =
            compute_divisor(period, &weights, &series, anchor).map_err(divisor_stage)?;
        for asset in &divisor.skipped {
            warnings.push(format!(
                "{}: no price data for {asset} at period start",
                period.label
            ));
        }
        let mut skipped_assets = weights.excluded.clone();
        skipped_assets.extend(divisor.skipped.iter().cloned());

        // --- EmittingDailyValues ---
        trace_state(DriverState::EmittingDailyValues, &period.label);
        let grid = period.daily_timestamps();
        let mut values = Vec::with_capacity(grid.len());
        let mut gaps = Vec::new();
        for (ts, value) in grid.iter().zip(compute_daily_values(&weights, &series, &grid, &divisor)) {
            match value {
                Some(v) => values.push(v.as_index_value()),
                None => gaps.push(*ts),
            }
        }
        if !gaps.is_empty() {
            warnings.push(format!(
                "{}: {} day(s) without an index value",
                period.label,
                gaps.len()
            ));
        }

        // --- CarryingForwardAnchor ---
        trace_state(DriverState::CarryingForwardAnchor, &period.label);
        let end_value = compute_daily_value(&weights, &series, period.end_ts, &divisor)
            .map(|v| v.as_index_value());
        let anchor_out = match (&end_value, values.last()) {
            (Some(end), _) => end.index_value,
            (None, Some(last)) => {
                warnings.push(format!(
                    "{}: no index value at period end {}, carrying last value from {}",
                    period.label, period.end_ts, last.timestamp
                ));
                last.index_value
            }
            (None, None) => {
                return Err(PeriodFailure::new(
                    DriverState::CarryingForwardAnchor,
                    IndexError::data(&period.label, "no index value could be computed"),
                ));
            }
        };

        Ok(PeriodOutcome {
            constituents: snapshot.len(),
            divisor,
            values,
            end_value,
            anchor_out,
            gaps,
            skipped_assets,
            warnings,
        })
    }
}

/// Run the engine over JSON-supplied period data and wrap the result.
pub fn calculate_index(
    input: &IndexCalculationInput,
) -> IndexResult<ComputationOutput<IndexRun>> {
    let start = Instant::now();

    let engine = IndexEngine::new(EngineConfig {
        weighting: input.weighting,
        base_value: input.base_value,
    })?;
    let store = InMemoryStore {
        periods: input.periods.clone(),
    };
    let run = engine.run(&store)?;
    let warnings = run_warnings(&run);

    let assumptions = RunAssumptions {
        weighting: input.weighting,
        base_value: input.base_value,
        periods: input.periods.len(),
        missing_prices: "dropped for the day without weight renormalization",
    };
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Chain-linked divisor index",
        &assumptions,
        warnings,
        elapsed,
        run,
    ))
}

/// Human-readable warnings for every skipped period, skipped asset and gap.
pub fn run_warnings(run: &IndexRun) -> Vec<String> {
    run.periods
        .iter()
        .flat_map(|p| match &p.status {
            PeriodStatus::Failed { stage, reason } => {
                vec![format!("{}: skipped during {stage:?}: {reason}", p.label)]
            }
            PeriodStatus::Completed => p.warnings.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn trace_state(state: DriverState, period: &str) {
    tracing::debug!(?state, period, "driver state");
}

/// Load and validate every constituent's series. A malformed series fails
/// the period. A series the store reports as `NotFound` is not a load
/// failure: it is read as an empty series, so the asset is skipped with a
/// warning and the period still completes, the same as for a delisted asset
/// with an empty price file.
fn load_series(
    store: &dyn PriceStore,
    period: &RebalancingPeriod,
    snapshot: &ConstituentSnapshot,
) -> IndexResult<(BTreeMap<AssetId, PriceSeries>, Vec<String>)> {
    let mut series = BTreeMap::new();
    let mut warnings = Vec::new();
    for asset_id in snapshot.asset_ids() {
        let s = match store.get_price_series(&period.label, asset_id) {
            Ok(s) => s,
            Err(IndexError::NotFound(what)) => {
                tracing::warn!(period = %period.label, asset = asset_id, "price series not found");
                warnings.push(format!("{}: not found: {what}", period.label));
                PriceSeries::default()
            }
            Err(e) => return Err(e),
        };
        s.validate(asset_id, period)?;
        if s.is_empty() {
            tracing::warn!(period = %period.label, asset = asset_id, "empty price series");
        }
        series.insert(asset_id.to_string(), s);
    }
    Ok((series, warnings))
}

struct PeriodOutcome {
    constituents: usize,
    divisor: Divisor,
    values: Vec<IndexValue>,
    end_value: Option<IndexValue>,
    anchor_out: Money,
    gaps: Vec<Timestamp>,
    skipped_assets: Vec<AssetId>,
    warnings: Vec<String>,
}

struct PeriodFailure {
    stage: DriverState,
    error: IndexError,
}

impl PeriodFailure {
    fn new(stage: DriverState, error: IndexError) -> Self {
        Self { stage, error }
    }
}

/// Fold accumulator.
struct ChainState {
    anchor: Money,
    history: Vec<IndexValue>,
    /// Level at the end of the last completed period. Emitted only if no
    /// later period opens on the same timestamp.
    pending_end: Option<IndexValue>,
    reports: Vec<PeriodReport>,
    cancelled: bool,
}

impl ChainState {
    fn new(base_value: Money) -> Self {
        Self {
            anchor: base_value,
            history: Vec::new(),
            pending_end: None,
            reports: Vec::new(),
            cancelled: false,
        }
    }

    fn cancel(mut self, period: &RebalancingPeriod) -> Self {
        if !self.cancelled {
            tracing::warn!(period = %period.label, "run cancelled before period start");
        }
        self.cancelled = true;
        self
    }

    fn push(&mut self, value: IndexValue) {
        if let Some(pending) = self.pending_end.take() {
            if pending.timestamp < value.timestamp {
                self.append(pending);
            }
        }
        self.append(value);
    }

    fn append(&mut self, value: IndexValue) {
        match self.history.last() {
            Some(last) if last.timestamp >= value.timestamp => {
                tracing::warn!(
                    timestamp = value.timestamp,
                    last = last.timestamp,
                    "overlapping period, value dropped"
                );
            }
            _ => self.history.push(value),
        }
    }

    fn absorb(&mut self, period: &RebalancingPeriod, anchor_in: Money, outcome: PeriodOutcome) {
        for v in &outcome.values {
            self.push(*v);
        }
        if let Some(end) = outcome.end_value {
            if let Some(old) = self.pending_end.take() {
                if old.timestamp < end.timestamp {
                    self.append(old);
                }
            }
            self.pending_end = Some(end);
        }
        self.anchor = outcome.anchor_out;
        self.reports.push(PeriodReport {
            label: period.label.clone(),
            start_ts: period.start_ts,
            end_ts: period.end_ts,
            status: PeriodStatus::Completed,
            constituents: outcome.constituents,
            anchor_in,
            anchor_out: outcome.anchor_out,
            divisor: Some(outcome.divisor.value),
            points_emitted: outcome.values.len(),
            gaps: outcome.gaps,
            skipped_assets: outcome.skipped_assets,
            warnings: outcome.warnings,
        });
    }

    fn skip(&mut self, period: &RebalancingPeriod, anchor_in: Money, failure: PeriodFailure) {
        self.reports.push(PeriodReport {
            label: period.label.clone(),
            start_ts: period.start_ts,
            end_ts: period.end_ts,
            status: PeriodStatus::Failed {
                stage: failure.stage,
                reason: failure.error.to_string(),
            },
            constituents: 0,
            anchor_in,
            anchor_out: anchor_in,
            divisor: None,
            points_emitted: 0,
            gaps: Vec::new(),
            skipped_assets: Vec::new(),
            warnings: Vec::new(),
        });
    }

    fn finish(mut self, config: &EngineConfig) -> IndexResult<IndexRun> {
        if let Some(end) = self.pending_end.take() {
            self.append(end);
        }
        if self.history.is_empty() {
            trace_state(DriverState::Failed, "-");
            return Err(IndexError::EmptyResult);
        }
        trace_state(DriverState::Done, "-");
        Ok(IndexRun {
            weighting: config.weighting,
            base_value: config.base_value,
            history: self.history,
            periods: self.reports,
            final_state: DriverState::Done,
            final_anchor: self.anchor,
            cancelled: self.cancelled,
        })
    }
}
