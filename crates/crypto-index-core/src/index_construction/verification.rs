//! Index History Verification.
//!
//! Checks an index history against the daily grid it should cover:
//! 1. **Coverage** -- expected vs actual number of daily points
//! 2. **Grid alignment** -- every timestamp a whole number of days from the start
//! 3. **Ordering** -- strictly increasing timestamps, largest gap in days
//! 4. **Flatness** -- whether every value is identical (constant-price fixtures)

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::types::{IndexValue, Money, Timestamp, SECONDS_PER_DAY};
use crate::IndexResult;

/// Input for history verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationInput {
    pub history: Vec<IndexValue>,
    pub expected_start: Timestamp,
    pub expected_end: Timestamp,
}

/// Output of history verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub expected_points: usize,
    pub actual_points: usize,
    /// Timestamps equal the full grid from start to end inclusive, in order.
    pub matches_grid: bool,
    pub on_daily_grid: bool,
    pub strictly_increasing: bool,
    pub max_gap_days: i64,
    /// Set when every value is identical.
    pub constant_value: Option<Money>,
    pub first_value: Option<Money>,
    pub last_value: Option<Money>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.matches_grid && self.on_daily_grid && self.strictly_increasing
    }
}

/// Verify `history` against the daily grid `[expected_start, expected_end]`.
pub fn verify_history(input: &VerificationInput) -> IndexResult<VerificationReport> {
    if input.expected_start > input.expected_end {
        return Err(IndexError::InvalidInput {
            field: "expected_end".into(),
            reason: "End must not precede start".into(),
        });
    }

    let grid: Vec<Timestamp> = (input.expected_start..=input.expected_end)
        .step_by(SECONDS_PER_DAY as usize)
        .collect();
    let history = &input.history;

    let matches_grid = grid.len() == history.len()
        && grid
            .iter()
            .zip(history.iter())
            .all(|(g, h)| *g == h.timestamp);

    let on_daily_grid = history
        .iter()
        .all(|h| (h.timestamp - input.expected_start).rem_euclid(SECONDS_PER_DAY) == 0);

    let strictly_increasing = history
        .windows(2)
        .all(|w| w[1].timestamp > w[0].timestamp);

    let max_gap_days = history
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp) / SECONDS_PER_DAY)
        .max()
        .unwrap_or(0);

    let constant_value = match history.first() {
        Some(first) if history.iter().all(|h| h.index_value == first.index_value) => {
            Some(first.index_value)
        }
        _ => None,
    };

    Ok(VerificationReport {
        expected_points: grid.len(),
        actual_points: history.len(),
        matches_grid,
        on_daily_grid,
        strictly_increasing,
        max_gap_days,
        constant_value,
        first_value: history.first().map(|h| h.index_value),
        last_value: history.last().map(|h| h.index_value),
    })
}
