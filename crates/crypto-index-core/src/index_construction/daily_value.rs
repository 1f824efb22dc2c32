//! Daily index levels within a rebalancing period.
//!
//! value(t) = sum(weight_i * price_i(t)) / divisor
//!
//! An asset without a price at `t` drops out of that day's sum; its weight is
//! not redistributed to the remaining constituents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::index_construction::divisor::Divisor;
use crate::index_construction::weighting::WeightSet;
use crate::types::{AssetId, IndexValue, Money, PriceSeries, Timestamp};

/// Outcome of evaluating the index on one grid timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub timestamp: Timestamp,
    pub index_value: Money,
    /// Constituents with no price at this timestamp.
    pub missing: Vec<AssetId>,
}

impl DailyValue {
    pub fn as_index_value(&self) -> IndexValue {
        IndexValue {
            timestamp: self.timestamp,
            index_value: self.index_value,
        }
    }
}

/// Evaluate the index at `ts`.
///
/// Returns `None` (a gap) when no constituent has a price at `ts`, when the
/// level falls outside the `Decimal` range, or when it is not positive.
pub fn compute_daily_value(
    weights: &WeightSet,
    series: &BTreeMap<AssetId, PriceSeries>,
    ts: Timestamp,
    divisor: &Divisor,
) -> Option<DailyValue> {
    let mut weighted_sum = Decimal::ZERO;
    let mut priced = 0usize;
    let mut missing = Vec::new();

    for cw in weights.iter() {
        match series.get(&cw.asset_id).and_then(|s| s.price_at(ts)) {
            Some(price) => {
                let Some(sum) = cw
                    .weight
                    .checked_mul(price)
                    .and_then(|wp| weighted_sum.checked_add(wp))
                else {
                    tracing::warn!(timestamp = ts, "weighted price sum overflows, gap in index");
                    return None;
                };
                weighted_sum = sum;
                priced += 1;
            }
            None => {
                tracing::warn!(asset = %cw.asset_id, timestamp = ts, "no price data at timestamp");
                missing.push(cw.asset_id.clone());
            }
        }
    }

    if priced == 0 {
        tracing::warn!(timestamp = ts, "all constituents missing, gap in index");
        return None;
    }

    let Some(index_value) = divisor.level(weighted_sum) else {
        tracing::warn!(timestamp = ts, "index level outside the decimal range, gap in index");
        return None;
    };
    if index_value <= Decimal::ZERO {
        tracing::warn!(timestamp = ts, %index_value, "non-positive index value, gap in index");
        return None;
    }

    Some(DailyValue {
        timestamp: ts,
        index_value,
        missing,
    })
}

/// Evaluate the index on every timestamp of `grid`, keeping grid order.
pub fn compute_daily_values(
    weights: &WeightSet,
    series: &BTreeMap<AssetId, PriceSeries>,
    grid: &[Timestamp],
    divisor: &Divisor,
) -> Vec<Option<DailyValue>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        grid.par_iter()
            .map(|&ts| compute_daily_value(weights, series, ts, divisor))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        grid.iter()
            .map(|&ts| compute_daily_value(weights, series, ts, divisor))
            .collect()
    }
}
