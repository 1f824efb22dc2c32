//! Divisor computation for chain-linked indices.
//!
//! divisor = sum(weight_i * price_i(period_start)) / anchor
//!
//! The anchor is the base value for the first period and the previous
//! period's closing level afterwards, so the index does not jump when the
//! constituent set changes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::IndexError;
use crate::index_construction::weighting::WeightSet;
use crate::types::{AssetId, Money, PriceSeries, RebalancingPeriod};
use crate::IndexResult;

/// Result of a divisor computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divisor {
    pub value: Decimal,
    pub weighted_sum: Money,
    pub anchor: Money,
    /// Constituents that had a price at the period start.
    pub assets_priced: usize,
    /// Constituents excluded from the weighted sum (no price at period start).
    pub skipped: Vec<AssetId>,
}

impl Divisor {
    /// Index level for a weighted price sum: `weighted_sum / divisor`.
    ///
    /// Evaluated as `anchor * (weighted_sum / opening_sum)`, which is the same
    /// quantity but keeps the opening level exactly equal to the anchor under
    /// decimal rounding. `None` when the opening sum is zero or the level
    /// falls outside the `Decimal` range.
    pub fn level(&self, weighted_sum: Money) -> Option<Money> {
        weighted_sum
            .checked_div(self.weighted_sum)?
            .checked_mul(self.anchor)
    }
}

/// Compute the period's divisor so that the index opens at `anchor`.
///
/// Assets without a price at the period start are skipped with a warning.
/// A zero weighted sum yields `ZeroDivisor`.
pub fn compute_divisor(
    period: &RebalancingPeriod,
    weights: &WeightSet,
    series: &BTreeMap<AssetId, PriceSeries>,
    anchor: Money,
) -> IndexResult<Divisor> {
    if anchor <= Decimal::ZERO {
        return Err(IndexError::InvalidInput {
            field: "anchor".into(),
            reason: format!("anchor value must be positive, got {anchor}"),
        });
    }

    let mut weighted_sum = Decimal::ZERO;
    let mut assets_priced = 0usize;
    let mut skipped = Vec::new();

    for cw in weights.iter() {
        match series.get(&cw.asset_id).and_then(|s| s.price_at(period.start_ts)) {
            Some(price) => {
                weighted_sum = cw
                    .weight
                    .checked_mul(price)
                    .and_then(|wp| weighted_sum.checked_add(wp))
                    .ok_or_else(|| {
                        IndexError::data(
                            &period.label,
                            format!("weighted opening price of {} overflows", cw.asset_id),
                        )
                    })?;
                assets_priced += 1;
            }
            None => {
                tracing::warn!(
                    period = %period.label,
                    asset = %cw.asset_id,
                    "no price data at period start, skipped in divisor"
                );
                skipped.push(cw.asset_id.clone());
            }
        }
    }

    if weighted_sum.is_zero() {
        return Err(IndexError::ZeroDivisor {
            period: period.label.clone(),
        });
    }

    let value = weighted_sum.checked_div(anchor).ok_or_else(|| {
        IndexError::data(&period.label, "divisor outside the decimal range")
    })?;

    Ok(Divisor {
        value,
        weighted_sum,
        anchor,
        assets_priced,
        skipped,
    })
}
