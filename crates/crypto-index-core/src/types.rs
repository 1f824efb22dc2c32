use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::IndexResult;

/// Prices, market caps and index levels. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Constituent weights expressed as decimals (0.25 = 25%).
pub type Weight = Decimal;

/// Stable asset identifier (e.g. a CoinGecko ID such as "bitcoin").
pub type AssetId = String;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Length of one index day on the timestamp grid.
pub const SECONDS_PER_DAY: Timestamp = 86_400;

/// A single observation of an asset's price and market capitalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Timestamp,
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Money>,
}

/// Daily prices of one asset within one rebalancing period, ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Exact-match lookup on the timestamp grid.
    pub fn point_at(&self, ts: Timestamp) -> Option<&PricePoint> {
        self.points
            .binary_search_by_key(&ts, |p| p.timestamp)
            .ok()
            .map(|i| &self.points[i])
    }

    pub fn price_at(&self, ts: Timestamp) -> Option<Money> {
        self.point_at(ts).map(|p| p.price)
    }

    pub fn market_cap_at(&self, ts: Timestamp) -> Option<Money> {
        self.point_at(ts).and_then(|p| p.market_cap)
    }

    /// Checks ordering, uniqueness and sign of every point, and that a non-empty
    /// series spans exactly `[start_ts, end_ts]`.
    pub fn validate(&self, asset_id: &str, period: &RebalancingPeriod) -> IndexResult<()> {
        if self.points.is_empty() {
            return Ok(());
        }
        for pair in self.points.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(IndexError::data(
                    asset_id,
                    format!(
                        "timestamps not strictly increasing ({} then {})",
                        pair[0].timestamp, pair[1].timestamp
                    ),
                ));
            }
        }
        for p in &self.points {
            if p.price < Decimal::ZERO {
                return Err(IndexError::data(
                    asset_id,
                    format!("negative price at {}", p.timestamp),
                ));
            }
            if matches!(p.market_cap, Some(mc) if mc < Decimal::ZERO) {
                return Err(IndexError::data(
                    asset_id,
                    format!("negative market cap at {}", p.timestamp),
                ));
            }
        }
        let (first, last) = (self.points[0].timestamp, self.points[self.points.len() - 1].timestamp);
        if first != period.start_ts || last != period.end_ts {
            return Err(IndexError::data(
                asset_id,
                format!(
                    "series spans [{first}, {last}] but period {} spans [{}, {}]",
                    period.label, period.start_ts, period.end_ts
                ),
            ));
        }
        Ok(())
    }
}

/// One entry of a constituent snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub asset_id: AssetId,
    /// Raw, un-normalized weight carried by the snapshot (typically the market
    /// cap recorded when the snapshot was taken).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_hint: Option<Money>,
}

impl Constituent {
    pub fn new(asset_id: impl Into<AssetId>) -> Self {
        Self {
            asset_id: asset_id.into(),
            weight_hint: None,
        }
    }

    pub fn with_hint(asset_id: impl Into<AssetId>, hint: Money) -> Self {
        Self {
            asset_id: asset_id.into(),
            weight_hint: Some(hint),
        }
    }
}

/// Ordered constituent set, frozen for one rebalancing period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstituentSnapshot {
    pub constituents: Vec<Constituent>,
}

impl ConstituentSnapshot {
    pub fn new(constituents: Vec<Constituent>) -> Self {
        Self { constituents }
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AssetId>,
    {
        Self {
            constituents: ids.into_iter().map(Constituent::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.constituents.iter().map(|c| c.asset_id.as_str())
    }
}

/// A date range during which the constituent set and weights are frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancingPeriod {
    /// Start-date label, e.g. "2021-01-03".
    pub label: String,
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
}

impl RebalancingPeriod {
    pub fn new(label: impl Into<String>, start_ts: Timestamp, end_ts: Timestamp) -> Self {
        Self {
            label: label.into(),
            start_ts,
            end_ts,
        }
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.start_ts >= self.end_ts {
            return Err(IndexError::InvalidInput {
                field: "period".into(),
                reason: format!(
                    "{}: start {} must precede end {}",
                    self.label, self.start_ts, self.end_ts
                ),
            });
        }
        Ok(())
    }

    /// Daily timestamps from the period start up to, but excluding, the end.
    /// The end timestamp belongs to the next period's start (or is appended
    /// once as the terminal point of the whole index).
    pub fn daily_timestamps(&self) -> Vec<Timestamp> {
        (self.start_ts..self.end_ts)
            .step_by(SECONDS_PER_DAY as usize)
            .collect()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        timestamp_to_date(self.start_ts)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        timestamp_to_date(self.end_ts)
    }
}

pub fn timestamp_to_date(ts: Timestamp) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

/// One point of the index history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexValue {
    pub timestamp: Timestamp,
    pub index_value: Money,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period() -> RebalancingPeriod {
        RebalancingPeriod::new("2021-01-03", 1_609_632_000, 1_609_632_000 + 3 * SECONDS_PER_DAY)
    }

    fn flat_series(p: &RebalancingPeriod, price: Decimal) -> PriceSeries {
        let mut ts: Vec<Timestamp> = p.daily_timestamps();
        ts.push(p.end_ts);
        PriceSeries::new(
            ts.into_iter()
                .map(|timestamp| PricePoint {
                    timestamp,
                    price,
                    market_cap: Some(price * dec!(1000)),
                })
                .collect(),
        )
    }

    #[test]
    fn test_daily_timestamps_exclude_end() {
        let p = period();
        let ts = p.daily_timestamps();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts[0], p.start_ts);
        assert_eq!(ts[2], p.start_ts + 2 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_period_label_dates() {
        let p = period();
        assert_eq!(p.start_date(), NaiveDate::from_ymd_opt(2021, 1, 3));
        assert_eq!(p.end_date(), NaiveDate::from_ymd_opt(2021, 1, 6));
    }

    #[test]
    fn test_reject_inverted_period() {
        let p = RebalancingPeriod::new("bad", 200, 100);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_price_lookup_exact_match_only() {
        let p = period();
        let s = flat_series(&p, dec!(2.5));
        assert_eq!(s.price_at(p.start_ts), Some(dec!(2.5)));
        assert_eq!(s.price_at(p.start_ts + 1), None);
        assert_eq!(s.market_cap_at(p.end_ts), Some(dec!(2500)));
    }

    #[test]
    fn test_series_validation_accepts_matching_span() {
        let p = period();
        assert!(flat_series(&p, dec!(1)).validate("x", &p).is_ok());
        assert!(PriceSeries::default().validate("x", &p).is_ok());
    }

    #[test]
    fn test_series_validation_rejects_span_mismatch() {
        let p = period();
        let mut s = flat_series(&p, dec!(1));
        s.points.pop();
        assert!(matches!(s.validate("x", &p), Err(IndexError::Data { .. })));
    }

    #[test]
    fn test_series_validation_rejects_duplicates() {
        let p = period();
        let mut s = flat_series(&p, dec!(1));
        let dup = s.points[0].clone();
        s.points.insert(1, dup);
        assert!(s.validate("x", &p).is_err());
    }

    #[test]
    fn test_series_validation_rejects_negative_price() {
        let p = period();
        let mut s = flat_series(&p, dec!(1));
        s.points[1].price = dec!(-1);
        assert!(s.validate("x", &p).is_err());
    }
}
