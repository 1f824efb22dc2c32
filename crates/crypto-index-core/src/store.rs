//! Read-only access to rebalancing periods, constituent snapshots and price series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::IndexError;
use crate::types::{
    AssetId, Constituent, ConstituentSnapshot, PriceSeries, RebalancingPeriod, Timestamp,
};
use crate::IndexResult;

/// Source of index inputs, keyed by period label.
///
/// `get_snapshot` and `get_price_series` return `IndexError::NotFound` when the
/// record does not exist. An empty price series is a valid answer meaning
/// "no data for this asset in this period".
pub trait PriceStore {
    /// Periods in chronological order.
    fn list_periods(&self) -> IndexResult<Vec<RebalancingPeriod>>;

    fn get_snapshot(&self, period_label: &str) -> IndexResult<ConstituentSnapshot>;

    fn get_price_series(&self, period_label: &str, asset_id: &str) -> IndexResult<PriceSeries>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Everything the engine needs for one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodData {
    pub label: String,
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    pub constituents: Vec<Constituent>,
    #[serde(default)]
    pub prices: BTreeMap<AssetId, PriceSeries>,
}

impl PeriodData {
    pub fn period(&self) -> RebalancingPeriod {
        RebalancingPeriod::new(self.label.clone(), self.start_ts, self.end_ts)
    }
}

/// Periods plus their data, held in memory. Also the JSON input format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryStore {
    pub periods: Vec<PeriodData>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a period. Periods are listed in start-timestamp order.
    pub fn add_period(
        &mut self,
        period: RebalancingPeriod,
        snapshot: ConstituentSnapshot,
        prices: BTreeMap<AssetId, PriceSeries>,
    ) -> &mut Self {
        self.periods.push(PeriodData {
            label: period.label,
            start_ts: period.start_ts,
            end_ts: period.end_ts,
            constituents: snapshot.constituents,
            prices,
        });
        self
    }

    fn find(&self, period_label: &str) -> IndexResult<&PeriodData> {
        self.periods
            .iter()
            .find(|p| p.label == period_label)
            .ok_or_else(|| IndexError::NotFound(format!("period {period_label}")))
    }
}

impl PriceStore for InMemoryStore {
    fn list_periods(&self) -> IndexResult<Vec<RebalancingPeriod>> {
        let mut periods: Vec<RebalancingPeriod> =
            self.periods.iter().map(PeriodData::period).collect();
        periods.sort_by_key(|p| p.start_ts);
        Ok(periods)
    }

    fn get_snapshot(&self, period_label: &str) -> IndexResult<ConstituentSnapshot> {
        Ok(ConstituentSnapshot::new(
            self.find(period_label)?.constituents.clone(),
        ))
    }

    fn get_price_series(&self, period_label: &str, asset_id: &str) -> IndexResult<PriceSeries> {
        self.find(period_label)?
            .prices
            .get(asset_id)
            .cloned()
            .ok_or_else(|| IndexError::NotFound(format!("prices for {asset_id} in {period_label}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricePoint;
    use rust_decimal_macros::dec;

    fn store() -> InMemoryStore {
        let mut s = InMemoryStore::new();
        let mut prices = BTreeMap::new();
        prices.insert(
            "x".to_string(),
            PriceSeries::new(vec![PricePoint {
                timestamp: 200,
                price: dec!(1),
                market_cap: None,
            }]),
        );
        s.add_period(
            RebalancingPeriod::new("b", 200, 300),
            ConstituentSnapshot::from_ids(["x"]),
            prices,
        );
        s.add_period(
            RebalancingPeriod::new("a", 100, 200),
            ConstituentSnapshot::from_ids(["x"]),
            BTreeMap::new(),
        );
        s
    }

    #[test]
    fn test_periods_listed_chronologically() {
        let labels: Vec<String> = store()
            .list_periods()
            .unwrap()
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn test_not_found() {
        let s = store();
        assert!(matches!(s.get_snapshot("zzz"), Err(IndexError::NotFound(_))));
        assert!(matches!(
            s.get_price_series("a", "x"),
            Err(IndexError::NotFound(_))
        ));
        assert_eq!(s.get_price_series("b", "x").unwrap().len(), 1);
    }

    #[test]
    fn test_json_input_format() {
        let json = r#"{
            "periods": [{
                "label": "2021-01-03",
                "start_ts": 1609632000,
                "end_ts": 1609718400,
                "constituents": [{"asset_id": "x", "weight_hint": "5"}],
                "prices": {"x": [
                    {"timestamp": 1609632000, "price": "1.0", "market_cap": "5"},
                    {"timestamp": 1609718400, "price": 1.5}
                ]}
            }]
        }"#;
        let s: InMemoryStore = serde_json::from_str(json).unwrap();
        let snap = s.get_snapshot("2021-01-03").unwrap();
        assert_eq!(snap.constituents[0].weight_hint, Some(dec!(5)));
        let series = s.get_price_series("2021-01-03", "x").unwrap();
        assert_eq!(series.price_at(1609718400), Some(dec!(1.5)));
        assert_eq!(series.market_cap_at(1609718400), None);
    }
}
