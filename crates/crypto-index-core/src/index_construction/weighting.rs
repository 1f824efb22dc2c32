//! Constituent Weighting Schemes.
//!
//! Covers:
//! 1. **Equal Weighting** -- weight_i = 1/N over the whole snapshot
//! 2. **Capitalization Weighting** -- weight_i = market_cap_i / sum(market_cap)
//!    using market caps observed at the period start
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::IndexError;
use crate::types::{AssetId, Constituent, ConstituentSnapshot, Money, PriceSeries, Timestamp, Weight};
use crate::IndexResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How constituent weights are assigned at the start of a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingScheme {
    #[default]
    Equal,
    #[serde(alias = "market_cap", alias = "cap_weighted")]
    Capitalization,
}

impl WeightingScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightingScheme::Equal => "equal",
            WeightingScheme::Capitalization => "capitalization",
        }
    }
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightingScheme {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" | "ew" => Ok(WeightingScheme::Equal),
            "capitalization" | "market_cap" | "cap_weighted" | "cw" => {
                Ok(WeightingScheme::Capitalization)
            }
            other => Err(IndexError::InvalidInput {
                field: "weighting".into(),
                reason: format!("Unknown method: {other}"),
            }),
        }
    }
}

/// A constituent's normalized weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentWeight {
    pub asset_id: AssetId,
    pub weight: Weight,
}

/// Normalized weights for one period, in snapshot order.
///
/// Constituents that could not be weighted are listed in `excluded` and carry
/// no weight at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub weights: Vec<ConstituentWeight>,
    pub excluded: Vec<AssetId>,
    pub warnings: Vec<String>,
}

impl WeightSet {
    pub fn get(&self, asset_id: &str) -> Option<Weight> {
        self.weights
            .iter()
            .find(|w| w.asset_id == asset_id)
            .map(|w| w.weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstituentWeight> {
        self.weights.iter()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> Weight {
        self.weights.iter().map(|w| w.weight).sum()
    }

    /// Herfindahl-Hirschman index on percentage weights: sum((w * 100)^2).
    pub fn hhi(&self) -> Decimal {
        self.weights
            .iter()
            .map(|w| {
                let pct = w.weight * dec!(100);
                pct * pct
            })
            .sum()
    }

    /// Effective number of constituents = 10000 / HHI.
    pub fn effective_n(&self) -> Decimal {
        let hhi = self.hhi();
        if hhi.is_zero() {
            Decimal::ZERO
        } else {
            dec!(10000) / hhi
        }
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Assign weights to the snapshot's constituents.
///
/// `series` holds the period's price series keyed by asset; only the
/// capitalization scheme reads it (market cap at `period_start`).
pub fn calculate_weights(
    scheme: WeightingScheme,
    snapshot: &ConstituentSnapshot,
    series: &BTreeMap<AssetId, PriceSeries>,
    period_start: Timestamp,
) -> IndexResult<WeightSet> {
    if snapshot.is_empty() {
        return Err(IndexError::Configuration(
            "At least one constituent is required".into(),
        ));
    }

    match scheme {
        WeightingScheme::Equal => Ok(equal_weights(snapshot)),
        WeightingScheme::Capitalization => {
            capitalization_weights(snapshot, series, period_start)
        }
    }
}

fn equal_weights(snapshot: &ConstituentSnapshot) -> WeightSet {
    let w = Decimal::ONE / Decimal::from(snapshot.len() as u64);
    WeightSet {
        weights: snapshot
            .constituents
            .iter()
            .map(|c| ConstituentWeight {
                asset_id: c.asset_id.clone(),
                weight: w,
            })
            .collect(),
        excluded: Vec::new(),
        warnings: Vec::new(),
    }
}

fn capitalization_weights(
    snapshot: &ConstituentSnapshot,
    series: &BTreeMap<AssetId, PriceSeries>,
    period_start: Timestamp,
) -> IndexResult<WeightSet> {
    let mut caps: Vec<(&Constituent, Money)> = Vec::with_capacity(snapshot.len());
    let mut excluded = Vec::new();
    let mut warnings = Vec::new();

    for c in &snapshot.constituents {
        match capitalization_of(c, series.get(&c.asset_id), period_start) {
            Ok(mc) => caps.push((c, mc)),
            Err(e) => {
                tracing::warn!(asset = %c.asset_id, "excluded from weighting: {e}");
                warnings.push(format!("{}: excluded from weighting ({e})", c.asset_id));
                excluded.push(c.asset_id.clone());
            }
        }
    }

    let total: Money = caps.iter().map(|(_, mc)| *mc).sum();
    if caps.is_empty() || total.is_zero() {
        return Err(IndexError::Configuration(
            "No constituent has a usable market cap at period start".into(),
        ));
    }

    Ok(WeightSet {
        weights: caps
            .into_iter()
            .map(|(c, mc)| ConstituentWeight {
                asset_id: c.asset_id.clone(),
                weight: mc / total,
            })
            .collect(),
        excluded,
        warnings,
    })
}

/// Market cap at the period start, falling back to the snapshot's weight hint.
fn capitalization_of(
    constituent: &Constituent,
    series: Option<&PriceSeries>,
    period_start: Timestamp,
) -> IndexResult<Money> {
    let observed = series.and_then(|s| s.market_cap_at(period_start));
    let mc = observed.or(constituent.weight_hint).ok_or_else(|| {
        IndexError::data(
            &constituent.asset_id,
            format!("no market cap at period start {period_start}"),
        )
    })?;
    if mc <= Decimal::ZERO {
        return Err(IndexError::data(
            &constituent.asset_id,
            format!("non-positive market cap {mc} at period start"),
        ));
    }
    Ok(mc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricePoint;
    use rust_decimal_macros::dec;

    const T0: Timestamp = 1_609_632_000;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn series_with_cap(mc: Option<Decimal>) -> PriceSeries {
        PriceSeries::new(vec![PricePoint {
            timestamp: T0,
            price: dec!(10),
            market_cap: mc,
        }])
    }

    fn make_3_asset_universe() -> (ConstituentSnapshot, BTreeMap<AssetId, PriceSeries>) {
        let snapshot = ConstituentSnapshot::from_ids(["bitcoin", "ethereum", "uniswap"]);
        let mut series = BTreeMap::new();
        series.insert("bitcoin".to_string(), series_with_cap(Some(dec!(3000))));
        series.insert("ethereum".to_string(), series_with_cap(Some(dec!(2000))));
        series.insert("uniswap".to_string(), series_with_cap(Some(dec!(1000))));
        (snapshot, series)
    }

    // --- Equal weighting ---
    #[test]
    fn test_equal_weight() {
        let (snapshot, series) = make_3_asset_universe();
        let out = calculate_weights(WeightingScheme::Equal, &snapshot, &series, T0).unwrap();
        let expected = Decimal::ONE / dec!(3);
        assert_eq!(out.len(), 3);
        for w in out.iter() {
            assert_eq!(w.weight, expected);
        }
    }

    #[test]
    fn test_equal_weight_ignores_missing_series() {
        let snapshot = ConstituentSnapshot::from_ids(["a", "b"]);
        let out =
            calculate_weights(WeightingScheme::Equal, &snapshot, &BTreeMap::new(), T0).unwrap();
        assert_eq!(out.get("a"), Some(dec!(0.5)));
        assert!(out.excluded.is_empty());
    }

    #[test]
    fn test_equal_weight_sum_to_one() {
        let (snapshot, series) = make_3_asset_universe();
        let out = calculate_weights(WeightingScheme::Equal, &snapshot, &series, T0).unwrap();
        assert!(approx_eq(out.total(), Decimal::ONE, dec!(0.000000001)));
    }

    // --- Capitalization weighting ---
    #[test]
    fn test_cap_weight_3_assets() {
        let (snapshot, series) = make_3_asset_universe();
        let out =
            calculate_weights(WeightingScheme::Capitalization, &snapshot, &series, T0).unwrap();
        assert_eq!(out.get("bitcoin"), Some(dec!(0.5)));
        assert!(approx_eq(
            out.get("ethereum").unwrap(),
            dec!(0.3333333333),
            dec!(0.000000001)
        ));
        assert!(approx_eq(out.total(), Decimal::ONE, dec!(0.000000001)));
    }

    #[test]
    fn test_cap_weight_excludes_missing_market_cap() {
        let (snapshot, mut series) = make_3_asset_universe();
        series.insert("uniswap".to_string(), series_with_cap(None));
        let out =
            calculate_weights(WeightingScheme::Capitalization, &snapshot, &series, T0).unwrap();
        assert_eq!(out.excluded, vec!["uniswap".to_string()]);
        assert_eq!(out.get("uniswap"), None);
        assert_eq!(out.get("bitcoin"), Some(dec!(0.6)));
        assert!(approx_eq(out.total(), Decimal::ONE, dec!(0.000000001)));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_cap_weight_falls_back_to_hint() {
        let snapshot = ConstituentSnapshot::new(vec![
            Constituent::with_hint("a", dec!(300)),
            Constituent::with_hint("b", dec!(100)),
        ]);
        let out = calculate_weights(
            WeightingScheme::Capitalization,
            &snapshot,
            &BTreeMap::new(),
            T0,
        )
        .unwrap();
        assert_eq!(out.get("a"), Some(dec!(0.75)));
        assert_eq!(out.get("b"), Some(dec!(0.25)));
    }

    #[test]
    fn test_cap_weight_prefers_observed_market_cap() {
        let snapshot = ConstituentSnapshot::new(vec![
            Constituent::with_hint("a", dec!(1)),
            Constituent::with_hint("b", dec!(1)),
        ]);
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), series_with_cap(Some(dec!(900))));
        series.insert("b".to_string(), series_with_cap(Some(dec!(100))));
        let out =
            calculate_weights(WeightingScheme::Capitalization, &snapshot, &series, T0).unwrap();
        assert_eq!(out.get("a"), Some(dec!(0.9)));
    }

    #[test]
    fn test_cap_weight_all_missing_is_configuration_error() {
        let snapshot = ConstituentSnapshot::from_ids(["a"]);
        let err = calculate_weights(
            WeightingScheme::Capitalization,
            &snapshot,
            &BTreeMap::new(),
            T0,
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    // --- Concentration ---
    #[test]
    fn test_hhi_equal_weight() {
        let (snapshot, series) = make_3_asset_universe();
        let out = calculate_weights(WeightingScheme::Equal, &snapshot, &series, T0).unwrap();
        assert!(approx_eq(out.hhi(), dec!(3333.33), dec!(1.0)));
        assert!(approx_eq(out.effective_n(), dec!(3.0), dec!(0.1)));
    }

    // --- Validation ---
    #[test]
    fn test_reject_empty_snapshot() {
        let snapshot = ConstituentSnapshot::default();
        let err =
            calculate_weights(WeightingScheme::Equal, &snapshot, &BTreeMap::new(), T0).unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("equal".parse::<WeightingScheme>().unwrap(), WeightingScheme::Equal);
        assert_eq!(
            "market_cap".parse::<WeightingScheme>().unwrap(),
            WeightingScheme::Capitalization
        );
        assert!("fundamental".parse::<WeightingScheme>().is_err());
    }

    #[test]
    fn test_scheme_serde_alias() {
        let s: WeightingScheme = serde_json::from_str("\"market_cap\"").unwrap();
        assert_eq!(s, WeightingScheme::Capitalization);
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"capitalization\"");
    }
}
