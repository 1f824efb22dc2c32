use clap::Args;
use serde::Serialize;
use serde_json::Value;

use crypto_index_core::{timestamp_to_date, PriceStore};

use super::StoreArgs;
use crate::input::price_store::{CsvPriceStore, DiscoveryStatus, PeriodDiscovery};

/// Arguments for period listing
#[derive(Args)]
pub struct PeriodsArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Serialize)]
pub struct PeriodListing {
    #[serde(flatten)]
    pub discovery: PeriodDiscovery,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub snapshot_found: bool,
}

pub fn run_periods(args: PeriodsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.store.load()?;
    let store = CsvPriceStore::new(config);
    Ok(serde_json::to_value(list_periods(&store)?)?)
}

/// Discovered (or configured) periods with their snapshot availability.
pub fn list_periods(
    store: &CsvPriceStore,
) -> Result<Vec<PeriodListing>, Box<dyn std::error::Error>> {
    let discoveries = match &store.config().periods {
        Some(_) => store
            .list_periods()?
            .into_iter()
            .map(|p| PeriodDiscovery {
                label: p.label,
                start_ts: Some(p.start_ts),
                end_ts: Some(p.end_ts),
                price_files: 0,
                empty_files: 0,
                status: DiscoveryStatus::Valid,
            })
            .collect(),
        None => store.discover_periods()?,
    };

    let date = |ts: Option<i64>| ts.and_then(timestamp_to_date).map(|d| d.to_string());
    Ok(discoveries
        .into_iter()
        .map(|d| PeriodListing {
            start_date: date(d.start_ts),
            end_date: date(d.end_ts),
            snapshot_found: store.get_snapshot(&d.label).is_ok(),
            discovery: d,
        })
        .collect())
}
