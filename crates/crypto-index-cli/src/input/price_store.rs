//! Directory-backed price store.
//!
//! Layout under `<index_folder>/data`:
//! 1. **index_snapshots/<label>.csv** -- one row per constituent, IDs in `id_column`
//! 2. **prices/<label>/<asset>.csv** -- `timestamp,price,market_cap`
//!
//! Periods are the sub-folders of `prices`, spanning the first and last
//! timestamp of their first non-empty price file.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crypto_index_core::{
    Constituent, ConstituentSnapshot, IndexError, IndexResult, PricePoint, PriceSeries,
    PriceStore, RebalancingPeriod, Timestamp,
};

use crate::config::{IndexConfig, TimestampUnit};

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Outcome of inspecting one price folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Valid,
    NoPriceFiles,
    /// A non-empty price file disagrees with the period span.
    SpanMismatch {
        file: String,
        start_ts: Timestamp,
        end_ts: Timestamp,
    },
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodDiscovery {
    pub label: String,
    pub start_ts: Option<Timestamp>,
    pub end_ts: Option<Timestamp>,
    pub price_files: usize,
    pub empty_files: usize,
    #[serde(flatten)]
    pub status: DiscoveryStatus,
}

impl PeriodDiscovery {
    pub fn period(&self) -> Option<RebalancingPeriod> {
        match (self.status == DiscoveryStatus::Valid, self.start_ts, self.end_ts) {
            (true, Some(start), Some(end)) => {
                Some(RebalancingPeriod::new(self.label.clone(), start, end))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// `PriceStore` over the CSV tree an index folder holds.
#[derive(Debug, Clone)]
pub struct CsvPriceStore {
    config: IndexConfig,
}

impl CsvPriceStore {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Inspect every folder under `data/prices`, in name order.
    pub fn discover_periods(&self) -> IndexResult<Vec<PeriodDiscovery>> {
        let prices_dir = self.config.prices_dir();
        let entries = fs::read_dir(&prices_dir).map_err(|e| {
            IndexError::NotFound(format!("price folder {}: {e}", prices_dir.display()))
        })?;

        let mut folders: Vec<(String, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .collect();
        folders.sort();

        Ok(folders
            .into_iter()
            .map(|(label, path)| self.inspect_folder(label, &path))
            .collect())
    }

    fn inspect_folder(&self, label: String, path: &Path) -> PeriodDiscovery {
        let mut discovery = PeriodDiscovery {
            label,
            start_ts: None,
            end_ts: None,
            price_files: 0,
            empty_files: 0,
            status: DiscoveryStatus::NoPriceFiles,
        };

        let files = match csv_files(path) {
            Ok(files) => files,
            Err(e) => {
                discovery.status = DiscoveryStatus::Unreadable { reason: e.to_string() };
                return discovery;
            }
        };
        discovery.price_files = files.len();

        for file in &files {
            let series = match self.read_series(file) {
                Ok(s) => s,
                Err(e) => {
                    discovery.status = DiscoveryStatus::Unreadable { reason: e.to_string() };
                    return discovery;
                }
            };
            let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp())
            else {
                discovery.empty_files += 1;
                continue;
            };
            match (discovery.start_ts, discovery.end_ts) {
                (None, _) | (_, None) => {
                    discovery.start_ts = Some(first);
                    discovery.end_ts = Some(last);
                    discovery.status = DiscoveryStatus::Valid;
                }
                (Some(start), Some(end)) if start != first || end != last => {
                    discovery.status = DiscoveryStatus::SpanMismatch {
                        file: file_stem(file),
                        start_ts: first,
                        end_ts: last,
                    };
                    return discovery;
                }
                _ => {}
            }
        }

        if discovery.status == DiscoveryStatus::Valid && discovery.start_ts >= discovery.end_ts {
            discovery.status = DiscoveryStatus::Unreadable {
                reason: "price files span a single timestamp".into(),
            };
        }
        discovery
    }

    fn read_series(&self, path: &Path) -> IndexResult<PriceSeries> {
        read_price_csv(path, self.config.timestamp_unit)
    }
}

impl PriceStore for CsvPriceStore {
    fn list_periods(&self) -> IndexResult<Vec<RebalancingPeriod>> {
        if let Some(periods) = &self.config.periods {
            let mut periods = periods.clone();
            periods.sort_by_key(|p| p.start_ts);
            return Ok(periods);
        }

        let mut periods = Vec::new();
        for d in self.discover_periods()? {
            match d.period() {
                Some(p) => periods.push(p),
                None => tracing::warn!(period = %d.label, status = ?d.status, "period rejected"),
            }
        }
        periods.sort_by_key(|p| p.start_ts);
        Ok(periods)
    }

    fn get_snapshot(&self, period_label: &str) -> IndexResult<ConstituentSnapshot> {
        let path = self
            .config
            .snapshots_dir()
            .join(format!("{period_label}.csv"));
        if !path.is_file() {
            return Err(IndexError::NotFound(format!("snapshot {}", path.display())));
        }
        let snapshot = read_snapshot_csv(
            &path,
            &self.config.id_column,
            self.config.weight_column.as_deref(),
        )?;

        Ok(match self.config.max_constituents {
            Some(max) if snapshot.len() > max => {
                tracing::debug!(period = period_label, max, "truncating snapshot");
                ConstituentSnapshot::new(snapshot.constituents.into_iter().take(max).collect())
            }
            _ => snapshot,
        })
    }

    fn get_price_series(&self, period_label: &str, asset_id: &str) -> IndexResult<PriceSeries> {
        let path = self
            .config
            .prices_dir()
            .join(period_label)
            .join(format!("{asset_id}.csv"));
        if !path.is_file() {
            return Err(IndexError::NotFound(format!("prices {}", path.display())));
        }
        self.read_series(&path)
    }
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// Read a `timestamp,price,market_cap` file. A file without data rows is an
/// empty series.
pub fn read_price_csv(path: &Path, unit: TimestampUnit) -> IndexResult<PriceSeries> {
    let context = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IndexError::data(&context, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| IndexError::data(&context, e.to_string()))?
        .clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Ok(PriceSeries::default());
    }
    let ts_col = column(&headers, "timestamp", &context)?;
    let price_col = column(&headers, "price", &context)?;
    let mcap_col = headers.iter().position(|h| h == "market_cap");

    let mut points = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| IndexError::data(&context, e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let row_context = || format!("{context} row {}", row + 1);

        let raw_ts = parse_timestamp(field(ts_col)).ok_or_else(|| {
            IndexError::data(row_context(), format!("bad timestamp '{}'", field(ts_col)))
        })?;
        let price = parse_decimal(field(price_col)).ok_or_else(|| {
            IndexError::data(row_context(), format!("bad price '{}'", field(price_col)))
        })?;
        let market_cap = mcap_col.and_then(|idx| parse_decimal(field(idx)));

        points.push(PricePoint {
            timestamp: unit.to_seconds(raw_ts),
            price,
            market_cap,
        });
    }
    Ok(PriceSeries::new(points))
}

/// Read a constituent snapshot, skipping blank and `empty` IDs.
pub fn read_snapshot_csv(
    path: &Path,
    id_column: &str,
    weight_column: Option<&str>,
) -> IndexResult<ConstituentSnapshot> {
    let context = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IndexError::data(&context, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| IndexError::data(&context, e.to_string()))?
        .clone();
    let id_col = column(&headers, id_column, &context)?;
    let weight_col = weight_column
        .map(|name| column(&headers, name, &context))
        .transpose()?;

    let mut constituents = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IndexError::data(&context, e.to_string()))?;
        let id = record.get(id_col).unwrap_or("");
        if id.is_empty() || id.eq_ignore_ascii_case("empty") {
            continue;
        }
        let hint = weight_col.and_then(|idx| {
            let raw = record.get(idx).unwrap_or("");
            let parsed = parse_decimal(raw);
            if parsed.is_none() {
                tracing::warn!(asset = id, value = raw, "unreadable weight hint");
            }
            parsed
        });
        constituents.push(Constituent {
            asset_id: id.to_string(),
            weight_hint: hint,
        });
    }
    Ok(ConstituentSnapshot::new(constituents))
}

/// Plain or scientific notation, thousands separators ignored.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '$').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| parse_decimal(raw).and_then(|d| d.trunc().to_i64()))
}

fn column(headers: &csv::StringRecord, name: &str, context: &str) -> IndexResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| IndexError::data(context, format!("missing column '{name}'")))
}

fn csv_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
