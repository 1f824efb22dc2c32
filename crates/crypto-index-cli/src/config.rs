use crypto_index_core::{RebalancingPeriod, Timestamp, WeightingScheme};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Unit of the timestamps stored in price files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    Seconds,
    Milliseconds,
    /// Values of at least 10^11 are read as milliseconds.
    #[default]
    Auto,
}

impl TimestampUnit {
    /// Convert a raw file timestamp to seconds.
    pub fn to_seconds(self, raw: i64) -> Timestamp {
        match self {
            TimestampUnit::Seconds => raw,
            TimestampUnit::Milliseconds => raw.div_euclid(1000),
            TimestampUnit::Auto if raw.abs() >= 100_000_000_000 => raw.div_euclid(1000),
            TimestampUnit::Auto => raw,
        }
    }
}

fn default_index_folder() -> PathBuf {
    PathBuf::from(".")
}

fn default_base_value() -> Decimal {
    dec!(100)
}

fn default_id_column() -> String {
    "Coingecko ID".to_string()
}

/// Settings for one index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Root holding `data/index_snapshots` and `data/prices`.
    #[serde(default = "default_index_folder")]
    pub index_folder: PathBuf,
    #[serde(default)]
    pub weighting: WeightingScheme,
    #[serde(default = "default_base_value")]
    pub base_value: Decimal,
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
    /// Snapshot column holding asset IDs.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Snapshot column read as each constituent's weight hint (e.g. "Market Cap").
    #[serde(default)]
    pub weight_column: Option<String>,
    /// Keep only the first N constituents of each snapshot.
    #[serde(default)]
    pub max_constituents: Option<usize>,
    /// Explicit periods; discovered from the price folders when absent.
    #[serde(default)]
    pub periods: Option<Vec<RebalancingPeriod>>,
    /// History CSV destination, `<index_folder>/data/index_history.csv` by default.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_folder: default_index_folder(),
            weighting: WeightingScheme::default(),
            base_value: default_base_value(),
            timestamp_unit: TimestampUnit::default(),
            id_column: default_id_column(),
            weight_column: None,
            max_constituents: None,
            periods: None,
            output: None,
        }
    }
}

impl IndexConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.index_folder.join("data")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir().join("index_snapshots")
    }

    pub fn prices_dir(&self) -> PathBuf {
        self.data_dir().join("prices")
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.data_dir().join("index_history.csv"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_value <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "base_value must be positive, got {}",
                self.base_value
            )));
        }
        if self.max_constituents == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_constituents must be at least 1".into(),
            ));
        }
        if self.id_column.trim().is_empty() {
            return Err(ConfigError::ValidationError("id_column must not be empty".into()));
        }
        if let Some(periods) = &self.periods {
            for p in periods {
                if p.start_ts >= p.end_ts {
                    return Err(ConfigError::ValidationError(format!(
                        "period {} starts at {} but ends at {}",
                        p.label, p.start_ts, p.end_ts
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Load the configuration from `path` (or an optional `config.toml` in the
/// working directory) layered under `CIX_*` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<IndexConfig, ConfigError> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name("config").required(false),
    };
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix("CIX").try_parsing(true))
        .build()?;

    let config = settings.try_deserialize::<IndexConfig>()?;
    config.validate()?;
    Ok(config)
}
