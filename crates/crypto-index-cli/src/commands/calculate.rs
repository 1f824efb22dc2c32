use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;

use crypto_index_core::index_construction::chaining::{run_warnings, PeriodStatus};
use crypto_index_core::{
    timestamp_to_date, with_metadata, EngineConfig, IndexCalculationInput, IndexEngine, IndexRun,
    InMemoryStore, Money, Timestamp, WeightingScheme,
};

use super::StoreArgs;
use crate::input;
use crate::input::price_store::CsvPriceStore;

/// Arguments for index calculation
#[derive(Args)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// JSON period data instead of the CSV tree ("-" reads stdin)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Weighting scheme: equal or capitalization
    #[arg(long)]
    pub weighting: Option<WeightingScheme>,

    /// Level the index opens at
    #[arg(long)]
    pub base_value: Option<Decimal>,

    /// History CSV destination
    #[arg(long)]
    pub history_out: Option<PathBuf>,

    /// Print the whole run (history and period reports) instead of a summary
    #[arg(long)]
    pub full: bool,
}

#[derive(Serialize)]
struct CalculationAssumptions {
    source: String,
    weighting: WeightingScheme,
    base_value: Money,
    day_length_seconds: Timestamp,
}

/// Condensed view of one period report.
#[derive(Debug, Serialize)]
pub struct PeriodRow {
    pub label: String,
    pub start: String,
    pub end: String,
    pub status: String,
    pub anchor_in: Money,
    pub anchor_out: Money,
    pub divisor: Option<Decimal>,
    pub points: usize,
    pub gaps: usize,
    pub skipped_assets: usize,
}

#[derive(Debug, Serialize)]
pub struct CalculationSummary {
    pub history_path: Option<String>,
    pub points: usize,
    pub first_value: Option<Money>,
    pub last_value: Option<Money>,
    pub final_anchor: Money,
    pub periods_completed: usize,
    pub periods_failed: usize,
    pub cancelled: bool,
    pub periods: Vec<PeriodRow>,
}

pub fn run_calculate(args: CalculateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();

    let (run, source, history_path) = match &args.input {
        Some(path) => {
            let mut calc_input: IndexCalculationInput = if path.as_os_str() == "-" {
                input::stdin::read_stdin()?
                    .ok_or("--input - expects period data piped on stdin")?
            } else {
                input::file::read_json(path)?
            };
            if let Some(w) = args.weighting {
                calc_input.weighting = w;
            }
            if let Some(b) = args.base_value {
                calc_input.base_value = b;
            }
            let engine = IndexEngine::new(EngineConfig {
                weighting: calc_input.weighting,
                base_value: calc_input.base_value,
            })?;
            let store = InMemoryStore {
                periods: calc_input.periods,
            };
            (engine.run(&store)?, format!("json:{}", path.display()), args.history_out.clone())
        }
        None => {
            let mut config = args.store.load()?;
            if let Some(w) = args.weighting {
                config.weighting = w;
            }
            if let Some(b) = args.base_value {
                config.base_value = b;
            }
            if let Some(out) = &args.history_out {
                config.output = Some(out.clone());
            }
            config.validate()?;

            let engine = IndexEngine::new(EngineConfig {
                weighting: config.weighting,
                base_value: config.base_value,
            })?;
            let source = format!("csv:{}", config.index_folder.display());
            let history_path = Some(config.output_path());
            let store = CsvPriceStore::new(config);
            (engine.run(&store)?, source, history_path)
        }
    };

    if let Some(path) = &history_path {
        input::history::write_history(path, &run.history)?;
    }

    let assumptions = CalculationAssumptions {
        source,
        weighting: run.weighting,
        base_value: run.base_value,
        day_length_seconds: crypto_index_core::SECONDS_PER_DAY,
    };
    let warnings = run_warnings(&run);
    let elapsed = start.elapsed().as_micros() as u64;

    if args.full {
        let output = with_metadata("Chain-linked divisor index", &assumptions, warnings, elapsed, run);
        return Ok(serde_json::to_value(output)?);
    }

    let summary = summarize(&run, history_path.map(|p| p.display().to_string()));
    let output = with_metadata(
        "Chain-linked divisor index",
        &assumptions,
        warnings,
        elapsed,
        summary,
    );
    Ok(serde_json::to_value(output)?)
}

pub fn summarize(run: &IndexRun, history_path: Option<String>) -> CalculationSummary {
    let date = |ts: Timestamp| {
        timestamp_to_date(ts)
            .map(|d| d.to_string())
            .unwrap_or_else(|| ts.to_string())
    };

    let periods = run
        .periods
        .iter()
        .map(|p| PeriodRow {
            label: p.label.clone(),
            start: date(p.start_ts),
            end: date(p.end_ts),
            status: match &p.status {
                PeriodStatus::Completed => "completed".to_string(),
                PeriodStatus::Failed { stage, .. } => format!("failed ({stage:?})"),
            },
            anchor_in: p.anchor_in,
            anchor_out: p.anchor_out,
            divisor: p.divisor,
            points: p.points_emitted,
            gaps: p.gaps.len(),
            skipped_assets: p.skipped_assets.len(),
        })
        .collect();

    CalculationSummary {
        history_path,
        points: run.history.len(),
        first_value: run.first_value().map(|v| v.index_value),
        last_value: run.last_value().map(|v| v.index_value),
        final_anchor: run.final_anchor,
        periods_completed: run.periods_completed(),
        periods_failed: run.periods_failed(),
        cancelled: run.cancelled,
        periods,
    }
}
