// Bulk-load sources for the pricebook
// JSON arrays in wire shape, flat CSV sheets, and the bundled seed

use crate::error::PricebookError;
use crate::model::{RateRecord, TierRates, DEFAULT_PAYMENT_TERMS, DEFAULT_SUPPLIER};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Indicative rates shipped with the binary
pub const DEFAULT_SEED: &str = include_str!("../seed/pricebook.json");

pub fn default_seed() -> Result<Vec<RateRecord>> {
    parse_json(DEFAULT_SEED).context("Bundled seed is not valid pricebook JSON")
}

pub fn parse_json(raw: &str) -> Result<Vec<RateRecord>> {
    let records: Vec<RateRecord> = serde_json::from_str(raw)?;
    Ok(records)
}

pub fn load_json(path: &Path) -> Result<Vec<RateRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_json(&raw).with_context(|| format!("Failed to parse pricebook JSON {}", path.display()))
}

// ============================================================================
// CSV
// ============================================================================

/// One flat spreadsheet row: key columns, then <family>_l1..l5 for each family
#[derive(Debug, Deserialize)]
struct PricebookRow {
    region: String,
    country: String,
    #[serde(default)]
    supplier: Option<String>,
    currency: String,
    #[serde(default)]
    payment_terms: Option<String>,

    yearly_with_backfill_l1: Option<f64>,
    yearly_with_backfill_l2: Option<f64>,
    yearly_with_backfill_l3: Option<f64>,
    yearly_with_backfill_l4: Option<f64>,
    yearly_with_backfill_l5: Option<f64>,

    yearly_without_backfill_l1: Option<f64>,
    yearly_without_backfill_l2: Option<f64>,
    yearly_without_backfill_l3: Option<f64>,
    yearly_without_backfill_l4: Option<f64>,
    yearly_without_backfill_l5: Option<f64>,

    monthly_short_term_l1: Option<f64>,
    monthly_short_term_l2: Option<f64>,
    monthly_short_term_l3: Option<f64>,
    monthly_short_term_l4: Option<f64>,
    monthly_short_term_l5: Option<f64>,

    monthly_long_term_l1: Option<f64>,
    monthly_long_term_l2: Option<f64>,
    monthly_long_term_l3: Option<f64>,
    monthly_long_term_l4: Option<f64>,
    monthly_long_term_l5: Option<f64>,
}

fn tier_rates(l1: Option<f64>, l2: Option<f64>, l3: Option<f64>, l4: Option<f64>, l5: Option<f64>) -> TierRates {
    TierRates::new(
        l1.unwrap_or_default(),
        l2.unwrap_or_default(),
        l3.unwrap_or_default(),
        l4.unwrap_or_default(),
        l5.unwrap_or_default(),
    )
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

impl From<PricebookRow> for RateRecord {
    fn from(row: PricebookRow) -> Self {
        Self {
            region: row.region,
            country: row.country,
            supplier: or_default(row.supplier, DEFAULT_SUPPLIER),
            currency: row.currency,
            payment_terms: or_default(row.payment_terms, DEFAULT_PAYMENT_TERMS),
            yearly_with_backfill: tier_rates(
                row.yearly_with_backfill_l1,
                row.yearly_with_backfill_l2,
                row.yearly_with_backfill_l3,
                row.yearly_with_backfill_l4,
                row.yearly_with_backfill_l5,
            ),
            yearly_without_backfill: tier_rates(
                row.yearly_without_backfill_l1,
                row.yearly_without_backfill_l2,
                row.yearly_without_backfill_l3,
                row.yearly_without_backfill_l4,
                row.yearly_without_backfill_l5,
            ),
            monthly_short_term: tier_rates(
                row.monthly_short_term_l1,
                row.monthly_short_term_l2,
                row.monthly_short_term_l3,
                row.monthly_short_term_l4,
                row.monthly_short_term_l5,
            ),
            monthly_long_term: tier_rates(
                row.monthly_long_term_l1,
                row.monthly_long_term_l2,
                row.monthly_long_term_l3,
                row.monthly_long_term_l4,
                row.monthly_long_term_l5,
            ),
        }
    }
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<RateRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut records = Vec::new();
    for (line, result) in rdr.deserialize::<PricebookRow>().enumerate() {
        // +2: header row and 1-based numbering
        let row = result.with_context(|| format!("Failed to parse CSV row {}", line + 2))?;
        records.push(RateRecord::from(row));
    }

    Ok(records)
}

/// Load by file extension: `.json` or `.csv`.
/// Any other extension fails with [`PricebookError::Validation`].
pub fn load_records(path: &Path) -> Result<Vec<RateRecord>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_json(path),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => load_csv(path),
        _ => Err(PricebookError::Validation(format!(
            "Unsupported pricebook file {} (expected .json or .csv)",
            path.display()
        ))
        .into()),
    }
}
