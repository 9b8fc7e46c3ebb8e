// Quote resolution - one rate for one fully specified selection
// Validate, look up the exact commercial key, pick family and tier

use crate::db::{KeyFilter, PricebookReader};
use crate::error::{PricebookError, PricebookResult};
use crate::model::{CommercialKey, EngagementType, Tier};
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// Selection as submitted by a client. Every field is optional on the wire so
/// that missing values surface as validation errors, not decode errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteRequest {
    pub region: Option<String>,
    pub country: Option<String>,
    pub supplier: Option<String>,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub service_level: Option<String>,
    pub engagement_type: Option<String>,
    pub with_backfill: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBreakdown {
    pub region: String,
    pub country: String,
    pub supplier: String,
    pub payment_terms: String,
    pub service_level: Tier,
    pub engagement_type: String,
    pub with_backfill: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Currency of the matched record
    pub currency: String,
    pub amount: f64,
    pub breakdown: QuoteBreakdown,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl QuoteRequest {
    /// The five commercial fields, or None if any is missing or empty
    pub fn commercial_key(&self) -> Option<CommercialKey> {
        Some(CommercialKey {
            region: required(&self.region)?.to_string(),
            country: required(&self.country)?.to_string(),
            supplier: required(&self.supplier)?.to_string(),
            currency: required(&self.currency)?.to_string(),
            payment_terms: required(&self.payment_terms)?.to_string(),
        })
    }
}

/// Request after the precondition checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuote {
    pub key: CommercialKey,
    pub tier: Tier,
    pub engagement: EngagementType,
    pub with_backfill: bool,
}

/// Precondition checks, in order: commercial fields, tier, engagement type
pub fn validate_request(request: &QuoteRequest) -> PricebookResult<ValidatedQuote> {
    let key = request.commercial_key().ok_or_else(|| {
        PricebookError::Validation("Missing required commercial fields.".to_string())
    })?;
    let tier: Tier = request.service_level.as_deref().unwrap_or_default().parse()?;
    let engagement: EngagementType = request
        .engagement_type
        .as_deref()
        .unwrap_or_default()
        .parse()?;

    Ok(ValidatedQuote {
        key,
        tier,
        engagement,
        with_backfill: request.with_backfill.unwrap_or(false),
    })
}

fn rate_not_found_message(tier: Tier, engagement: EngagementType, with_backfill: bool) -> String {
    let backfill = match engagement {
        EngagementType::Yearly if with_backfill => " with backfill",
        EngagementType::Yearly => " without backfill",
        _ => "",
    };
    format!("Rate not found for {} ({}{}).", tier, engagement, backfill)
}

/// Resolve the stored rate for a selection. Read-only, no caching.
pub fn get_quote<R: PricebookReader + ?Sized>(
    reader: &R,
    request: &QuoteRequest,
) -> PricebookResult<Quote> {
    let selection = validate_request(request)?;
    resolve_quote(reader, &selection)
}

/// Lookup half of [`get_quote`] for a selection that already passed validation
pub fn resolve_quote<R: PricebookReader + ?Sized>(
    reader: &R,
    selection: &ValidatedQuote,
) -> PricebookResult<Quote> {
    let entry = reader
        .find_one(&KeyFilter::from(&selection.key))?
        .ok_or_else(|| {
            PricebookError::NotFound(
                "No matching pricebook entry found for the given selection.".to_string(),
            )
        })?;

    let family = selection.engagement.rate_family(selection.with_backfill);
    let amount = entry.record.family(family).get(selection.tier);
    // Also rejects NaN
    if !(amount > 0.0) {
        return Err(PricebookError::NotFound(rate_not_found_message(
            selection.tier,
            selection.engagement,
            selection.with_backfill,
        )));
    }

    tracing::debug!(
        country = %entry.record.country,
        tier = %selection.tier,
        family = family.name(),
        amount,
        "quote resolved"
    );

    let record = entry.record;
    Ok(Quote {
        currency: record.currency,
        amount,
        breakdown: QuoteBreakdown {
            region: record.region,
            country: record.country,
            supplier: record.supplier,
            payment_terms: record.payment_terms,
            service_level: selection.tier,
            engagement_type: selection.engagement.value().to_string(),
            with_backfill: selection.with_backfill,
        },
    })
}
