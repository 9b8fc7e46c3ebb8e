use crate::db::{KeyField, KeyFilter, PricebookReader};
use crate::error::PricebookResult;
use crate::model::{EngagementType, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementTypeOption {
    pub value: String,
    pub label: String,
}

impl From<EngagementType> for EngagementTypeOption {
    fn from(kind: EngagementType) -> Self {
        Self {
            value: kind.value().to_string(),
            label: kind.label().to_string(),
        }
    }
}

/// Menu of valid selections for a quote form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricebookOptions {
    pub regions: Vec<String>,
    /// Region-scoped only; not cross-filtered by supplier, currency or terms
    pub countries_by_region: BTreeMap<String, Vec<String>>,
    pub suppliers: Vec<String>,
    pub currencies: Vec<String>,
    pub payment_terms: Vec<String>,
    pub service_levels: Vec<Tier>,
    pub engagement_types: Vec<EngagementTypeOption>,
}

/// Collect distinct dropdown values from the store. Any store failure fails
/// the whole call.
pub fn get_options<R: PricebookReader + ?Sized>(reader: &R) -> PricebookResult<PricebookOptions> {
    let regions = reader.distinct(KeyField::Region, None)?;

    let mut countries_by_region = BTreeMap::new();
    for region in &regions {
        let countries = reader.distinct(KeyField::Country, Some(&KeyFilter::region(region)))?;
        countries_by_region.insert(region.clone(), countries);
    }

    let options = PricebookOptions {
        suppliers: reader.distinct(KeyField::Supplier, None)?,
        currencies: reader.distinct(KeyField::Currency, None)?,
        payment_terms: reader.distinct(KeyField::PaymentTerms, None)?,
        regions,
        countries_by_region,
        service_levels: Tier::ALL.to_vec(),
        engagement_types: EngagementType::ALL.into_iter().map(Into::into).collect(),
    };

    tracing::debug!(regions = options.regions.len(), "pricebook options resolved");
    Ok(options)
}
