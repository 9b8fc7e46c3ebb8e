// Pricebook Model - Rate records, tiers and engagement types
// Fixed-shape rate tables: four families x five tiers, no dynamic keys

use crate::error::PricebookError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SUPPLIER: &str = "Direct";
pub const DEFAULT_PAYMENT_TERMS: &str = "60 Days";

// ============================================================================
// TIERS
// ============================================================================

/// Service level, L1 (simplest) through L5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::L1, Tier::L2, Tier::L3, Tier::L4, Tier::L5];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::L1 => "L1",
            Tier::L2 => "L2",
            Tier::L3 => "L3",
            Tier::L4 => "L4",
            Tier::L5 => "L5",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = PricebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| PricebookError::Validation("Invalid service level.".to_string()))
    }
}

/// One rate per tier. Absent tiers deserialize as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TierRates {
    #[serde(rename = "L1", default)]
    pub l1: f64,
    #[serde(rename = "L2", default)]
    pub l2: f64,
    #[serde(rename = "L3", default)]
    pub l3: f64,
    #[serde(rename = "L4", default)]
    pub l4: f64,
    #[serde(rename = "L5", default)]
    pub l5: f64,
}

impl TierRates {
    pub fn new(l1: f64, l2: f64, l3: f64, l4: f64, l5: f64) -> Self {
        Self { l1, l2, l3, l4, l5 }
    }

    pub fn get(&self, tier: Tier) -> f64 {
        match tier {
            Tier::L1 => self.l1,
            Tier::L2 => self.l2,
            Tier::L3 => self.l3,
            Tier::L4 => self.l4,
            Tier::L5 => self.l5,
        }
    }

    /// Rates in tier order
    pub fn values(&self) -> [f64; 5] {
        [self.l1, self.l2, self.l3, self.l4, self.l5]
    }
}

// ============================================================================
// RATE FAMILIES & ENGAGEMENT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateFamily {
    YearlyWithBackfill,
    YearlyWithoutBackfill,
    MonthlyShortTerm,
    MonthlyLongTerm,
}

impl RateFamily {
    pub const ALL: [RateFamily; 4] = [
        RateFamily::YearlyWithBackfill,
        RateFamily::YearlyWithoutBackfill,
        RateFamily::MonthlyShortTerm,
        RateFamily::MonthlyLongTerm,
    ];

    /// Field name used in JSON payloads and as the column prefix in storage
    pub fn name(&self) -> &'static str {
        match self {
            RateFamily::YearlyWithBackfill => "yearly_with_backfill",
            RateFamily::YearlyWithoutBackfill => "yearly_without_backfill",
            RateFamily::MonthlyShortTerm => "monthly_short_term",
            RateFamily::MonthlyLongTerm => "monthly_long_term",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngagementType {
    Yearly,
    MonthlyShort,
    MonthlyLong,
}

impl EngagementType {
    pub const ALL: [EngagementType; 3] = [
        EngagementType::Yearly,
        EngagementType::MonthlyShort,
        EngagementType::MonthlyLong,
    ];

    pub fn value(&self) -> &'static str {
        match self {
            EngagementType::Yearly => "yearly",
            EngagementType::MonthlyShort => "monthly_short",
            EngagementType::MonthlyLong => "monthly_long",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EngagementType::Yearly => "Yearly",
            EngagementType::MonthlyShort => "Monthly (Short-term ≤ 3 months)",
            EngagementType::MonthlyLong => "Monthly (Long-term > 3 months)",
        }
    }

    /// Family priced for this engagement. Backfill only matters for yearly.
    pub fn rate_family(&self, with_backfill: bool) -> RateFamily {
        match self {
            EngagementType::Yearly if with_backfill => RateFamily::YearlyWithBackfill,
            EngagementType::Yearly => RateFamily::YearlyWithoutBackfill,
            EngagementType::MonthlyShort => RateFamily::MonthlyShortTerm,
            EngagementType::MonthlyLong => RateFamily::MonthlyLongTerm,
        }
    }
}

impl fmt::Display for EngagementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for EngagementType {
    type Err = PricebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngagementType::ALL
            .into_iter()
            .find(|kind| kind.value() == s)
            .ok_or_else(|| PricebookError::Validation("Invalid engagement type.".to_string()))
    }
}

// ============================================================================
// RATE RECORD
// ============================================================================

/// The five fields that uniquely identify a pricing record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialKey {
    pub region: String,
    pub country: String,
    pub supplier: String,
    pub currency: String,
    pub payment_terms: String,
}

fn default_supplier() -> String {
    DEFAULT_SUPPLIER.to_string()
}

fn default_payment_terms() -> String {
    DEFAULT_PAYMENT_TERMS.to_string()
}

/// One pricebook row in wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub region: String,
    pub country: String,
    #[serde(default = "default_supplier")]
    pub supplier: String,
    pub currency: String,
    #[serde(rename = "paymentTerms", default = "default_payment_terms")]
    pub payment_terms: String,

    #[serde(default)]
    pub yearly_with_backfill: TierRates,
    #[serde(default)]
    pub yearly_without_backfill: TierRates,
    #[serde(default)]
    pub monthly_short_term: TierRates,
    #[serde(default)]
    pub monthly_long_term: TierRates,
}

impl RateRecord {
    /// Record with default supplier/payment terms and all rates zero
    pub fn new(region: &str, country: &str, currency: &str) -> Self {
        Self {
            region: region.to_string(),
            country: country.to_string(),
            supplier: default_supplier(),
            currency: currency.to_string(),
            payment_terms: default_payment_terms(),
            yearly_with_backfill: TierRates::default(),
            yearly_without_backfill: TierRates::default(),
            monthly_short_term: TierRates::default(),
            monthly_long_term: TierRates::default(),
        }
    }

    pub fn key(&self) -> CommercialKey {
        CommercialKey {
            region: self.region.clone(),
            country: self.country.clone(),
            supplier: self.supplier.clone(),
            currency: self.currency.clone(),
            payment_terms: self.payment_terms.clone(),
        }
    }

    pub fn family(&self, family: RateFamily) -> &TierRates {
        match family {
            RateFamily::YearlyWithBackfill => &self.yearly_with_backfill,
            RateFamily::YearlyWithoutBackfill => &self.yearly_without_backfill,
            RateFamily::MonthlyShortTerm => &self.monthly_short_term,
            RateFamily::MonthlyLongTerm => &self.monthly_long_term,
        }
    }

    pub fn family_mut(&mut self, family: RateFamily) -> &mut TierRates {
        match family {
            RateFamily::YearlyWithBackfill => &mut self.yearly_with_backfill,
            RateFamily::YearlyWithoutBackfill => &mut self.yearly_without_backfill,
            RateFamily::MonthlyShortTerm => &mut self.monthly_short_term,
            RateFamily::MonthlyLongTerm => &mut self.monthly_long_term,
        }
    }

    /// Check required key fields and that every rate is a finite, non-negative amount
    pub fn validate(&self) -> Result<(), PricebookError> {
        let key_fields = [
            ("region", &self.region),
            ("country", &self.country),
            ("supplier", &self.supplier),
            ("currency", &self.currency),
            ("paymentTerms", &self.payment_terms),
        ];
        for (name, value) in key_fields {
            if value.trim().is_empty() {
                return Err(PricebookError::Validation(format!(
                    "Pricebook record is missing {}.",
                    name
                )));
            }
        }

        for family in RateFamily::ALL {
            let rates = self.family(family);
            for tier in Tier::ALL {
                let rate = rates.get(tier);
                if !rate.is_finite() || rate < 0.0 {
                    return Err(PricebookError::Validation(format!(
                        "Invalid {} {} rate {} for {}/{}.",
                        family.name(),
                        tier,
                        rate,
                        self.region,
                        self.country
                    )));
                }
            }
        }

        Ok(())
    }
}
