// Quote form state - selections, defaults and the last result
// Rendering lives in the TUI; this module only holds the rules

use crate::client::PriceApi;
use crate::model::{EngagementType, Tier, DEFAULT_PAYMENT_TERMS, DEFAULT_SUPPLIER};
use crate::options::PricebookOptions;
use crate::quote::{Quote, QuoteRequest};

// ============================================================================
// FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Region,
    Country,
    Supplier,
    Currency,
    PaymentTerms,
    ServiceLevel,
    EngagementType,
    WithBackfill,
}

impl FormField {
    pub const ALL: [FormField; 8] = [
        FormField::Region,
        FormField::Country,
        FormField::Supplier,
        FormField::Currency,
        FormField::PaymentTerms,
        FormField::ServiceLevel,
        FormField::EngagementType,
        FormField::WithBackfill,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Region => "Region",
            FormField::Country => "Country",
            FormField::Supplier => "Supplier",
            FormField::Currency => "Currency",
            FormField::PaymentTerms => "Payment Terms",
            FormField::ServiceLevel => "Service Level",
            FormField::EngagementType => "Engagement",
            FormField::WithBackfill => "With Backfill",
        }
    }

    fn position(&self) -> usize {
        FormField::ALL
            .iter()
            .position(|field| field == self)
            .unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        FormField::ALL[(self.position() + 1) % FormField::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        let len = FormField::ALL.len();
        FormField::ALL[(self.position() + len - 1) % len]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Quoted(Quote),
    Failed(String),
}

/// Step to the neighbouring value in `choices`, wrapping at both ends.
/// Unknown current values restart from the first choice.
fn step<'a>(choices: &'a [String], current: &str, forward: bool) -> Option<&'a String> {
    if choices.is_empty() {
        return None;
    }
    let len = choices.len();
    let idx = match choices.iter().position(|c| c == current) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None => 0,
    };
    choices.get(idx)
}

// ============================================================================
// FORM
// ============================================================================

pub struct QuoteForm {
    options: PricebookOptions,
    engagement_types: Vec<EngagementType>,
    pub region: String,
    pub country: String,
    pub supplier: String,
    pub currency: String,
    pub payment_terms: String,
    pub service_level: Tier,
    pub engagement: EngagementType,
    pub with_backfill: bool,
    pub focus: FormField,
    pub outcome: Option<QuoteOutcome>,
}

impl QuoteForm {
    /// Every field defaults to the first available value
    pub fn from_options(options: PricebookOptions) -> Self {
        let engagement_types: Vec<EngagementType> = options
            .engagement_types
            .iter()
            .filter_map(|option| option.value.parse().ok())
            .collect();

        let region = options.regions.first().cloned().unwrap_or_default();
        let supplier = options
            .suppliers
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_SUPPLIER.to_string());
        let currency = options.currencies.first().cloned().unwrap_or_default();
        let payment_terms = options
            .payment_terms
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_PAYMENT_TERMS.to_string());
        let service_level = options.service_levels.first().copied().unwrap_or(Tier::L1);
        let engagement = engagement_types
            .first()
            .copied()
            .unwrap_or(EngagementType::Yearly);

        let mut form = Self {
            options,
            engagement_types,
            region: String::new(),
            country: String::new(),
            supplier,
            currency,
            payment_terms,
            service_level,
            engagement,
            with_backfill: false,
            focus: FormField::Region,
            outcome: None,
        };
        form.set_region(&region);
        form
    }

    pub fn options(&self) -> &PricebookOptions {
        &self.options
    }

    /// Countries offered for the selected region
    pub fn countries(&self) -> &[String] {
        self.options
            .countries_by_region
            .get(&self.region)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Selecting a region resets the country to that region's first country
    pub fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
        self.country = self.countries().first().cloned().unwrap_or_default();
        self.outcome = None;
    }

    /// Backfill is cleared whenever the engagement is not yearly
    pub fn set_engagement(&mut self, engagement: EngagementType) {
        self.engagement = engagement;
        if engagement != EngagementType::Yearly {
            self.with_backfill = false;
        }
        self.outcome = None;
    }

    pub fn toggle_backfill(&mut self) {
        if self.engagement == EngagementType::Yearly {
            self.with_backfill = !self.with_backfill;
            self.outcome = None;
        }
    }

    pub fn backfill_enabled(&self) -> bool {
        self.engagement == EngagementType::Yearly
    }

    /// Display value of a field
    pub fn value(&self, field: FormField) -> String {
        match field {
            FormField::Region => self.region.clone(),
            FormField::Country => self.country.clone(),
            FormField::Supplier => self.supplier.clone(),
            FormField::Currency => self.currency.clone(),
            FormField::PaymentTerms => self.payment_terms.clone(),
            FormField::ServiceLevel => self.service_level.to_string(),
            FormField::EngagementType => self.engagement.label().to_string(),
            FormField::WithBackfill => {
                let shown = if self.with_backfill { "Yes" } else { "No" };
                shown.to_string()
            }
        }
    }

    /// Move the given field to its next (or previous) choice
    pub fn cycle(&mut self, field: FormField, forward: bool) {
        match field {
            FormField::Region => {
                if let Some(region) = step(&self.options.regions, &self.region, forward).cloned() {
                    self.set_region(&region);
                }
            }
            FormField::Country => {
                if let Some(country) = step(self.countries(), &self.country, forward).cloned() {
                    self.country = country;
                    self.outcome = None;
                }
            }
            FormField::Supplier => {
                if let Some(supplier) = step(&self.options.suppliers, &self.supplier, forward).cloned() {
                    self.supplier = supplier;
                    self.outcome = None;
                }
            }
            FormField::Currency => {
                if let Some(currency) = step(&self.options.currencies, &self.currency, forward).cloned() {
                    self.currency = currency;
                    self.outcome = None;
                }
            }
            FormField::PaymentTerms => {
                if let Some(terms) =
                    step(&self.options.payment_terms, &self.payment_terms, forward).cloned()
                {
                    self.payment_terms = terms;
                    self.outcome = None;
                }
            }
            FormField::ServiceLevel => {
                let levels = &self.options.service_levels;
                if let Some(i) = levels.iter().position(|t| *t == self.service_level) {
                    let len = levels.len();
                    let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
                    self.service_level = levels[next];
                } else if let Some(first) = levels.first() {
                    self.service_level = *first;
                }
                self.outcome = None;
            }
            FormField::EngagementType => {
                let kinds = &self.engagement_types;
                let next = match kinds.iter().position(|k| *k == self.engagement) {
                    Some(i) if forward => kinds.get((i + 1) % kinds.len()),
                    Some(i) => kinds.get((i + kinds.len() - 1) % kinds.len()),
                    None => kinds.first(),
                };
                if let Some(kind) = next.copied() {
                    self.set_engagement(kind);
                }
            }
            FormField::WithBackfill => self.toggle_backfill(),
        }
    }

    pub fn cycle_focused(&mut self, forward: bool) {
        self.cycle(self.focus, forward);
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.focus.previous();
    }

    /// The selection as it is sent to the quote resolver
    pub fn request(&self) -> QuoteRequest {
        QuoteRequest {
            region: Some(self.region.clone()),
            country: Some(self.country.clone()),
            supplier: Some(self.supplier.clone()),
            currency: Some(self.currency.clone()),
            payment_terms: Some(self.payment_terms.clone()),
            service_level: Some(self.service_level.to_string()),
            engagement_type: Some(self.engagement.value().to_string()),
            with_backfill: Some(self.backfill_enabled() && self.with_backfill),
        }
    }

    /// Ask the API for a quote and keep the amount or the error message
    pub fn submit(&mut self, api: &dyn PriceApi) -> &QuoteOutcome {
        let outcome = match api.quote(&self.request()) {
            Ok(quote) => QuoteOutcome::Quoted(quote),
            Err(e) => QuoteOutcome::Failed(e.to_string()),
        };
        self.outcome.insert(outcome)
    }
}
