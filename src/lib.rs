// Pricebook - Core Library
// Exposes the store, resolvers and form client for the CLI, API server, and tests

pub mod model;
pub mod error;
pub mod db;
pub mod loader;
pub mod options;
pub mod quote;
pub mod client;
pub mod form;
pub mod config;
pub mod telemetry;

// Only compile the HTTP API when the server feature is enabled
#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use model::{
    CommercialKey, EngagementType, RateFamily, RateRecord, Tier, TierRates,
    DEFAULT_PAYMENT_TERMS, DEFAULT_SUPPLIER,
};
pub use error::{PricebookError, PricebookResult};
pub use db::{
    KeyField, KeyFilter, LoadSummary, PricebookEntry, PricebookPool, PricebookReader,
    PricebookStore, PooledReader, UpsertOutcome,
};
pub use loader::{default_seed, load_csv, load_json, load_records};
pub use options::{get_options, EngagementTypeOption, PricebookOptions};
pub use quote::{
    get_quote, resolve_quote, validate_request, Quote, QuoteBreakdown, QuoteRequest, ValidatedQuote,
};
pub use client::{LocalPriceApi, PriceApi};
#[cfg(feature = "http-client")]
pub use client::HttpPriceApi;
pub use form::{FormField, QuoteForm, QuoteOutcome};
pub use config::{Config, LogFormat};
pub use telemetry::{init_tracing, scoped_tracing};
