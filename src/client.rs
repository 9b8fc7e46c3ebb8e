// Price API client - what the quote form talks to
// Local calls straight into the resolvers, or HTTP against a running server

use crate::db::PricebookStore;
use crate::error::PricebookResult;
use crate::options::{get_options, PricebookOptions};
use crate::quote::{get_quote, Quote, QuoteRequest};

pub trait PriceApi {
    fn options(&self) -> PricebookResult<PricebookOptions>;
    fn quote(&self, request: &QuoteRequest) -> PricebookResult<Quote>;
}

/// Resolves against a store opened in this process
pub struct LocalPriceApi {
    store: PricebookStore,
}

impl LocalPriceApi {
    pub fn new(store: PricebookStore) -> Self {
        Self { store }
    }
}

impl PriceApi for LocalPriceApi {
    fn options(&self) -> PricebookResult<PricebookOptions> {
        get_options(&self.store)
    }

    fn quote(&self, request: &QuoteRequest) -> PricebookResult<Quote> {
        get_quote(&self.store, request)
    }
}

#[cfg(feature = "http-client")]
pub use http::HttpPriceApi;

#[cfg(feature = "http-client")]
mod http {
    use super::PriceApi;
    use crate::error::{PricebookError, PricebookResult};
    use crate::options::PricebookOptions;
    use crate::quote::{Quote, QuoteRequest};
    use reqwest::blocking::{Client, Response};
    use reqwest::StatusCode;
    use serde::de::DeserializeOwned;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        message: String,
        #[serde(default)]
        error: Option<String>,
    }

    /// Blocking client for the pricebook HTTP API.
    /// `base_url` is either the server root or its `/api/price` prefix.
    pub struct HttpPriceApi {
        base_url: String,
        client: Client,
    }

    impl HttpPriceApi {
        pub fn new(base_url: &str) -> Self {
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                client: Client::new(),
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn transport(e: reqwest::Error) -> PricebookError {
        PricebookError::Infrastructure(e.to_string())
    }

    /// Map a response onto the error taxonomy by status code
    fn read_body<T: DeserializeOwned>(response: Response) -> PricebookResult<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().map_err(transport);
        }

        let message = match response.json::<ErrorBody>() {
            Ok(ErrorBody {
                message,
                error: Some(detail),
            }) => format!("{}: {}", message, detail),
            Ok(body) => body.message,
            Err(_) => format!("Request failed with status {}", status),
        };

        Err(match status {
            StatusCode::BAD_REQUEST => PricebookError::Validation(message),
            StatusCode::NOT_FOUND => PricebookError::NotFound(message),
            _ => PricebookError::Infrastructure(message),
        })
    }

    impl PriceApi for HttpPriceApi {
        fn options(&self) -> PricebookResult<PricebookOptions> {
            let response = self
                .client
                .get(self.url("options"))
                .send()
                .map_err(transport)?;
            read_body(response)
        }

        fn quote(&self, request: &QuoteRequest) -> PricebookResult<Quote> {
            let response = self
                .client
                .post(self.url("quote"))
                .json(request)
                .send()
                .map_err(transport)?;
            read_body(response)
        }
    }
}

#[cfg(all(test, feature = "server", feature = "http-client"))]
mod tests {
    use super::*;
    use crate::api::{app_router, AppState};
    use crate::config::Config;
    use crate::db::PricebookPool;
    use crate::error::PricebookError;
    use crate::model::{RateRecord, TierRates};

    fn australia() -> RateRecord {
        let mut record = RateRecord::new("APAC", "Australia", "USD");
        record.yearly_with_backfill = TierRates::new(48000.0, 60000.0, 72000.0, 84000.0, 96000.0);
        record.yearly_without_backfill =
            TierRates::new(52000.0, 64000.0, 76000.0, 88000.0, 100000.0);
        record
    }

    fn request(country: &str, tier: &str) -> QuoteRequest {
        QuoteRequest {
            region: Some("APAC".to_string()),
            country: Some(country.to_string()),
            supplier: Some("Direct".to_string()),
            currency: Some("USD".to_string()),
            payment_terms: Some("60 Days".to_string()),
            service_level: Some(tier.to_string()),
            engagement_type: Some("yearly".to_string()),
            with_backfill: Some(true),
        }
    }

    /// Serve the router on an ephemeral port; returns its base URL
    async fn serve(pool: PricebookPool) -> String {
        let config = Config::from_lookup(|_| None).unwrap();
        let router = app_router(AppState::new(pool), &config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_http_api_matches_local_api() {
        let base_url = serve(PricebookPool::in_memory(&[australia()]).unwrap()).await;

        let mut store = PricebookStore::open_in_memory().unwrap();
        store.bulk_load(&[australia()]).unwrap();
        let local = LocalPriceApi::new(store);

        // The blocking client must stay off the async workers
        tokio::task::spawn_blocking(move || {
            for url in [base_url.clone(), format!("{}/api/price/", base_url)] {
                let remote = HttpPriceApi::new(&url);

                assert_eq!(remote.options().unwrap(), local.options().unwrap());

                let quote = remote.quote(&request("Australia", "L1")).unwrap();
                assert_eq!(quote, local.quote(&request("Australia", "L1")).unwrap());
                assert_eq!(quote.amount, 48000.0);
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_http_errors_map_to_taxonomy() {
        let base_url = serve(PricebookPool::in_memory(&[australia()]).unwrap()).await;

        tokio::task::spawn_blocking(move || {
            let remote = HttpPriceApi::new(&base_url);

            match remote.quote(&request("Germany", "L1")) {
                Err(PricebookError::NotFound(message)) => assert_eq!(
                    message,
                    "No matching pricebook entry found for the given selection."
                ),
                other => panic!("expected NotFound, got {:?}", other),
            }

            match remote.quote(&request("Australia", "L9")) {
                Err(PricebookError::Validation(message)) => {
                    assert_eq!(message, "Invalid service level.")
                }
                other => panic!("expected Validation, got {:?}", other),
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_http_server_failure_is_infrastructure() {
        let pool = PricebookPool::in_memory(&[australia()]).unwrap();
        pool.get()
            .unwrap()
            .execute_batch("DROP TABLE pricebook_entries;")
            .unwrap();
        let base_url = serve(pool).await;

        tokio::task::spawn_blocking(move || {
            let err = HttpPriceApi::new(&base_url).options().unwrap_err();
            assert!(err.is_infrastructure());
            assert!(err.to_string().starts_with("Failed to load options: "));
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_unreachable_server_is_infrastructure() {
        // Bound then released, so nothing is listening
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let err = HttpPriceApi::new(&format!("http://{}", addr))
            .options()
            .unwrap_err();
        assert!(err.is_infrastructure());
    }
}
