//! HTTP rate feed client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::hotel::Hotel;
use crate::domain::price::{PriceFeed, RateQuote};
use crate::shared::errors::{AppError, FetchError};

/// Body of `GET {base_url}/rates`
#[derive(Debug, Deserialize)]
struct RateResponse {
    price: Decimal,
    currency: Option<String>,
    vendor: Option<String>,
}

/// Rate API client
pub struct HttpPriceFeed {
    http_client: Client,
    base_url: String,
    vendor: String,
}

impl HttpPriceFeed {
    pub fn new(base_url: &str, vendor: &str, timeout_ms: u64) -> Result<Self, AppError> {
        Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid feed base_url {}: {}", base_url, e)))?;
        let http_client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            vendor: vendor.to_string(),
        })
    }

    fn rates_url(&self, hotel: &Hotel) -> Result<Url, FetchError> {
        let mut params = vec![
            ("hotel", hotel.name.as_str()),
            ("location", hotel.location.as_str()),
        ];
        if let Some(external_ref) = hotel.external_ref.as_deref() {
            params.push(("ref", external_ref));
        }
        Url::parse_with_params(&format!("{}/rates", self.base_url), &params)
            .map_err(|e| FetchError::InvalidResponse(format!("bad request url: {}", e)))
    }
}

/// Parse a rate API body. The hotel's currency and the feed's vendor fill
/// in missing fields.
pub fn parse_rate_response(
    body: &str,
    default_currency: &str,
    default_vendor: &str,
) -> Result<RateQuote, FetchError> {
    let response: RateResponse =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    if response.price < Decimal::ZERO {
        return Err(FetchError::InvalidResponse(format!(
            "negative price {}",
            response.price
        )));
    }

    Ok(RateQuote {
        price: response.price,
        currency: response
            .currency
            .unwrap_or_else(|| default_currency.to_string()),
        vendor: response.vendor.unwrap_or_else(|| default_vendor.to_string()),
    })
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    async fn fetch_rate(&self, hotel: &Hotel) -> Result<RateQuote, FetchError> {
        let url = self.rates_url(hotel)?;
        debug!("🔍 Fetching rate from: {}", url);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Rate request for {} timed out", hotel.name);
            }
            FetchError::Unavailable(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::RateNotFound(hotel.name.clone()));
        }
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!(
                "rate API request failed with status: {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;
        let quote = parse_rate_response(&body, &hotel.currency, &self.vendor)?;

        info!(
            "✅ Rate for {} ({}): {} {}",
            hotel.name, hotel.location, quote.price, quote.currency
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::utils::generate_id;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn hotel(external_ref: Option<&str>) -> Hotel {
        Hotel {
            id: generate_id(),
            user_id: generate_id(),
            name: "Casa Azul & Spa".to_string(),
            location: "Lisbon".to_string(),
            is_target_hotel: false,
            currency: "EUR".to_string(),
            created_at: Utc::now(),
            external_ref: external_ref.map(|s| s.to_string()),
            star_rating: None,
        }
    }

    #[test]
    fn test_parse_full_body() {
        let quote = parse_rate_response(
            r#"{"price": "129.50", "currency": "USD", "vendor": "acme"}"#,
            "EUR",
            "rates-api",
        )
        .unwrap();
        assert_eq!(quote.price, dec!(129.50));
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.vendor, "acme");
    }

    #[test]
    fn test_parse_fills_defaults() {
        let quote = parse_rate_response(r#"{"price": "99"}"#, "EUR", "rates-api").unwrap();
        assert_eq!(quote.currency, "EUR");
        assert_eq!(quote.vendor, "rates-api");
    }

    #[test]
    fn test_parse_rejects_bad_bodies() {
        assert!(matches!(
            parse_rate_response("not json", "EUR", "v"),
            Err(FetchError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_rate_response(r#"{"currency": "EUR"}"#, "EUR", "v"),
            Err(FetchError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_rate_response(r#"{"price": "-5"}"#, "EUR", "v"),
            Err(FetchError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rates_url_encodes_params() {
        let feed = HttpPriceFeed::new("http://localhost:8080/api/", "rates-api", 1000).unwrap();

        let url = feed.rates_url(&hotel(None)).unwrap();
        assert_eq!(url.path(), "/api/rates");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("hotel".to_string(), "Casa Azul & Spa".to_string()),
                ("location".to_string(), "Lisbon".to_string()),
            ]
        );

        let url = feed.rates_url(&hotel(Some("cat-9"))).unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "ref" && v == "cat-9"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpPriceFeed::new("not a url", "v", 1000),
            Err(AppError::ConfigError(_))
        ));
    }
}
