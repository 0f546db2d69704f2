//! Price feed implementations

mod fixture_feed;
mod http_feed;

pub use fixture_feed::FixturePriceFeed;
pub use http_feed::{parse_rate_response, HttpPriceFeed};

use std::sync::Arc;

use crate::domain::price::PriceFeed;
use crate::shared::errors::AppError;
use crate::shared::types::{FeedKind, MonitorConfig};

/// Build the feed selected in config
pub fn build_feed(config: &MonitorConfig) -> Result<Arc<dyn PriceFeed>, AppError> {
    match config.feed.kind {
        FeedKind::Fixture => Ok(Arc::new(FixturePriceFeed::from_seeds(
            &config.feed.vendor,
            &config.hotels,
        ))),
        FeedKind::Http => {
            let base_url = config.feed.base_url.as_deref().ok_or_else(|| {
                AppError::ConfigError("feed.base_url is required for the http feed".to_string())
            })?;
            let feed = HttpPriceFeed::new(base_url, &config.feed.vendor, config.scan.fetch_timeout_ms)?;
            Ok(Arc::new(feed))
        }
    }
}
