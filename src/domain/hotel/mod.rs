//! Hotel domain - tracked hotels and their registry

mod hotel_registry;

pub use hotel_registry::HotelRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::types::{HotelId, UserId};

/// A tracked hotel, either the user's own (target) or a competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: HotelId,
    pub user_id: UserId,
    pub name: String,
    pub location: String,
    pub is_target_hotel: bool,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    /// Source catalog id, also used to match discovery candidates
    pub external_ref: Option<String>,
    pub star_rating: Option<u8>,
}

impl Hotel {
    /// Whether a catalog entry describes this hotel
    pub fn matches_listing(&self, listing_id: &str, name: &str, location: &str) -> bool {
        if self.external_ref.as_deref() == Some(listing_id) {
            return true;
        }
        self.name.trim().eq_ignore_ascii_case(name.trim())
            && self.location.trim().eq_ignore_ascii_case(location.trim())
    }
}

/// Input for registering a hotel
#[derive(Debug, Clone)]
pub struct NewHotel {
    pub name: String,
    pub location: String,
    pub is_target: bool,
    pub currency: String,
    pub external_ref: Option<String>,
    pub star_rating: Option<u8>,
}

impl NewHotel {
    pub fn competitor(name: &str, location: &str) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            is_target: false,
            currency: "USD".to_string(),
            external_ref: None,
            star_rating: None,
        }
    }

    pub fn target(name: &str, location: &str) -> Self {
        Self {
            is_target: true,
            ..Self::competitor(name, location)
        }
    }

    pub fn with_external_ref(mut self, external_ref: &str) -> Self {
        self.external_ref = Some(external_ref.to_string());
        self
    }
}
