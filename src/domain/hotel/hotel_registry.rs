//! Hotel registry with per-hotel write serialization

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::{Hotel, NewHotel};
use crate::shared::errors::HotelError;
use crate::shared::types::{HotelId, UserId};
use crate::shared::utils::generate_id;

/// Owns the hotel set of every user. Writes to a single hotel (price
/// recording during a scan, deletion) go through `lock_hotel`.
pub struct HotelRegistry {
    hotels: RwLock<Vec<Hotel>>,
    write_locks: Mutex<HashMap<HotelId, Arc<Mutex<()>>>>,
}

impl HotelRegistry {
    pub fn new() -> Self {
        Self {
            hotels: RwLock::new(Vec::new()),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a hotel. A user has at most one target hotel.
    pub async fn add(&self, user_id: UserId, new_hotel: NewHotel) -> Result<Hotel, HotelError> {
        let name = new_hotel.name.trim();
        if name.is_empty() {
            return Err(HotelError::EmptyName);
        }

        let mut hotels = self.hotels.write().await;
        if new_hotel.is_target
            && hotels
                .iter()
                .any(|h| h.user_id == user_id && h.is_target_hotel)
        {
            return Err(HotelError::TargetAlreadySet(user_id));
        }

        let hotel = Hotel {
            id: generate_id(),
            user_id,
            name: name.to_string(),
            location: new_hotel.location.trim().to_string(),
            is_target_hotel: new_hotel.is_target,
            currency: new_hotel.currency,
            created_at: Utc::now(),
            external_ref: new_hotel.external_ref,
            star_rating: new_hotel.star_rating,
        };
        hotels.push(hotel.clone());

        info!(
            "🏨 Added {} hotel {} ({}) for user {}",
            if hotel.is_target_hotel { "target" } else { "competitor" },
            hotel.name,
            hotel.location,
            user_id
        );
        Ok(hotel)
    }

    /// Remove a hotel from future scan scope. Waits for any in-flight
    /// write on the same hotel to finish first.
    pub async fn remove(&self, hotel_id: HotelId) -> Result<Hotel, HotelError> {
        if self.get(hotel_id).await.is_none() {
            return Err(HotelError::NotFound(hotel_id));
        }
        let _guard = self.lock_hotel(hotel_id).await;

        let mut hotels = self.hotels.write().await;
        let position = hotels.iter().position(|h| h.id == hotel_id);
        let removed = position.map(|index| hotels.remove(index));
        drop(hotels);

        // Lost a race with another delete: still drop the lock entry
        self.write_locks.lock().await.remove(&hotel_id);
        let removed = removed.ok_or(HotelError::NotFound(hotel_id))?;
        info!("🗑️  Removed hotel {} ({})", removed.name, hotel_id);
        Ok(removed)
    }

    /// Acquire the write lock of one hotel
    pub async fn lock_hotel(&self, hotel_id: HotelId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock().await;
            Arc::clone(locks.entry(hotel_id).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        debug!("Waiting for write lock on hotel {}", hotel_id);
        lock.lock_owned().await
    }

    pub async fn get(&self, hotel_id: HotelId) -> Option<Hotel> {
        let hotels = self.hotels.read().await;
        hotels.iter().find(|h| h.id == hotel_id).cloned()
    }

    /// All hotels of a user, target first, then competitors in insertion order
    pub async fn hotels_for(&self, user_id: UserId) -> Vec<Hotel> {
        let hotels = self.hotels.read().await;
        let mut owned: Vec<Hotel> = hotels.iter().filter(|h| h.user_id == user_id).cloned().collect();
        owned.sort_by_key(|h| !h.is_target_hotel);
        owned
    }

    pub async fn target_for(&self, user_id: UserId) -> Option<Hotel> {
        let hotels = self.hotels.read().await;
        hotels
            .iter()
            .find(|h| h.user_id == user_id && h.is_target_hotel)
            .cloned()
    }

    pub async fn competitors_for(&self, user_id: UserId) -> Vec<Hotel> {
        let hotels = self.hotels.read().await;
        hotels
            .iter()
            .filter(|h| h.user_id == user_id && !h.is_target_hotel)
            .cloned()
            .collect()
    }
}

impl Default for HotelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
