use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::transition::{DriverTransition, OfferSweep, OfferTransition, RideTransition};
use crate::models::dispatch::{DispatchOffer, OfferStatus};
use crate::models::driver::DriverProfile;
use crate::models::ride::Ride;
use crate::store::{Cas, StateStore, StoreError, StoreResult, StoreStats};

type OfferKey = (Uuid, String);

/// In-process store. Every conditional update runs while holding the
/// record's map entry exclusively, which makes guard-then-apply atomic per
/// record. Offer generations of one `(ride, driver)` pair share an entry.
#[derive(Default)]
pub struct InMemoryStore {
    rides: DashMap<Uuid, Ride>,
    offers: DashMap<OfferKey, Vec<DispatchOffer>>,
    drivers: DashMap<String, DriverProfile>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn pending_mut(history: &mut [DispatchOffer]) -> Option<&mut DispatchOffer> {
    history
        .iter_mut()
        .rev()
        .find(|offer| offer.status == OfferStatus::Pending)
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn insert_ride(&self, ride: Ride) -> StoreResult<()> {
        match self.rides.entry(ride.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("ride {}", ride.id))),
            Entry::Vacant(slot) => {
                slot.insert(ride);
                Ok(())
            }
        }
    }

    async fn ride(&self, ride_id: Uuid) -> StoreResult<Option<Ride>> {
        Ok(self.rides.get(&ride_id).map(|entry| entry.value().clone()))
    }

    async fn transition_ride(
        &self,
        ride_id: Uuid,
        transition: &RideTransition,
        now: DateTime<Utc>,
    ) -> StoreResult<Cas<Ride>> {
        let Some(mut ride) = self.rides.get_mut(&ride_id) else {
            return Ok(Cas::Missing);
        };

        if !transition.allows(&ride) {
            return Ok(Cas::Rejected);
        }

        transition.apply(&mut ride, now);
        debug_assert!(ride.invariants_hold(), "{} broke ride invariants", transition.name());
        Ok(Cas::Applied(ride.clone()))
    }

    async fn ride_by_order(&self, order_id: &str) -> StoreResult<Option<Ride>> {
        Ok(self
            .rides
            .iter()
            .find(|entry| entry.gateway_order_id.as_deref() == Some(order_id))
            .map(|entry| entry.value().clone()))
    }

    async fn active_ride_for_driver(&self, driver_id: &str) -> StoreResult<Option<Ride>> {
        Ok(self
            .rides
            .iter()
            .find(|entry| entry.is_driven_by(driver_id) && entry.status.is_active_for_driver())
            .map(|entry| entry.value().clone()))
    }

    async fn put_pending_offer(&self, offer: DispatchOffer) -> StoreResult<DispatchOffer> {
        let mut history = self
            .offers
            .entry((offer.ride_id, offer.driver_id.clone()))
            .or_default();

        if let Some(current) = pending_mut(&mut history) {
            if current.expires_at > offer.created_at {
                current.expires_at = current.expires_at.max(offer.expires_at);
                return Ok(current.clone());
            }
            OfferTransition::Expire.apply(current, offer.created_at);
        }

        history.push(offer.clone());
        Ok(offer)
    }

    async fn pending_offer(
        &self,
        ride_id: Uuid,
        driver_id: &str,
    ) -> StoreResult<Option<DispatchOffer>> {
        Ok(self
            .offers
            .get(&(ride_id, driver_id.to_string()))
            .and_then(|history| {
                history
                    .iter()
                    .rev()
                    .find(|offer| offer.status == OfferStatus::Pending)
                    .cloned()
            }))
    }

    async fn transition_offer(
        &self,
        ride_id: Uuid,
        driver_id: &str,
        transition: OfferTransition,
        now: DateTime<Utc>,
    ) -> StoreResult<Cas<DispatchOffer>> {
        let Some(mut history) = self.offers.get_mut(&(ride_id, driver_id.to_string())) else {
            return Ok(Cas::Missing);
        };

        let Some(offer) = pending_mut(&mut history) else {
            return Ok(Cas::Rejected);
        };
        if !transition.allows(offer, now) {
            return Ok(Cas::Rejected);
        }

        transition.apply(offer, now);
        Ok(Cas::Applied(offer.clone()))
    }

    async fn expire_offers(&self, sweep: &OfferSweep, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut expired = 0;
        for mut history in self.offers.iter_mut() {
            for offer in history.iter_mut() {
                if sweep.selects(offer, now) {
                    OfferTransition::Expire.apply(offer, now);
                    expired += 1;
                }
            }
        }
        Ok(expired)
    }

    async fn offers_for_ride(&self, ride_id: Uuid) -> StoreResult<Vec<DispatchOffer>> {
        let mut offers: Vec<DispatchOffer> = self
            .offers
            .iter()
            .filter(|entry| entry.key().0 == ride_id)
            .flat_map(|entry| entry.value().clone())
            .collect();
        offers.sort_by_key(|offer| offer.created_at);
        Ok(offers)
    }

    async fn insert_driver(&self, driver: DriverProfile) -> StoreResult<()> {
        match self.drivers.entry(driver.user_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("driver {}", driver.user_id))),
            Entry::Vacant(slot) => {
                slot.insert(driver);
                Ok(())
            }
        }
    }

    async fn driver(&self, driver_id: &str) -> StoreResult<Option<DriverProfile>> {
        Ok(self.drivers.get(driver_id).map(|entry| entry.value().clone()))
    }

    async fn transition_driver(
        &self,
        driver_id: &str,
        transition: &DriverTransition,
        now: DateTime<Utc>,
    ) -> StoreResult<Cas<DriverProfile>> {
        let Some(mut driver) = self.drivers.get_mut(driver_id) else {
            return Ok(Cas::Missing);
        };

        if !transition.allows(&driver) {
            return Ok(Cas::Rejected);
        }

        transition.apply(&mut driver, now);
        Ok(Cas::Applied(driver.clone()))
    }

    async fn drivers(&self) -> StoreResult<Vec<DriverProfile>> {
        Ok(self.drivers.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        Ok(StoreStats {
            rides: self.rides.len(),
            offers: self.offers.iter().map(|entry| entry.value().len()).sum(),
            drivers: self.drivers.len(),
        })
    }
}
