//! State store adapter: atomic single-record conditional updates over rides,
//! dispatch offers and driver profiles. Nothing here spans two records.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::transition::{DriverTransition, OfferSweep, OfferTransition, RideTransition};
use crate::models::dispatch::DispatchOffer;
use crate::models::driver::DriverProfile;
use crate::models::ride::Ride;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum Cas<T> {
    /// Guard held; the record now reads as `T`.
    Applied(T),
    /// Guard failed against the current record; nothing changed.
    Rejected,
    /// No such record.
    Missing,
}

impl<T> Cas<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Cas::Applied(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rides: usize,
    pub offers: usize,
    pub drivers: usize,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn insert_ride(&self, ride: Ride) -> StoreResult<()>;
    async fn ride(&self, ride_id: Uuid) -> StoreResult<Option<Ride>>;
    async fn transition_ride(
        &self,
        ride_id: Uuid,
        transition: &RideTransition,
        now: DateTime<Utc>,
    ) -> StoreResult<Cas<Ride>>;
    async fn ride_by_order(&self, order_id: &str) -> StoreResult<Option<Ride>>;
    async fn active_ride_for_driver(&self, driver_id: &str) -> StoreResult<Option<Ride>>;

    /// Installs a pending offer for the pair. A still-live pending offer for
    /// the same pair has its window extended instead, so at most one pending
    /// offer per pair ever exists.
    async fn put_pending_offer(&self, offer: DispatchOffer) -> StoreResult<DispatchOffer>;
    /// The pending offer for the pair, if any, regardless of expiry.
    async fn pending_offer(&self, ride_id: Uuid, driver_id: &str)
    -> StoreResult<Option<DispatchOffer>>;
    async fn transition_offer(
        &self,
        ride_id: Uuid,
        driver_id: &str,
        transition: OfferTransition,
        now: DateTime<Utc>,
    ) -> StoreResult<Cas<DispatchOffer>>;
    async fn expire_offers(&self, sweep: &OfferSweep, now: DateTime<Utc>) -> StoreResult<usize>;
    async fn offers_for_ride(&self, ride_id: Uuid) -> StoreResult<Vec<DispatchOffer>>;

    async fn insert_driver(&self, driver: DriverProfile) -> StoreResult<()>;
    async fn driver(&self, driver_id: &str) -> StoreResult<Option<DriverProfile>>;
    async fn transition_driver(
        &self,
        driver_id: &str,
        transition: &DriverTransition,
        now: DateTime<Utc>,
    ) -> StoreResult<Cas<DriverProfile>>;
    async fn drivers(&self) -> StoreResult<Vec<DriverProfile>>;

    async fn stats(&self) -> StoreResult<StoreStats>;
}
