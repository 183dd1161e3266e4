use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

/// A time-bounded proposal of one ride to one driver. Offers are never
/// deleted; each `(ride_id, driver_id)` pair keeps its generations for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchOffer {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: String,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DispatchOffer {
    pub fn pending(
        ride_id: Uuid,
        driver_id: impl Into<String>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id,
            driver_id: driver_id.into(),
            status: OfferStatus::Pending,
            created_at: now,
            expires_at,
            resolved_at: None,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && self.expires_at > now
    }
}
