use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::ride::{PaymentStatus, Ride, RideStatus};

/// Published on every applied ride transition. Carries no secrets.
#[derive(Debug, Clone, Serialize)]
pub struct RideEvent {
    pub ride_id: Uuid,
    pub kind: &'static str,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub driver_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl RideEvent {
    pub fn from_ride(kind: &'static str, ride: &Ride) -> Self {
        Self {
            ride_id: ride.id,
            kind,
            status: ride.status,
            payment_status: ride.payment_status,
            driver_id: ride.driver_id.clone(),
            at: ride.updated_at,
        }
    }
}
