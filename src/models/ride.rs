use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,
    Searching,
    Accepted,
    DriverEnRoute,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// States in which `driver_id` must be set.
    pub fn has_driver(self) -> bool {
        matches!(
            self,
            RideStatus::Accepted
                | RideStatus::DriverEnRoute
                | RideStatus::Started
                | RideStatus::Completed
        )
    }

    /// States in which `otp_code` must be set.
    pub fn holds_otp(self) -> bool {
        matches!(self, RideStatus::Accepted | RideStatus::DriverEnRoute)
    }

    /// States that keep a driver busy and block going offline.
    pub fn is_active_for_driver(self) -> bool {
        matches!(
            self,
            RideStatus::Accepted | RideStatus::DriverEnRoute | RideStatus::Started
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Gateway,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub label: String,
    pub point: GeoPoint,
}

/// The authoritative ride record. Only the lifecycle transition table mutates it.
///
/// `otp_code` is never serialized: the rider reads it through a dedicated,
/// ownership-checked call, and no transition response carries it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Ride {
    pub id: Uuid,
    pub rider_id: String,
    pub driver_id: Option<String>,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub pickup: Place,
    pub dropoff: Place,
    pub fare: u32,
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn requested(
        rider_id: impl Into<String>,
        pickup: Place,
        dropoff: Place,
        payment_method: PaymentMethod,
        fare: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rider_id: rider_id.into(),
            driver_id: None,
            status: RideStatus::Requested,
            payment_status: PaymentStatus::Pending,
            payment_method,
            pickup,
            dropoff,
            fare,
            otp_code: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            requested_at: now,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            updated_at: now,
        }
    }

    pub fn is_driven_by(&self, driver_id: &str) -> bool {
        self.driver_id.as_deref() == Some(driver_id)
    }

    /// Record-level invariants that every applied transition must preserve.
    pub fn invariants_hold(&self) -> bool {
        self.driver_id.is_some() == self.status.has_driver()
            && self.otp_code.is_some() == self.status.holds_otp()
            && !self.is_driven_by(&self.rider_id)
    }
}
