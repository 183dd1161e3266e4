use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Dispatch-side view of a driver as returned by the locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverCandidate {
    pub driver_id: String,
    pub location: GeoPoint,
}

/// `is_available` implies `is_online`. A driver is dispatchable only when both hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverProfile {
    pub user_id: String,
    pub is_online: bool,
    pub is_available: bool,
    pub location: Option<GeoPoint>,
    pub updated_at: DateTime<Utc>,
}

impl DriverProfile {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            is_online: false,
            is_available: false,
            location: None,
            updated_at: now,
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        self.is_online && self.is_available
    }
}
