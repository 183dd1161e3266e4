use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::geo::haversine_m;
use crate::models::driver::{DriverCandidate, GeoPoint};
use crate::store::StateStore;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("driver locator unavailable: {0}")]
    Unavailable(String),
}

/// Geospatial lookup of dispatchable drivers around a point.
#[async_trait]
pub trait DriverLocator: Send + Sync {
    async fn find_nearby(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<DriverCandidate>, LocatorError>;
}

/// Linear scan over stored driver profiles, nearest first.
pub struct StoreLocator {
    store: Arc<dyn StateStore>,
}

impl StoreLocator {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DriverLocator for StoreLocator {
    async fn find_nearby(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<DriverCandidate>, LocatorError> {
        let drivers = self
            .store
            .drivers()
            .await
            .map_err(|err| LocatorError::Unavailable(err.to_string()))?;

        let mut nearby: Vec<(f64, DriverCandidate)> = drivers
            .into_iter()
            .filter(|driver| driver.is_dispatchable())
            .filter_map(|driver| {
                let location = driver.location?;
                let distance = haversine_m(&point, &location);
                (distance <= radius_m).then(|| {
                    (
                        distance,
                        DriverCandidate {
                            driver_id: driver.user_id,
                            location,
                        },
                    )
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(nearby.into_iter().map(|(_, candidate)| candidate).collect())
    }
}
