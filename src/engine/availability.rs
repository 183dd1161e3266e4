use tracing::{debug, info};

use crate::engine::lifecycle::require_actor;
use crate::engine::transition::DriverTransition;
use crate::error::{AppError, PolicyDenial};
use crate::models::driver::{DriverProfile, GeoPoint};
use crate::state::AppState;
use crate::store::{Cas, StoreError};

async fn flip(
    state: &AppState,
    driver_id: &str,
    transition: &DriverTransition,
) -> Result<DriverProfile, AppError> {
    match state
        .store
        .transition_driver(driver_id, transition, state.now())
        .await?
    {
        Cas::Applied(driver) => {
            debug!(driver_id = %driver_id, transition = transition.name(), "driver profile updated");
            Ok(driver)
        }
        Cas::Rejected => Err(AppError::Conflict(format!(
            "driver {driver_id} cannot {} in its current state",
            transition.name()
        ))),
        Cas::Missing => Err(AppError::NotFound(format!("driver {driver_id} not found"))),
    }
}

pub async fn register_driver(state: &AppState, driver_id: &str) -> Result<DriverProfile, AppError> {
    require_actor(driver_id)?;
    let driver = DriverProfile::new(driver_id, state.now());

    match state.store.insert_driver(driver.clone()).await {
        Ok(()) => {
            info!(driver_id = %driver_id, "driver registered");
            Ok(driver)
        }
        Err(StoreError::Duplicate(_)) => Err(AppError::conflict(format!(
            "driver {driver_id} is already registered"
        ))),
        Err(err) => Err(err.into()),
    }
}

pub async fn driver_profile(state: &AppState, driver_id: &str) -> Result<DriverProfile, AppError> {
    state
        .store
        .driver(driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
}

pub async fn go_online(state: &AppState, driver_id: &str) -> Result<DriverProfile, AppError> {
    require_actor(driver_id)?;
    let driver = flip(state, driver_id, &DriverTransition::GoOnline).await?;
    state.metrics.online_drivers.inc();
    info!(driver_id = %driver_id, "driver online");
    Ok(driver)
}

pub async fn go_offline(state: &AppState, driver_id: &str) -> Result<DriverProfile, AppError> {
    require_actor(driver_id)?;

    if state.store.active_ride_for_driver(driver_id).await?.is_some() {
        return Err(PolicyDenial::DriverHasActiveRide.into());
    }

    // The flip itself refuses a claimed driver, so an accept that lands
    // after the read above still keeps the driver online.
    let driver = match flip(state, driver_id, &DriverTransition::GoOffline).await {
        Ok(driver) => driver,
        Err(AppError::Conflict(reason)) => {
            if state.store.active_ride_for_driver(driver_id).await?.is_some() {
                return Err(PolicyDenial::DriverHasActiveRide.into());
            }
            return Err(AppError::Conflict(reason));
        }
        Err(err) => return Err(err),
    };
    state.metrics.online_drivers.dec();
    info!(driver_id = %driver_id, "driver offline");
    Ok(driver)
}

pub async fn update_location(
    state: &AppState,
    driver_id: &str,
    point: GeoPoint,
) -> Result<DriverProfile, AppError> {
    require_actor(driver_id)?;

    if !(-90.0..=90.0).contains(&point.lat) {
        return Err(AppError::Validation("latitude is invalid".to_string()));
    }
    if !(-180.0..=180.0).contains(&point.lng) {
        return Err(AppError::Validation("longitude is invalid".to_string()));
    }

    flip(state, driver_id, &DriverTransition::Locate(point)).await
}

/// Takes an online, available driver out of the dispatch pool.
pub(crate) async fn claim(state: &AppState, driver_id: &str) -> Result<(), AppError> {
    flip(state, driver_id, &DriverTransition::Claim).await.map(|_| ())
}
