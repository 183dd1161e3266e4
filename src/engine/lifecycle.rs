//! Ride lifecycle operations. Every mutation goes through [`attempt`], which
//! runs one conditional transition against the store and records the outcome.

use std::time::Instant;

use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::fare::compute_fare;
use crate::engine::saga;
use crate::engine::transition::{OfferSweep, RideTransition};
use crate::error::{AppError, PolicyDenial};
use crate::models::event::RideEvent;
use crate::models::ride::{PaymentMethod, Place, Ride, RideStatus};
use crate::state::AppState;
use crate::store::{Cas, StoreError};

const CANCEL_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRide {
    pub pickup: Place,
    pub dropoff: Place,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

pub(crate) fn require_actor(actor_id: &str) -> Result<(), AppError> {
    if actor_id.trim().is_empty() {
        return Err(AppError::Validation("actor identity is required".to_string()));
    }
    Ok(())
}

fn validate_place(name: &str, place: &Place) -> Result<(), AppError> {
    if place.label.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} label cannot be empty")));
    }
    if !place.point.is_valid() {
        return Err(AppError::Validation(format!("{name} coordinates are out of range")));
    }
    Ok(())
}

pub(crate) fn generate_otp() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// Runs one conditional ride transition, logging, counting and publishing it.
pub(crate) async fn attempt(
    state: &AppState,
    ride_id: Uuid,
    transition: &RideTransition,
) -> Result<Cas<Ride>, StoreError> {
    let start = Instant::now();
    let outcome = state
        .store
        .transition_ride(ride_id, transition, state.now())
        .await;

    let label = match &outcome {
        Ok(Cas::Applied(ride)) => {
            info!(
                ride_id = %ride_id,
                transition = transition.name(),
                status = ?ride.status,
                payment_status = ?ride.payment_status,
                "ride transition applied"
            );
            let _ = state
                .ride_events_tx
                .send(RideEvent::from_ride(transition.name(), ride));
            "applied"
        }
        Ok(Cas::Rejected) => {
            debug!(ride_id = %ride_id, transition = transition.name(), "ride transition guard failed");
            "conflict"
        }
        Ok(Cas::Missing) => "missing",
        Err(err) => {
            warn!(ride_id = %ride_id, transition = transition.name(), error = %err, "ride transition errored");
            "error"
        }
    };

    state
        .metrics
        .ride_transitions_total
        .with_label_values(&[transition.name(), label])
        .inc();
    state
        .metrics
        .transition_latency_seconds
        .with_label_values(&[transition.name()])
        .observe(start.elapsed().as_secs_f64());

    outcome
}

/// Like [`attempt`], mapping a failed guard to `Conflict`. The conflict
/// message names only the transition, never which guard failed.
pub(crate) async fn apply(
    state: &AppState,
    ride_id: Uuid,
    transition: &RideTransition,
) -> Result<Ride, AppError> {
    match attempt(state, ride_id, transition).await? {
        Cas::Applied(ride) => Ok(ride),
        Cas::Rejected => Err(AppError::Conflict(format!(
            "ride {ride_id} cannot {} in its current state",
            transition.name()
        ))),
        Cas::Missing => Err(AppError::NotFound(format!("ride {ride_id} not found"))),
    }
}

pub(crate) async fn load(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    state
        .store
        .ride(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))
}

pub async fn create_ride(state: &AppState, rider_id: &str, request: NewRide) -> Result<Ride, AppError> {
    require_actor(rider_id)?;
    validate_place("pickup", &request.pickup)?;
    validate_place("dropoff", &request.dropoff)?;

    let fare = compute_fare(&state.config, &request.pickup.point, &request.dropoff.point);
    let ride = Ride::requested(
        rider_id,
        request.pickup,
        request.dropoff,
        request.payment_method,
        fare,
        state.now(),
    );

    state.store.insert_ride(ride.clone()).await?;
    let _ = state.ride_events_tx.send(RideEvent::from_ride("requested", &ride));
    info!(ride_id = %ride.id, rider_id = %rider_id, fare = ride.fare, "ride requested");

    Ok(ride)
}

pub async fn get_ride(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    load(state, ride_id).await
}

/// The start code, readable only by the ride's rider while a driver is on the way.
pub async fn ride_otp(state: &AppState, ride_id: Uuid, rider_id: &str) -> Result<String, AppError> {
    require_actor(rider_id)?;
    let ride = load(state, ride_id).await?;

    if ride.rider_id != rider_id {
        return Err(AppError::Forbidden("only the rider can read the start code".to_string()));
    }

    ride.otp_code
        .ok_or_else(|| AppError::conflict(format!("ride {ride_id} has no active start code")))
}

/// REQUESTED -> SEARCHING. Dispatch is triggered by the caller
/// (see `dispatch::begin_search`).
pub(crate) async fn mark_searching(
    state: &AppState,
    ride_id: Uuid,
    rider_id: &str,
) -> Result<Ride, AppError> {
    apply(
        state,
        ride_id,
        &RideTransition::BeginSearch {
            rider_id: rider_id.to_string(),
        },
    )
    .await
}

/// Ride-level half of an accept. Only the dispatch accept saga calls this.
pub(crate) async fn assign_driver(
    state: &AppState,
    ride_id: Uuid,
    driver_id: &str,
) -> Result<Ride, AppError> {
    apply(
        state,
        ride_id,
        &RideTransition::Accept {
            driver_id: driver_id.to_string(),
            otp: generate_otp(),
        },
    )
    .await
}

pub async fn en_route(state: &AppState, ride_id: Uuid, driver_id: &str) -> Result<Ride, AppError> {
    require_actor(driver_id)?;
    apply(
        state,
        ride_id,
        &RideTransition::EnRoute {
            driver_id: driver_id.to_string(),
        },
    )
    .await
}

/// Wrong code and wrong state produce the same conflict.
pub async fn start_ride(
    state: &AppState,
    ride_id: Uuid,
    driver_id: &str,
    otp: &str,
) -> Result<Ride, AppError> {
    require_actor(driver_id)?;
    apply(
        state,
        ride_id,
        &RideTransition::Start {
            driver_id: driver_id.to_string(),
            otp: otp.trim().to_string(),
        },
    )
    .await
}

pub async fn complete_ride(state: &AppState, ride_id: Uuid, driver_id: &str) -> Result<Ride, AppError> {
    require_actor(driver_id)?;
    let ride = apply(
        state,
        ride_id,
        &RideTransition::Complete {
            driver_id: driver_id.to_string(),
        },
    )
    .await?;

    saga::release_driver(state, driver_id).await?;
    Ok(ride)
}

/// Rider-cancel first, then driver-cancel. The rider path pins the driver it
/// observed, so whoever was assigned at the moment of cancelling is the one
/// released.
pub async fn cancel_ride(state: &AppState, ride_id: Uuid, actor_id: &str) -> Result<Ride, AppError> {
    require_actor(actor_id)?;

    for _ in 0..CANCEL_ATTEMPTS {
        let observed = load(state, ride_id).await?;

        let rider_cancel = RideTransition::RiderCancel {
            rider_id: actor_id.to_string(),
            assigned: observed.driver_id.clone(),
        };
        if let Cas::Applied(ride) = attempt(state, ride_id, &rider_cancel).await? {
            state
                .store
                .expire_offers(&OfferSweep::Ride { ride_id }, state.now())
                .await?;
            if let Some(driver_id) = observed.driver_id.as_deref() {
                saga::release_driver(state, driver_id).await?;
            }
            info!(ride_id = %ride_id, rider_id = %actor_id, "ride cancelled by rider");
            return Ok(ride);
        }

        let driver_cancel = RideTransition::DriverCancel {
            driver_id: actor_id.to_string(),
        };
        if let Cas::Applied(ride) = attempt(state, ride_id, &driver_cancel).await? {
            saga::release_driver(state, actor_id).await?;
            info!(ride_id = %ride_id, driver_id = %actor_id, "driver withdrew; ride back to searching");
            return Ok(ride);
        }

        let current = load(state, ride_id).await?;
        let unchanged = current.status == observed.status && current.driver_id == observed.driver_id;
        if unchanged || is_settled(current.status) {
            break;
        }
    }

    Err(PolicyDenial::NotCancellable.into())
}

fn is_settled(status: RideStatus) -> bool {
    matches!(
        status,
        RideStatus::Started | RideStatus::Completed | RideStatus::Cancelled
    )
}
