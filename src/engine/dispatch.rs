//! Time-bounded ride offers: broadcast, accept, reject and expiry.

use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::availability;
use crate::engine::lifecycle::{self, require_actor};
use crate::engine::saga::{self, ACCEPT_CLAIM};
use crate::engine::transition::{OfferSweep, OfferTransition, RideTransition};
use crate::error::{AppError, PolicyDenial};
use crate::models::dispatch::DispatchOffer;
use crate::models::ride::{Ride, RideStatus};
use crate::state::AppState;
use crate::store::Cas;

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub ride: Ride,
    pub offers: Vec<DispatchOffer>,
}

fn count_offers(state: &AppState, outcome: &str, n: usize) {
    if n > 0 {
        state
            .metrics
            .dispatch_offers_total
            .with_label_values(&[outcome])
            .inc_by(n as u64);
    }
}

/// Expires every pending offer whose window has closed.
pub async fn sweep_expired(state: &AppState) -> Result<usize, AppError> {
    let expired = state
        .store
        .expire_offers(&OfferSweep::Stale, state.now())
        .await?;
    count_offers(state, "expired", expired);
    Ok(expired)
}

/// Offers a searching ride to every dispatchable driver near its pickup.
/// An empty neighbourhood is a policy outcome; the ride stays SEARCHING.
pub async fn broadcast(state: &AppState, ride: &Ride) -> Result<Vec<DispatchOffer>, AppError> {
    let candidates = state
        .locator
        .find_nearby(ride.pickup.point, state.config.dispatch_radius_m)
        .await?;

    let candidates: Vec<_> = candidates
        .into_iter()
        .filter(|candidate| candidate.driver_id != ride.rider_id)
        .collect();

    if candidates.is_empty() {
        warn!(ride_id = %ride.id, "no drivers near pickup; ride left searching");
        return Err(PolicyDenial::NoDriversAvailable.into());
    }

    sweep_expired(state).await?;

    let now = state.now();
    let expires_at = now + Duration::seconds(state.config.offer_ttl_secs);
    let mut offers = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let offer = DispatchOffer::pending(ride.id, candidate.driver_id, now, expires_at);
        offers.push(state.store.put_pending_offer(offer).await?);
    }
    count_offers(state, "created", offers.len());

    info!(ride_id = %ride.id, offers = offers.len(), %expires_at, "ride broadcast to drivers");
    Ok(offers)
}

/// REQUESTED -> SEARCHING, then broadcast.
pub async fn begin_search(
    state: &AppState,
    ride_id: Uuid,
    rider_id: &str,
) -> Result<SearchOutcome, AppError> {
    require_actor(rider_id)?;
    let ride = lifecycle::mark_searching(state, ride_id, rider_id).await?;
    let offers = broadcast(state, &ride).await?;
    Ok(SearchOutcome { ride, offers })
}

/// Broadcasts again for a ride that is already searching, e.g. after a
/// driver withdrew or every offer lapsed. Never triggered implicitly.
pub async fn redispatch(
    state: &AppState,
    ride_id: Uuid,
    rider_id: &str,
) -> Result<SearchOutcome, AppError> {
    require_actor(rider_id)?;
    let ride = lifecycle::load(state, ride_id).await?;

    if ride.rider_id != rider_id {
        return Err(AppError::Forbidden("only the rider can redispatch a ride".to_string()));
    }
    if ride.status != RideStatus::Searching {
        return Err(AppError::conflict(format!("ride {ride_id} is not searching")));
    }

    let offers = broadcast(state, &ride).await?;
    Ok(SearchOutcome { ride, offers })
}

/// Accept saga: live offer check, ride-level accept, sibling expiry, offer
/// accept, driver claim. Once the ride-level accept has applied, any later
/// failure rolls the ride back to SEARCHING before the error is returned.
///
/// A rolled-back ride has no pending offers left: siblings were expired and
/// this driver's offer stays ACCEPTED for audit. The rider must call
/// [`redispatch`] to offer it again.
///
/// A cancel that lands between the offer accept and the claim finds the
/// driver still available and cannot release them. The ride is re-read
/// after the claim so such a driver is handed back here instead.
pub async fn accept_ride(state: &AppState, ride_id: Uuid, driver_id: &str) -> Result<Ride, AppError> {
    require_actor(driver_id)?;

    let now = state.now();
    let live = state
        .store
        .pending_offer(ride_id, driver_id)
        .await?
        .is_some_and(|offer| offer.is_live(now));
    if !live {
        return Err(AppError::conflict(format!(
            "no live offer of ride {ride_id} for driver {driver_id}"
        )));
    }

    lifecycle::assign_driver(state, ride_id, driver_id).await?;

    if let Err(err) = settle_acceptance(state, ride_id, driver_id).await {
        warn!(ride_id = %ride_id, driver_id = %driver_id, error = %err, "accept failed after assignment; rolling back");
        saga::compensate_ride(
            state,
            ride_id,
            RideTransition::RevertAccept {
                driver_id: driver_id.to_string(),
            },
            ACCEPT_CLAIM,
        )
        .await?;
        return Err(err);
    }

    let current = lifecycle::load(state, ride_id).await?;
    if !(current.is_driven_by(driver_id) && current.status.is_active_for_driver()) {
        warn!(ride_id = %ride_id, driver_id = %driver_id, status = ?current.status, "ride withdrawn during accept; releasing driver");
        saga::release_driver(state, driver_id).await?;
        return Err(AppError::conflict(format!(
            "ride {ride_id} was withdrawn while driver {driver_id} was accepting it"
        )));
    }

    count_offers(state, "accepted", 1);
    info!(ride_id = %ride_id, driver_id = %driver_id, "ride accepted");
    Ok(current)
}

async fn settle_acceptance(state: &AppState, ride_id: Uuid, driver_id: &str) -> Result<(), AppError> {
    let now = state.now();

    let expired = state
        .store
        .expire_offers(
            &OfferSweep::Siblings {
                ride_id,
                keep_driver: driver_id.to_string(),
            },
            now,
        )
        .await?;
    count_offers(state, "expired", expired);

    match state
        .store
        .transition_offer(ride_id, driver_id, OfferTransition::Accept, now)
        .await?
    {
        Cas::Applied(_) => {}
        Cas::Rejected | Cas::Missing => {
            return Err(AppError::conflict("offer was withdrawn before it was accepted"));
        }
    }

    availability::claim(state, driver_id).await
}

/// Declines one offer. The ride itself is untouched.
pub async fn reject_ride(
    state: &AppState,
    ride_id: Uuid,
    driver_id: &str,
) -> Result<DispatchOffer, AppError> {
    require_actor(driver_id)?;

    match state
        .store
        .transition_offer(ride_id, driver_id, OfferTransition::Reject, state.now())
        .await?
    {
        Cas::Applied(offer) => {
            count_offers(state, "rejected", 1);
            info!(ride_id = %ride_id, driver_id = %driver_id, "offer rejected");
            Ok(offer)
        }
        Cas::Rejected | Cas::Missing => Err(AppError::conflict(format!(
            "no live offer of ride {ride_id} for driver {driver_id}"
        ))),
    }
}

pub async fn offers(state: &AppState, ride_id: Uuid) -> Result<Vec<DispatchOffer>, AppError> {
    lifecycle::load(state, ride_id).await?;
    Ok(state.store.offers_for_ride(ride_id).await?)
}
