//! Compensating actions for flows that span more than one record.
//!
//! A compensation is retried on store errors until it either applies or its
//! guard stops matching. A guard mismatch means another actor already moved
//! the record on, so the system healed without us.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::engine::transition::{DriverTransition, RideTransition};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::Cas;

pub const ACCEPT_CLAIM: &str = "accept_claim";
pub const PAYMENT_ORDER: &str = "payment_order";
pub const DRIVER_RELEASE: &str = "driver_release";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationOutcome {
    Applied,
    /// The guard no longer matched: someone else resolved the record.
    AlreadyResolved,
}

impl CompensationOutcome {
    fn label(self) -> &'static str {
        match self {
            CompensationOutcome::Applied => "applied",
            CompensationOutcome::AlreadyResolved => "already_resolved",
        }
    }
}

fn backoff(state: &AppState, attempt: u32) -> Duration {
    Duration::from_millis(state.config.compensation_backoff_ms.saturating_mul(u64::from(attempt)))
}

fn record(state: &AppState, saga: &'static str, outcome: &'static str) {
    state
        .metrics
        .compensations_total
        .with_label_values(&[saga, outcome])
        .inc();
}

pub async fn compensate_ride(
    state: &AppState,
    ride_id: Uuid,
    transition: RideTransition,
    saga: &'static str,
) -> Result<CompensationOutcome, AppError> {
    let max_attempts = state.config.compensation_max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match lifecycle::attempt(state, ride_id, &transition).await {
            Ok(Cas::Applied(_)) => {
                warn!(ride_id = %ride_id, saga, transition = transition.name(), "compensation applied");
                record(state, saga, CompensationOutcome::Applied.label());
                return Ok(CompensationOutcome::Applied);
            }
            Ok(Cas::Rejected | Cas::Missing) => {
                warn!(
                    ride_id = %ride_id,
                    saga,
                    transition = transition.name(),
                    "compensation guard no longer matches; ride already resolved elsewhere"
                );
                record(state, saga, CompensationOutcome::AlreadyResolved.label());
                return Ok(CompensationOutcome::AlreadyResolved);
            }
            Err(err) => {
                warn!(ride_id = %ride_id, saga, attempt, error = %err, "compensation attempt failed; retrying");
                sleep(backoff(state, attempt)).await;
            }
        }
    }

    error!(ride_id = %ride_id, saga, transition = transition.name(), "compensation retries exhausted");
    record(state, saga, "exhausted");
    Err(AppError::Upstream(format!(
        "compensation {} for ride {ride_id} did not complete",
        transition.name()
    )))
}

/// Hands a driver back to the dispatchable pool. Availability never frees
/// itself, so every path that ends a driver's hold on a ride calls this.
pub async fn release_driver(
    state: &AppState,
    driver_id: &str,
) -> Result<CompensationOutcome, AppError> {
    let max_attempts = state.config.compensation_max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match state
            .store
            .transition_driver(driver_id, &DriverTransition::Release, state.now())
            .await
        {
            Ok(Cas::Applied(_)) => {
                record(state, DRIVER_RELEASE, CompensationOutcome::Applied.label());
                return Ok(CompensationOutcome::Applied);
            }
            Ok(Cas::Rejected | Cas::Missing) => {
                warn!(driver_id = %driver_id, "driver release guard failed; availability already settled");
                record(state, DRIVER_RELEASE, CompensationOutcome::AlreadyResolved.label());
                return Ok(CompensationOutcome::AlreadyResolved);
            }
            Err(err) => {
                warn!(driver_id = %driver_id, attempt, error = %err, "driver release failed; retrying");
                sleep(backoff(state, attempt)).await;
            }
        }
    }

    error!(driver_id = %driver_id, "driver release retries exhausted");
    record(state, DRIVER_RELEASE, "exhausted");
    Err(AppError::Upstream(format!("driver {driver_id} could not be released")))
}
