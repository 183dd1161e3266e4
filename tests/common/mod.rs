#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use ride_coordinator::clock::ManualClock;
use ride_coordinator::config::Config;
use ride_coordinator::engine::dispatch::{self, SearchOutcome};
use ride_coordinator::engine::lifecycle::{self, NewRide};
use ride_coordinator::engine::availability;
use ride_coordinator::models::driver::GeoPoint;
use ride_coordinator::models::ride::{PaymentMethod, Place, Ride};
use ride_coordinator::state::AppState;

pub const PICKUP: GeoPoint = GeoPoint {
    lat: 12.9716,
    lng: 77.5946,
};

pub fn test_config() -> Config {
    Config {
        compensation_backoff_ms: 1,
        ..Config::default()
    }
}

pub fn setup() -> (Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = AppState::in_memory_with_clock(test_config(), clock.clone());
    (Arc::new(state), clock)
}

pub fn advance(clock: &ManualClock, secs: i64) {
    clock.advance(Duration::seconds(secs));
}

pub fn new_ride(method: PaymentMethod) -> NewRide {
    NewRide {
        pickup: Place {
            label: "MG Road Metro".to_string(),
            point: PICKUP,
        },
        dropoff: Place {
            label: "Indiranagar".to_string(),
            point: GeoPoint {
                lat: 12.9784,
                lng: 77.6408,
            },
        },
        payment_method: method,
    }
}

/// Registers a driver, brings them online and parks them `offset` degrees
/// north of the pickup.
pub async fn online_driver(state: &AppState, driver_id: &str, offset: f64) {
    availability::register_driver(state, driver_id).await.unwrap();
    availability::go_online(state, driver_id).await.unwrap();
    availability::update_location(
        state,
        driver_id,
        GeoPoint {
            lat: PICKUP.lat + offset,
            lng: PICKUP.lng,
        },
    )
    .await
    .unwrap();
}

pub async fn searching_ride(state: &AppState, rider_id: &str, method: PaymentMethod) -> SearchOutcome {
    let ride = lifecycle::create_ride(state, rider_id, new_ride(method))
        .await
        .unwrap();
    dispatch::begin_search(state, ride.id, rider_id).await.unwrap()
}

/// A ride carried through to COMPLETED by `driver_id`.
pub async fn completed_ride(
    state: &AppState,
    rider_id: &str,
    driver_id: &str,
    method: PaymentMethod,
) -> Ride {
    let outcome = searching_ride(state, rider_id, method).await;
    let ride_id = outcome.ride.id;

    dispatch::accept_ride(state, ride_id, driver_id).await.unwrap();
    lifecycle::en_route(state, ride_id, driver_id).await.unwrap();
    let otp = lifecycle::ride_otp(state, ride_id, rider_id).await.unwrap();
    lifecycle::start_ride(state, ride_id, driver_id, &otp)
        .await
        .unwrap();
    lifecycle::complete_ride(state, ride_id, driver_id)
        .await
        .unwrap()
}
