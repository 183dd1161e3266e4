use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::actor::Actor;
use crate::engine::availability;
use crate::error::AppError;
use crate::models::driver::{DriverProfile, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver))
        .route("/drivers/go-online", post(go_online))
        .route("/drivers/go-offline", post(go_offline))
        .route("/drivers/location", post(update_location))
        .route("/drivers/:id", get(get_driver))
}

#[derive(Deserialize)]
pub struct LocationUpdateRequest {
    pub lat: f64,
    pub lng: f64,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<DriverProfile>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(availability::register_driver(&state, driver_id).await?))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DriverProfile>, AppError> {
    Ok(Json(availability::driver_profile(&state, &id).await?))
}

async fn go_online(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<DriverProfile>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(availability::go_online(&state, driver_id).await?))
}

async fn go_offline(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<DriverProfile>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(availability::go_offline(&state, driver_id).await?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<LocationUpdateRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    let driver_id = actor.require_driver()?;
    let point = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    Ok(Json(
        availability::update_location(&state, driver_id, point).await?,
    ))
}
