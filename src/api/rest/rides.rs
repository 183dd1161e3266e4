use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::actor::Actor;
use crate::engine::dispatch::{self, SearchOutcome};
use crate::engine::lifecycle::{self, NewRide};
use crate::engine::payment::{self, PaymentInitiation};
use crate::error::AppError;
use crate::models::dispatch::DispatchOffer;
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/otp", get(get_otp))
        .route("/rides/:id/offers", get(list_offers))
        .route("/rides/:id/search", post(search_ride))
        .route("/rides/:id/dispatch", post(redispatch_ride))
        .route("/rides/:id/accept", post(accept_ride))
        .route("/rides/:id/reject", post(reject_ride))
        .route("/rides/:id/enroute", post(enroute_ride))
        .route("/rides/:id/start", post(start_ride))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/cancel", post(cancel_ride))
        .route("/rides/:id/pay", post(pay_for_ride))
        .route("/rides/:id/mark-paid", post(mark_paid))
}

#[derive(Deserialize)]
pub struct StartRideRequest {
    pub otp: String,
}

#[derive(Serialize)]
pub struct OtpResponse {
    pub otp: String,
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewRide>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(lifecycle::create_ride(&state, &actor.id, payload).await?))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(lifecycle::get_ride(&state, id).await?))
}

async fn get_otp(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<OtpResponse>, AppError> {
    let otp = lifecycle::ride_otp(&state, id, &actor.id).await?;
    Ok(Json(OtpResponse { otp }))
}

async fn list_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DispatchOffer>>, AppError> {
    Ok(Json(dispatch::offers(&state, id).await?))
}

async fn search_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<SearchOutcome>, AppError> {
    Ok(Json(dispatch::begin_search(&state, id, &actor.id).await?))
}

async fn redispatch_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<SearchOutcome>, AppError> {
    Ok(Json(dispatch::redispatch(&state, id, &actor.id).await?))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(dispatch::accept_ride(&state, id, driver_id).await?))
}

async fn reject_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DispatchOffer>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(dispatch::reject_ride(&state, id, driver_id).await?))
}

async fn enroute_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(lifecycle::en_route(&state, id, driver_id).await?))
}

async fn start_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(
        lifecycle::start_ride(&state, id, driver_id, &payload.otp).await?,
    ))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(lifecycle::complete_ride(&state, id, driver_id).await?))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(lifecycle::cancel_ride(&state, id, &actor.id).await?))
}

async fn pay_for_ride(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentInitiation>, AppError> {
    Ok(Json(payment::initiate_payment(&state, id, &actor.id).await?))
}

async fn mark_paid(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = actor.require_driver()?;
    Ok(Json(payment::mark_paid_cash(&state, id, driver_id).await?))
}
