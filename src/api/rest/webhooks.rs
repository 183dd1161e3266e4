use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tracing::debug;

use crate::engine::payment::{self, PaymentEvent};
use crate::error::AppError;
use crate::models::ride::PaymentStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/payments", post(payment_event))
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

/// Conflicts are acknowledged with 200 so the gateway stops redelivering:
/// a replayed or unknown event has nothing left to apply.
async fn payment_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<PaymentEvent>,
) -> Result<Json<WebhookAck>, AppError> {
    match payment::confirm_payment(&state, event).await {
        Ok(ride) => Ok(Json(WebhookAck {
            applied: true,
            payment_status: Some(ride.payment_status),
        })),
        Err(AppError::Conflict(reason)) => {
            debug!(%reason, "payment event not applied");
            Ok(Json(WebhookAck {
                applied: false,
                payment_status: None,
            }))
        }
        Err(err) => Err(err),
    }
}
