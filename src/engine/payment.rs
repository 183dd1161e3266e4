//! Payment sub-state machine: gateway orders, webhook confirmations, cash.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::fare::to_minor_units;
use crate::engine::lifecycle::{self, require_actor};
use crate::engine::saga::{self, PAYMENT_ORDER};
use crate::engine::transition::RideTransition;
use crate::error::{AppError, PolicyDenial};
use crate::gateway::{GatewayOrder, OrderRequest};
use crate::models::ride::{PaymentMethod, Ride};
use crate::state::AppState;

/// A gateway event whose signature was already verified upstream.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum PaymentEvent {
    #[serde(rename = "payment.captured")]
    Captured { order_id: String, payment_id: String },
    #[serde(rename = "payment.failed")]
    Failed {
        order_id: String,
        #[serde(default)]
        payment_id: Option<String>,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub ride: Ride,
    pub order: GatewayOrder,
}

fn count(state: &AppState, outcome: &str) {
    state
        .metrics
        .payments_total
        .with_label_values(&[outcome])
        .inc();
}

async fn require_method(
    state: &AppState,
    ride_id: Uuid,
    method: PaymentMethod,
) -> Result<Ride, AppError> {
    let ride = lifecycle::load(state, ride_id).await?;
    if ride.payment_method != method {
        return Err(PolicyDenial::PaymentMethodMismatch.into());
    }
    Ok(ride)
}

/// Marks the ride PROCESSING, creates a gateway order, then records its id.
/// A gateway failure reverts the ride to PENDING.
pub async fn initiate_payment(
    state: &AppState,
    ride_id: Uuid,
    rider_id: &str,
) -> Result<PaymentInitiation, AppError> {
    require_actor(rider_id)?;
    require_method(state, ride_id, PaymentMethod::Gateway).await?;

    let ride = lifecycle::apply(
        state,
        ride_id,
        &RideTransition::BeginPayment {
            rider_id: rider_id.to_string(),
        },
    )
    .await?;

    let request = OrderRequest {
        amount_minor: to_minor_units(ride.fare),
        currency: state.config.payment_currency.clone(),
        receipt: format!("ride_{}", ride.id.simple()),
        metadata: HashMap::from([
            ("ride_id".to_string(), ride.id.to_string()),
            ("rider_id".to_string(), ride.rider_id.clone()),
        ]),
    };

    let order = match state.gateway.create_order(request).await {
        Ok(order) => order,
        Err(err) => {
            warn!(ride_id = %ride_id, error = %err, "gateway order failed; reverting payment");
            count(state, "initiation_failed");
            saga::compensate_ride(state, ride_id, RideTransition::RevertPayment, PAYMENT_ORDER)
                .await?;
            return Err(AppError::Upstream(format!("payment initiation failed: {err}")));
        }
    };

    let ride = lifecycle::apply(
        state,
        ride_id,
        &RideTransition::RecordOrder {
            order_id: order.order_id.clone(),
        },
    )
    .await?;

    count(state, "initiated");
    info!(ride_id = %ride_id, order_id = %order.order_id, "payment order created");
    Ok(PaymentInitiation { ride, order })
}

/// Applies a verified gateway event. Replays find the ride no longer
/// PROCESSING and come back as conflicts without touching it.
pub async fn confirm_payment(state: &AppState, event: PaymentEvent) -> Result<Ride, AppError> {
    let (order_id, transition) = match event {
        PaymentEvent::Captured {
            order_id,
            payment_id,
        } => (
            order_id.clone(),
            RideTransition::SettlePayment {
                order_id,
                payment_id,
            },
        ),
        PaymentEvent::Failed { order_id, .. } => (
            order_id.clone(),
            RideTransition::FailPayment { order_id },
        ),
        PaymentEvent::Ignored => {
            return Err(AppError::conflict("payment event type is not handled"));
        }
    };

    let ride = state
        .store
        .ride_by_order(&order_id)
        .await?
        .ok_or_else(|| AppError::conflict(format!("no ride awaits payment order {order_id}")))?;

    let ride = lifecycle::apply(state, ride.id, &transition).await?;
    count(state, transition.name());
    info!(ride_id = %ride.id, order_id = %order_id, payment_status = ?ride.payment_status, "payment confirmation applied");
    Ok(ride)
}

pub async fn mark_paid_cash(state: &AppState, ride_id: Uuid, driver_id: &str) -> Result<Ride, AppError> {
    require_actor(driver_id)?;
    require_method(state, ride_id, PaymentMethod::Cash).await?;

    let ride = lifecycle::apply(
        state,
        ride_id,
        &RideTransition::MarkPaidCash {
            driver_id: driver_id.to_string(),
        },
    )
    .await?;

    count(state, "cash_paid");
    Ok(ride)
}
