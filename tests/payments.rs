mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{completed_ride, online_driver, setup, test_config};
use ride_coordinator::clock::ManualClock;
use ride_coordinator::engine::payment::{self, PaymentEvent};
use ride_coordinator::error::{AppError, PolicyDenial};
use ride_coordinator::gateway::{GatewayError, GatewayOrder, OrderRequest, PaymentGateway};
use ride_coordinator::locator::StoreLocator;
use ride_coordinator::models::ride::{PaymentMethod, PaymentStatus};
use ride_coordinator::state::AppState;
use ride_coordinator::store::memory::InMemoryStore;
use ride_coordinator::store::StateStore;

struct DownGateway;

#[async_trait]
impl PaymentGateway for DownGateway {
    async fn create_order(&self, _request: OrderRequest) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::Unavailable("connect timeout".to_string()))
    }
}

fn state_with_gateway(gateway: Arc<dyn PaymentGateway>) -> Arc<AppState> {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    Arc::new(AppState::new(
        test_config(),
        store.clone(),
        Arc::new(StoreLocator::new(store)),
        gateway,
        Arc::new(ManualClock::new(Utc::now())),
    ))
}

fn captured(order_id: &str, payment_id: &str) -> PaymentEvent {
    PaymentEvent::Captured {
        order_id: order_id.to_string(),
        payment_id: payment_id.to_string(),
    }
}

#[tokio::test]
async fn gateway_payment_settles_once() {
    let (state, _clock) = setup();
    online_driver(&state, "d1", 0.001).await;
    let ride = completed_ride(&state, "r1", "d1", PaymentMethod::Gateway).await;

    let initiated = payment::initiate_payment(&state, ride.id, "r1").await.unwrap();
    assert_eq!(initiated.ride.payment_status, PaymentStatus::Processing);
    assert_eq!(
        initiated.ride.gateway_order_id.as_deref(),
        Some(initiated.order.order_id.as_str())
    );
    assert_eq!(initiated.order.amount_minor, u64::from(ride.fare) * 100);
    assert_eq!(initiated.order.currency, "INR");

    // The order is already recorded; a second initiation is refused.
    assert!(matches!(
        payment::initiate_payment(&state, ride.id, "r1").await,
        Err(AppError::Conflict(_))
    ));

    let order_id = initiated.order.order_id;
    let paid = payment::confirm_payment(&state, captured(&order_id, "pay_1"))
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.gateway_payment_id.as_deref(), Some("pay_1"));

    let replay = payment::confirm_payment(&state, captured(&order_id, "pay_1")).await;
    assert!(matches!(replay, Err(AppError::Conflict(_))));
    let failed_late = payment::confirm_payment(
        &state,
        PaymentEvent::Failed {
            order_id: order_id.clone(),
            payment_id: None,
        },
    )
    .await;
    assert!(matches!(failed_late, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn failed_payment_can_be_retried_with_a_new_order() {
    let (state, _clock) = setup();
    online_driver(&state, "d1", 0.001).await;
    let ride = completed_ride(&state, "r1", "d1", PaymentMethod::Gateway).await;

    let first = payment::initiate_payment(&state, ride.id, "r1").await.unwrap();
    let failed = payment::confirm_payment(
        &state,
        PaymentEvent::Failed {
            order_id: first.order.order_id.clone(),
            payment_id: Some("pay_declined".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);

    let second = payment::initiate_payment(&state, ride.id, "r1").await.unwrap();
    assert_ne!(second.order.order_id, first.order.order_id);

    // Confirmation against the superseded order matches nothing.
    assert!(matches!(
        payment::confirm_payment(&state, captured(&first.order.order_id, "pay_2")).await,
        Err(AppError::Conflict(_))
    ));

    let paid = payment::confirm_payment(&state, captured(&second.order.order_id, "pay_3"))
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn gateway_outage_reverts_to_pending() {
    let state = state_with_gateway(Arc::new(DownGateway));
    online_driver(&state, "d1", 0.001).await;
    let ride = completed_ride(&state, "r1", "d1", PaymentMethod::Gateway).await;

    let err = payment::initiate_payment(&state, ride.id, "r1").await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));

    let ride = state.store.ride(ride.id).await.unwrap().unwrap();
    assert_eq!(ride.payment_status, PaymentStatus::Pending);
    assert!(ride.gateway_order_id.is_none());
}

#[tokio::test]
async fn payment_requires_a_completed_ride_and_its_rider() {
    let (state, _clock) = setup();
    online_driver(&state, "d1", 0.001).await;
    let searching = common::searching_ride(&state, "r1", PaymentMethod::Gateway).await;
    assert!(matches!(
        payment::initiate_payment(&state, searching.ride.id, "r1").await,
        Err(AppError::Conflict(_))
    ));

    let ride = completed_ride(&state, "r2", "d1", PaymentMethod::Gateway).await;
    assert!(matches!(
        payment::initiate_payment(&state, ride.id, "someone-else").await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn cash_is_confirmed_by_the_driver_once() {
    let (state, _clock) = setup();
    online_driver(&state, "d1", 0.001).await;
    let ride = completed_ride(&state, "r1", "d1", PaymentMethod::Cash).await;

    assert!(matches!(
        payment::mark_paid_cash(&state, ride.id, "d2").await,
        Err(AppError::Conflict(_))
    ));

    let paid = payment::mark_paid_cash(&state, ride.id, "d1").await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    assert!(matches!(
        payment::mark_paid_cash(&state, ride.id, "d1").await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn payment_method_must_match_the_flow() {
    let (state, _clock) = setup();
    online_driver(&state, "d1", 0.001).await;
    let gateway_ride = completed_ride(&state, "r1", "d1", PaymentMethod::Gateway).await;
    let cash_ride = completed_ride(&state, "r2", "d1", PaymentMethod::Cash).await;

    assert!(matches!(
        payment::mark_paid_cash(&state, gateway_ride.id, "d1").await,
        Err(AppError::Policy(PolicyDenial::PaymentMethodMismatch))
    ));
    assert!(matches!(
        payment::initiate_payment(&state, cash_ride.id, "r2").await,
        Err(AppError::Policy(PolicyDenial::PaymentMethodMismatch))
    ));
}

#[test]
fn webhook_payloads_decode_by_type() {
    let captured: PaymentEvent = serde_json::from_str(
        r#"{"type":"payment.captured","order_id":"order_1","payment_id":"pay_1"}"#,
    )
    .unwrap();
    assert_eq!(
        captured,
        PaymentEvent::Captured {
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string()
        }
    );

    let failed: PaymentEvent =
        serde_json::from_str(r#"{"type":"payment.failed","order_id":"order_1"}"#).unwrap();
    assert!(matches!(failed, PaymentEvent::Failed { payment_id: None, .. }));

    let other: PaymentEvent =
        serde_json::from_str(r#"{"type":"refund.created","refund_id":"rf_1"}"#).unwrap();
    assert_eq!(other, PaymentEvent::Ignored);
}
