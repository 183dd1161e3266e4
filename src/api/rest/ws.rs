use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::event::RideEvent;
use crate::state::AppState;

/// `GET /ws?ride_id=<uuid>` follows one ride; without it every ride event is sent.
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub ride_id: Option<Uuid>,
}

impl EventFilter {
    pub fn wants(&self, event: &RideEvent) -> bool {
        self.ride_id.is_none_or(|ride_id| ride_id == event.ride_id)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_ride_events(socket, state, filter))
}

async fn stream_ride_events(socket: WebSocket, state: Arc<AppState>, filter: EventFilter) {
    let (mut sink, mut inbound) = socket.split();
    let mut events = state.ride_events_tx.subscribe();

    debug!(ride_id = ?filter.ride_id, "ride event subscriber connected");

    let forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) if filter.wants(&event) => event,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ride event subscriber lagging; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Ok(payload) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames carry nothing; reading them only detects the close.
    let drain = tokio::spawn(async move { while let Some(Ok(_)) = inbound.next().await {} });

    tokio::select! {
        _ = forward => {},
        _ = drain => {},
    }

    debug!("ride event subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::EventFilter;
    use crate::models::event::RideEvent;
    use crate::models::ride::{PaymentStatus, RideStatus};

    fn event(ride_id: Uuid) -> RideEvent {
        RideEvent {
            ride_id,
            kind: "accept",
            status: RideStatus::Accepted,
            payment_status: PaymentStatus::Pending,
            driver_id: Some("d1".to_string()),
            at: Utc::now(),
        }
    }

    #[test]
    fn filter_follows_one_ride_or_all() {
        let followed = Uuid::new_v4();
        let other = Uuid::new_v4();

        let one = EventFilter {
            ride_id: Some(followed),
        };
        assert!(one.wants(&event(followed)));
        assert!(!one.wants(&event(other)));

        let all = EventFilter::default();
        assert!(all.wants(&event(followed)));
        assert!(all.wants(&event(other)));
    }
}
