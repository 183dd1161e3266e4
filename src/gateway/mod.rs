use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
    #[error("payment gateway rejected order: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount_minor: u64,
    pub currency: String,
    pub receipt: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount_minor: u64,
    pub currency: String,
}

/// External payment gateway order creation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder, GatewayError>;
}

/// Issues local order ids without calling out. Used for development and tests.
#[derive(Debug, Default)]
pub struct SandboxGateway;

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<GatewayOrder, GatewayError> {
        if request.amount_minor == 0 {
            return Err(GatewayError::Rejected("amount must be > 0".to_string()));
        }

        Ok(GatewayOrder {
            order_id: format!("order_{}", Uuid::new_v4().simple()),
            amount_minor: request.amount_minor,
            currency: request.currency,
        })
    }
}
