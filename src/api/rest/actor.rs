use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

/// The caller as established by the upstream auth layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn require_driver(&self) -> Result<&str, AppError> {
        match self.role {
            Role::Driver | Role::Admin => Ok(&self.id),
            Role::Rider => Err(AppError::Forbidden(
                "only drivers can perform this action".to_string(),
            )),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Validation(format!("{USER_ID_HEADER} header is required")))?
            .to_string();

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            None => Role::Rider,
            Some(raw) => match raw.trim().to_ascii_uppercase().as_str() {
                "RIDER" => Role::Rider,
                "DRIVER" => Role::Driver,
                "ADMIN" => Role::Admin,
                other => {
                    return Err(AppError::Validation(format!("unknown role: {other}")));
                }
            },
        };

        Ok(Actor { id, role })
    }
}
