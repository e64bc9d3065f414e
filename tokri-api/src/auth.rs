use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use tokri_core::visibility::Party;

/// Who is calling. Session issuance lives upstream; by the time a
/// request reaches this service the gateway has resolved the caller into
/// a role and an actor label carried on headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub actor: String,
    pub role: Role,
}

impl Caller {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role != Role::Admin {
            return Err(AppError::Forbidden("admin role required"));
        }
        Ok(())
    }

    pub fn party(&self) -> Party {
        match self.role {
            Role::Customer => Party::Customer,
            Role::Admin => Party::Admin,
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = match parts
            .headers
            .get("x-role")
            .and_then(|v| v.to_str().ok())
        {
            Some("admin") => Role::Admin,
            _ => Role::Customer,
        };
        let actor = parts
            .headers
            .get("x-actor")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("anonymous")
            .to_string();

        Ok(Caller { actor, role })
    }
}
