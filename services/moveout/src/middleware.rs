//! Session extraction and request logging
//!
//! Bearer-token validation is an axum extractor so that handlers declare
//! authentication in their signature; mixed public/protected method
//! routers then need no per-route layering.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{error, info};

use crate::{AppState, error::ApiError, models::Role};

/// Authenticated customer extracted from the session token
///
/// A missing token rejects with 403; a malformed, expired, or badly
/// signed token rejects with 500. This pairing is the service's
/// long-standing observable contract.
#[derive(Debug, Clone, Copy)]
pub struct AuthCustomer {
    pub customer_id: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Forbidden("No token provided.".to_string()))?;

        let claims = state.jwt_service.validate_token(token).map_err(|e| {
            error!("Failed to authenticate token: {}", e);
            ApiError::InternalServerError
        })?;

        Ok(AuthCustomer {
            customer_id: claims.sub,
        })
    }
}

/// Log incoming requests to see who accesses the server on what route
pub async fn log_request(req: Request<Body>, next: Next) -> Response {
    info!("Got request on {} ({})", req.uri().path(), req.method());
    next.run(req).await
}

/// Look up the caller and require the admin role
///
/// The session token carries only the customer id, so the role is re-read
/// from the store on every admin call.
pub async fn require_admin(state: &AppState, customer_id: i64) -> Result<(), ApiError> {
    let customer = state
        .customer_repository
        .find_by_id(customer_id)
        .await
        .map_err(|e| {
            error!("Failed to load caller {}: {}", customer_id, e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::Forbidden("Unknown customer.".to_string()))?;

    if customer.role != Role::Admin {
        return Err(ApiError::Forbidden("Admin role required.".to_string()));
    }

    Ok(())
}
