//! Route-layer guards built on the caller's `AccessProfile`.
//!
//! Use with `axum::middleware::from_fn_with_state("events", require_module)`
//! on a router that already sits behind `jwt_auth_middleware`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::error::ApiError;

fn caller(request: &Request) -> Result<&AuthUser, ApiError> {
    request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

pub async fn require_module(
    State(code): State<&'static str>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    caller(&request)?.require_module(code)?;
    Ok(next.run(request).await)
}

pub async fn require_permission(
    State(code): State<&'static str>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    caller(&request)?.require_permission(code)?;
    Ok(next.run(request).await)
}
