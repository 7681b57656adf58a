use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{validate_jwt, Claims};
use crate::database::models::User;
use crate::error::ApiError;
use crate::services::access::AccessProfile;
use crate::state::AppState;
use crate::types::Role;

/// Authenticated caller: the verified token, the active user row behind it
/// and the caller's module/permission grants.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub access: AccessProfile,
    claims_json: Value,
}

impl AuthUser {
    pub fn new(claims: &Claims, user: &User, access: AccessProfile) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            access,
            claims_json: serde_json::to_value(claims).unwrap_or(Value::Null),
        }
    }

    /// Claims published to Postgres for the user-scoped client
    pub fn rls_claims(&self) -> &Value {
        &self.claims_json
    }

    pub fn require_module(&self, code: &str) -> Result<(), ApiError> {
        self.access.require_module(code)
    }

    pub fn require_permission(&self, code: &str) -> Result<(), ApiError> {
        self.access.require_permission(code)
    }
}

/// JWT authentication middleware: validates the bearer token, loads the
/// user with the service client and injects `AuthUser`.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;

    let claims = validate_jwt(&token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::unauthorized(e.to_string())
    })?;

    let mut conn = state.db.service().acquire().await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&mut *conn)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("User not found or inactive"))?;

    let access = AccessProfile::load(&mut *conn, user.id, user.role).await?;

    request.extensions_mut().insert(AuthUser::new(&claims, &user, access));
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer  "));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc.def.ghi");
    }
}
