// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::DatabaseError;
use crate::export::ExportError;
use crate::filter::error::FilterError;
use crate::integrations::IntegrationError;

/// Postgres SQLSTATE codes mapped to client errors
const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
const PG_CHECK_VIOLATION: &str = "23514";
const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";
const PG_UNDEFINED_COLUMN: &str = "42703";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict {
        message: String,
        detail: Option<Value>,
    },

    // 422 Unprocessable Entity (validation but semantically valid JSON)
    UnprocessableEntity {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict { .. } => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict { message, .. } => message,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        });

        match self {
            ApiError::ValidationError { field_errors: Some(field_errors), .. }
            | ApiError::UnprocessableEntity { field_errors, .. } => {
                body["field_errors"] = json!(field_errors);
            }
            ApiError::Conflict { detail: Some(detail), .. } => {
                body["detail"] = detail.clone();
            }
            _ => {}
        }

        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::validation_error("Invalid field value", Some(field_errors))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            detail: None,
        }
    }

    pub fn conflict_with(message: impl Into<String>, detail: Value) -> Self {
        ApiError::Conflict {
            message: message.into(),
            detail: Some(detail),
        }
    }

    pub fn unprocessable_entity(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::UnprocessableEntity {
            message: message.into(),
            field_errors,
        }
    }

    /// Single-field semantic failure (e.g. an unknown reference)
    pub fn unprocessable_field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ApiError::unprocessable_entity("Request could not be processed", field_errors)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::from(DatabaseError::Sqlx(err))
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::ConfigMissing(what) => {
                tracing::error!("Database configuration missing: {}", what);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database URL is not a valid postgres URL");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::QueryError(msg) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Filter(e) => ApiError::from(e),
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            DatabaseError::Sqlx(sqlx::Error::RowNotFound) => ApiError::not_found("Record not found"),
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) => {
                tracing::error!("Database pool timed out");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => {
                let constraint = db_err.constraint().unwrap_or("constraint").to_string();
                match db_err.code().as_deref() {
                    Some(PG_UNIQUE_VIOLATION) => ApiError::conflict_with(
                        "Record already exists",
                        json!({ "constraint": constraint }),
                    ),
                    Some(PG_FOREIGN_KEY_VIOLATION) => ApiError::unprocessable_field(
                        &constraint,
                        "Referenced record does not exist or is still in use",
                    ),
                    Some(PG_CHECK_VIOLATION) => ApiError::validation_error(
                        format!("Value violates {}", constraint),
                        None,
                    ),
                    Some(PG_INSUFFICIENT_PRIVILEGE) => {
                        ApiError::forbidden("Row-level security denied this operation")
                    }
                    Some(PG_UNDEFINED_COLUMN) => {
                        tracing::warn!("Query referenced an unknown column: {}", db_err);
                        ApiError::bad_request("Unknown column in filter or order")
                    }
                    _ => {
                        tracing::error!("Database error: {}", db_err);
                        ApiError::internal_server_error("Database error occurred")
                    }
                }
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        tracing::error!("Integration error: {}", err);
        match err {
            IntegrationError::Disabled(what) => {
                ApiError::service_unavailable(format!("{} integration is disabled", what))
            }
            other => ApiError::bad_gateway(other.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        tracing::error!("Export error: {}", err);
        ApiError::internal_server_error("Failed to render document")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_variants() {
        assert_eq!(ApiError::unauthorized("x").status_code(), 401);
        assert_eq!(ApiError::forbidden("x").status_code(), 403);
        assert_eq!(ApiError::not_found("x").status_code(), 404);
        assert_eq!(ApiError::conflict("x").status_code(), 409);
        assert_eq!(ApiError::unprocessable_field("a", "b").status_code(), 422);
        assert_eq!(ApiError::bad_gateway("x").status_code(), 502);
    }

    #[test]
    fn json_body_has_envelope_fields() {
        let body = ApiError::not_found("Event not found").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Event not found");
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[test]
    fn conflict_detail_is_included() {
        let body = ApiError::conflict_with("Insufficient stock", json!({ "available": 2 })).to_json();
        assert_eq!(body["detail"]["available"], 2);
    }

    #[test]
    fn field_errors_are_included() {
        let body = ApiError::invalid_field("end_at", "must be after start_at").to_json();
        assert_eq!(body["field_errors"]["end_at"], "must be after start_at");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err: ApiError = DatabaseError::Sqlx(sqlx::Error::RowNotFound).into();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn disabled_integration_maps_to_503() {
        let err: ApiError = IntegrationError::Disabled("Calendar").into();
        assert_eq!(err.status_code(), 503);
        let err: ApiError = IntegrationError::Status { status: 500, body: "boom".into() }.into();
        assert_eq!(err.status_code(), 502);
    }
}
