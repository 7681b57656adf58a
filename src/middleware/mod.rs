pub mod access;
pub mod auth;
pub mod response;

pub use access::{require_module, require_permission};
pub use auth::{jwt_auth_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult, FileDownload};
