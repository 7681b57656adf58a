use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Module {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub code: String,
    pub module_code: String,
    pub description: Option<String>,
}

/// Module and permission codes granted to one user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGrants {
    pub modules: Vec<String>,
    pub permissions: Vec<String>,
}
