// handlers/elevated/mod.rs - Elevated handlers (users.manage required)
//
// Route Prefix: /api/users/*
// Middleware: jwt_auth_middleware + require_permission("users.manage")

pub mod users;

/// Permission guarding every elevated route
pub const USERS_MANAGE: &str = "users.manage";
