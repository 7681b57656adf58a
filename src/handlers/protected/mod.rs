// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware, then a module guard per area. Handlers
// that write check the specific permission themselves.

pub mod calendar;
pub mod crew;
pub mod events;
pub mod offers;
pub mod users;
pub mod warehouse;
