pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod filter;
pub mod handlers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

#[cfg(test)]
pub mod testing;
