// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) -> Protected (JWT auth) -> Elevated (JWT auth + users.manage)

pub mod elevated; // Tier 3: user administration
pub mod protected; // Tier 2: /api/*
pub mod public; // Tier 1: /, /health
