// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) -> Protected (bearer JWT, profile ensured)
pub mod protected; // /api/* and /functions/*
pub mod public; // /, /health
