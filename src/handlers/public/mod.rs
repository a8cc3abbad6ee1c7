// handlers/public/mod.rs - Endpoints reachable without a token
pub mod health;

pub use health::{health, root};
