pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod push;
pub mod routes;
pub mod services;
pub mod storage;
pub mod visibility;

pub use routes::app;
