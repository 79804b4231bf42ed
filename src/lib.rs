// Authoritative simulation core and binary socket protocol for the arena game server.

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod net;
pub mod worker_pool;
