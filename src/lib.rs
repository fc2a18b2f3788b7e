//! Resilient gateway in front of a spam classification backend.

pub mod admin;
pub mod config;
pub mod detection;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod storage;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
