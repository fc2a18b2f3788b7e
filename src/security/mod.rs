//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /api request:
//!     → rate_limit.rs (per-IP fixed window)
//!     → credential.rs (lift bearer token for forwarding)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Identity is verified by the backend, never by the gateway
//! - Tokens are opaque and never logged

pub mod credential;
pub mod rate_limit;

pub use credential::{extract, Credential, MissingCredential};
pub use rate_limit::{rate_limit_middleware, RateLimiterState};
