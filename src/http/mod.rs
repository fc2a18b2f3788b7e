//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, input validation)
//!     → handlers.rs (detect, login, stats, health)
//!     → response.rs (Outcome → status + JSON)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
