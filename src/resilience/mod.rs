//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Detection request to backend:
//!     → circuit_breaker.rs (fail fast while the backend is considered down)
//!     → timeouts.rs (hard deadline on the upstream call)
//!     → outcome fed back into circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: failures are surfaced to the caller
//! - Time is read through `clock.rs` so state machines are testable

pub mod circuit_breaker;
pub mod clock;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitSnapshot, CircuitState, HalfOpenFailurePolicy, Rejected};
pub use clock::{Clock, ManualClock, SystemClock};
