//! Detection subsystem: the resilience core of the gateway.
//!
//! # Data Flow
//! ```text
//! handler (credential, text, request id)
//!     → orchestrator.rs (breaker permission, deadline, one upstream attempt)
//!     → classify.rs (failure → Outcome)
//!     → outcome.rs (Outcome, DetectionResult)
//!     → http/response.rs (Outcome → status + JSON)
//! ```

pub mod classify;
pub mod orchestrator;
pub mod outcome;

pub use classify::classify;
pub use orchestrator::{CallAttempt, Orchestrator};
pub use outcome::{DetectionResult, Outcome, UnreachableCause};
