//! Classification backend access.
//!
//! # Data Flow
//! ```text
//! orchestrator / handlers
//!     → client.rs (Upstream trait, reqwest implementation)
//!     → types.rs (wire bodies, UpstreamError)
//! ```
//!
//! # Design Decisions
//! - The trait is the seam tests replace with in-process fakes
//! - Non-2xx responses keep status and body for classification

pub mod client;
pub mod types;

pub use client::{HttpUpstream, Upstream};
pub use types::{Prediction, UpstreamError};
