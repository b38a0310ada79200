//! Request admission.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → middleware.rs (peer address, request ID)
//!     → identity.rs (peer address → ClientIdentity)
//!     → pipeline.rs (observer → consumption limiter → window limiter)
//!     → Admitted: route handler
//!     → Rejected: JSON error envelope
//! ```

pub mod identity;
pub mod middleware;
pub mod pipeline;

pub use identity::resolve_identity;
pub use middleware::admission_middleware;
pub use pipeline::{AdmissionPipeline, AdmissionRequest, Denial, Outcome, QuotaHeaders, Stage, Verdict};
