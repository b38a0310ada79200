//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID set and propagated)
//!     → admission (rate limits; may short-circuit)
//!     → routes.rs (health, echo, or application routes)
//!     → response.rs (error envelope for every failure)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{AppError, ErrorEnvelope};
pub use server::{build_router, GateServer};
