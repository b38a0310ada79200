//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (dotenvy) + config file (TOML)
//!     → loader.rs (parse & deserialize, apply SERVER_PORT / REDIS_URI / NODE_ENV)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → handed to startup, which builds the store and limiters once
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup and never mutated afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ConsumptionLimitConfig, Environment, FailurePolicy, GateConfig, IdentityConfig, ListenerConfig,
    LogFormat, MissingAddressPolicy, ObservabilityConfig, SecurityConfig, StoreBackend, StoreConfig,
    TimeoutConfig, WindowLimitConfig,
};
pub use validation::ValidationError;
