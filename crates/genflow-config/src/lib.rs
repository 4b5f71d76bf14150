//! # Genflow Config
//!
//! TOML configuration for the genflow service, with `${VAR}` environment
//! substitution and `~` path expansion.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, MAX_DURATION_SECS, ValidationError, ValidationResult, ValidationWarning};
