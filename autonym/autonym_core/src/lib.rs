//! # Autonym Core
//!
//! `autonym_core` provides the fundamental building blocks shared by every
//! Autonym crate: the error model, the CRUD vocabulary, record helpers and
//! the request/response views handed to policies.
//!
//! ## Core Principles
//!
//! 1. **One error type at the boundary**: Everything that fails inside a
//!    resource operation, whether a denied policy, a schema violation or a
//!    storage failure, is normalized into an [`AutonymError`] carrying a
//!    code, a message and an opaque data payload.
//!
//! 2. **Client-safe by promotion only**: An error exposes its message and
//!    data to the caller only after it has been explicitly promoted with
//!    [`AutonymError::to_client_error`] and its code is a client code.
//!
//! 3. **Records are plain JSON objects**: Resources exchange
//!    [`Record`](types::Record) values (`serde_json::Map`), so schemas,
//!    policies and stores all speak the same structure.
//!
//! ## Crate Structure
//!
//! - **error**: Error codes, the normalized error and configuration errors
//! - **types**: CRUD methods, lifecycle stages, records and views
//! - **utils**: Logging and naming helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use error::{AutonymError, BoxError, ConfigurationError, ErrorCode, Rejection, Result};
pub use types::{
    CrudMethod, Meta, Record, RequestView, ResponseData, ResponseView, Stage,
};
pub use utils::LogLevel;
