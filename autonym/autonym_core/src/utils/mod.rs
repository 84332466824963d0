//! Utility functions and types.
//!
//! Logging setup and the naming rules used to derive default routes.

pub mod logging;
pub mod naming;

pub use logging::{init_logging, LogLevel};
pub use naming::{default_route, kebab_case, pluralize};
