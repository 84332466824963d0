//! Core data types for Autonym.
//!
//! This module defines the vocabulary shared by every lifecycle component:
//! the CRUD methods and stages, the record representation, and the
//! request/response views handed to policies.

pub mod method;
pub mod record;
pub mod view;

pub use method::{CrudMethod, Stage};
pub use record::{defaults_deep, project_onto, Meta, Record};
pub use view::{RequestView, ResponseData, ResponseView};
