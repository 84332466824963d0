//! Policy models.
//!
//! This module defines policies, expression trees, the per-stage policy
//! table and the declarative form of expressions.

pub mod declaration;
pub mod expression;
pub mod table;

pub use declaration::{ExpressionSpec, PolicyTableSpec};
pub use expression::{Expression, FnPolicy, Policy, PolicyFuture, SyncFnPolicy};
pub use table::PolicyTable;
