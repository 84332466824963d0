//! # Autonym Policy
//!
//! `autonym_policy` provides the authorization layer of an Autonym
//! resource. Every CRUD method passes through a fixed list of stages, and
//! at each stage a boolean [`Expression`] decides whether the call may
//! continue.
//!
//! Key concepts:
//!
//! 1. **Policy**: An asynchronous check that either succeeds or fails with
//!    the reason for the denial.
//!
//! 2. **Expression**: A tree of literals, policies and `and`/`or`/`not`
//!    combinators, built once and evaluated fresh for every call.
//!
//! 3. **Policy Table**: The expression configured for each stage and
//!    method, defaulting to "always allow".
//!
//! 4. **Catalog**: Named policies that declarative expressions refer to.

pub mod catalog;
pub mod engine;
pub mod model;

// Re-export key types and traits for convenience
pub use catalog::PolicyCatalog;
pub use engine::{enforce, evaluate, Outcome, PolicyEvaluator};
pub use model::{
    Expression, ExpressionSpec, FnPolicy, Policy, PolicyFuture, PolicyTable, PolicyTableSpec,
    SyncFnPolicy,
};
