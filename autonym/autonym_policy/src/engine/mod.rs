//! Policy evaluation engine.
//!
//! This module provides functionality for evaluating expressions.

mod evaluator;

pub use evaluator::{enforce, evaluate, Outcome, PolicyEvaluator};
