//! Per-stage, per-method policy table.

use crate::model::expression::Expression;
use autonym_core::{CrudMethod, Stage};
use std::collections::HashMap;

static ALLOW: Expression = Expression::Literal(true);

/// The expression configured for each (stage, method) pair.
///
/// Pairs without an entry are always allowed.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    entries: HashMap<(Stage, CrudMethod), Expression>,
}

impl PolicyTable {
    /// Create a table that allows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expression for a stage and method, replacing any previous one.
    pub fn set(&mut self, stage: Stage, method: CrudMethod, expression: impl Into<Expression>) {
        self.entries.insert((stage, method), expression.into());
    }

    /// Builder form of [`PolicyTable::set`].
    pub fn with(mut self, stage: Stage, method: CrudMethod, expression: impl Into<Expression>) -> Self {
        self.set(stage, method, expression);
        self
    }

    /// Get the expression for a stage and method.
    pub fn get(&self, stage: Stage, method: CrudMethod) -> &Expression {
        self.entries.get(&(stage, method)).unwrap_or(&ALLOW)
    }

    /// Check if an explicit expression is configured for a stage and method.
    pub fn contains(&self, stage: Stage, method: CrudMethod) -> bool {
        self.entries.contains_key(&(stage, method))
    }

    /// Iterate over every explicitly configured entry.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, CrudMethod, &Expression)> {
        self.entries
            .iter()
            .map(|((stage, method), expression)| (*stage, *method, expression))
    }

    /// Get the number of explicitly configured entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entry is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entries_allow() {
        let table = PolicyTable::new().with(Stage::PreStore, CrudMethod::Find, false);
        assert!(matches!(
            table.get(Stage::PreStore, CrudMethod::Find),
            Expression::Literal(false)
        ));
        assert!(matches!(
            table.get(Stage::PostStore, CrudMethod::Find),
            Expression::Literal(true)
        ));
        assert!(!table.contains(Stage::PreStore, CrudMethod::Create));
        assert_eq!(table.len(), 1);
    }
}
