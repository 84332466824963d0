//! Declarative policy expressions.
//!
//! Manifests describe expressions as plain data: a boolean, the name of a
//! catalog policy, or an `and`/`or`/`not` object nesting further specs.
//!
//! ```json
//! { "and": ["isLoggedIn", { "or": ["isAdmin", "isOwner"] }] }
//! ```

use crate::catalog::PolicyCatalog;
use crate::model::expression::Expression;
use crate::model::table::PolicyTable;
use autonym_core::{ConfigurationError, CrudMethod, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable form of an [`Expression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpressionSpec {
    /// `true` or `false`.
    Literal(bool),

    /// The name of a policy in a [`PolicyCatalog`].
    Named(String),

    /// `{"and": [...]}`
    And {
        /// Operands
        and: Vec<ExpressionSpec>,
    },

    /// `{"or": [...]}`
    Or {
        /// Operands
        or: Vec<ExpressionSpec>,
    },

    /// `{"not": ...}`
    Not {
        /// Operand
        not: Box<ExpressionSpec>,
    },
}

/// Declarative policy table: stage, then method, then expression.
pub type PolicyTableSpec = BTreeMap<Stage, BTreeMap<CrudMethod, ExpressionSpec>>;

impl ExpressionSpec {
    /// Resolve policy names against a catalog.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Where named policies are looked up.
    /// * `resource` - The resource being configured, for error reporting.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigurationError::UnknownPolicy`] on the first name
    /// missing from the catalog.
    pub fn resolve(
        &self,
        catalog: &PolicyCatalog,
        resource: &str,
    ) -> Result<Expression, ConfigurationError> {
        let resolve_all = |specs: &[ExpressionSpec]| {
            specs
                .iter()
                .map(|spec| spec.resolve(catalog, resource))
                .collect::<Result<Vec<_>, _>>()
        };

        match self {
            Self::Literal(value) => Ok(Expression::Literal(*value)),
            Self::Named(name) => catalog.get(name).map(Expression::Policy).ok_or_else(|| {
                ConfigurationError::UnknownPolicy {
                    resource: resource.to_string(),
                    policy: name.clone(),
                }
            }),
            Self::And { and } => Ok(Expression::And(resolve_all(and)?)),
            Self::Or { or } => Ok(Expression::Or(resolve_all(or)?)),
            Self::Not { not } => Ok(Expression::not(not.resolve(catalog, resource)?)),
        }
    }
}

impl PolicyTable {
    /// Build a table from its declarative form.
    ///
    /// # Errors
    ///
    /// Fails if any expression names a policy missing from the catalog.
    pub fn from_spec(
        spec: &PolicyTableSpec,
        catalog: &PolicyCatalog,
        resource: &str,
    ) -> Result<Self, ConfigurationError> {
        let mut table = PolicyTable::new();
        for (stage, methods) in spec {
            for (method, expression) in methods {
                table.set(*stage, *method, expression.resolve(catalog, resource)?);
            }
        }
        Ok(table)
    }
}
