//! CRUD methods and lifecycle stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A CRUD operation exposed by a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrudMethod {
    /// Insert a new record.
    Create,

    /// Query a list of records.
    Find,

    /// Fetch one record by id.
    FindOne,

    /// Partially update one record by id.
    FindOneAndUpdate,

    /// Delete one record by id.
    FindOneAndDelete,
}

impl CrudMethod {
    /// Every method, in declaration order.
    pub const ALL: [CrudMethod; 5] = [
        CrudMethod::Create,
        CrudMethod::Find,
        CrudMethod::FindOne,
        CrudMethod::FindOneAndUpdate,
        CrudMethod::FindOneAndDelete,
    ];

    /// Get the camelCase name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::FindOneAndUpdate => "findOneAndUpdate",
            Self::FindOneAndDelete => "findOneAndDelete",
        }
    }

    /// Check if this method carries a request body.
    ///
    /// Methods with a body run the schema stages.
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Create | Self::FindOneAndUpdate)
    }

    /// Check if this method addresses a single record by id.
    pub fn has_id(&self) -> bool {
        matches!(
            self,
            Self::FindOne | Self::FindOneAndUpdate | Self::FindOneAndDelete
        )
    }

    /// Check if this method changes stored state.
    pub fn is_writing(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::FindOneAndUpdate | Self::FindOneAndDelete
        )
    }

    /// Get the ordered authorization stages this method passes through.
    pub fn stages(&self) -> &'static [Stage] {
        if self.has_body() {
            &Stage::ALL
        } else {
            &[Stage::PreStore, Stage::PostStore]
        }
    }
}

impl fmt::Display for CrudMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named point in the lifecycle where a policy expression is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Before schema validation, against the raw input.
    PreSchema,

    /// After schema validation, against the sanitized input.
    PostSchema,

    /// Immediately before the store call.
    PreStore,

    /// After the store call, against the store result.
    PostStore,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::PreSchema,
        Stage::PostSchema,
        Stage::PreStore,
        Stage::PostStore,
    ];

    /// Get the camelCase name of this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreSchema => "preSchema",
            Self::PostSchema => "postSchema",
            Self::PreStore => "preStore",
            Self::PostStore => "postStore",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
