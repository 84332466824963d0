//! Named policies.
//!
//! Declarative expressions (see [`ExpressionSpec`](crate::ExpressionSpec))
//! refer to policies by name. A catalog maps those names to the policy
//! implementations registered by the application.

use crate::model::{FnPolicy, Policy, PolicyFuture, SyncFnPolicy};
use autonym_core::{BoxError, Meta, RequestView, ResponseView};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A registry of named policies.
#[derive(Clone, Default)]
pub struct PolicyCatalog {
    policies: HashMap<String, Arc<dyn Policy>>,
}

impl PolicyCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy under a name, replacing any previous one.
    ///
    /// # Arguments
    ///
    /// * `name` - The name expressions use to refer to the policy.
    /// * `policy` - The policy implementation.
    pub fn register(&mut self, name: impl Into<String>, policy: Arc<dyn Policy>) -> &mut Self {
        let name = name.into();
        debug!("Registered policy: {}", name);
        self.policies.insert(name, policy);
        self
    }

    /// Register an asynchronous closure. See [`FnPolicy`].
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut RequestView, &'a mut ResponseView, &'a mut Meta) -> PolicyFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let policy = FnPolicy::new(f).named(name.clone());
        self.register(name, Arc::new(policy))
    }

    /// Register a synchronous closure. See [`SyncFnPolicy`].
    pub fn register_sync_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut RequestView, &mut ResponseView, &mut Meta) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let policy = SyncFnPolicy::new(f).named(name.clone());
        self.register(name, Arc::new(policy))
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.policies.get(name).cloned()
    }

    /// Check if a policy is registered under a name.
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Get the registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}

impl fmt::Debug for PolicyCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("PolicyCatalog").field("policies", &names).finish()
    }
}
