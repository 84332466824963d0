//! Resource Registry
//!
//! Holds the resources of an application and routes operations to them by
//! route segment. The route index is rebuilt whenever a resource is
//! registered.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, info};

use autonym_core::{AutonymError, ConfigurationError, CrudMethod, Meta, Record, ResponseData};

use crate::resource::Resource;

/// An operation routed through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create a record from the raw input.
    Create(Record),

    /// Find records matching a query.
    Find(Record),

    /// Find one record by id.
    FindOne(String),

    /// Partially update one record by id.
    FindOneAndUpdate(String, Record),

    /// Delete one record by id.
    FindOneAndDelete(String),
}

impl Operation {
    /// Get the CRUD method of this operation.
    pub fn method(&self) -> CrudMethod {
        match self {
            Self::Create(_) => CrudMethod::Create,
            Self::Find(_) => CrudMethod::Find,
            Self::FindOne(_) => CrudMethod::FindOne,
            Self::FindOneAndUpdate(..) => CrudMethod::FindOneAndUpdate,
            Self::FindOneAndDelete(_) => CrudMethod::FindOneAndDelete,
        }
    }
}

/// The successful result of a dispatched operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// HTTP-style status: 201 for create, 200 otherwise.
    pub status: u16,

    /// The record or records returned.
    pub data: ResponseData,
}

#[derive(Default)]
struct Index {
    /// Resources by name
    resources: HashMap<String, Arc<Resource>>,

    /// Resource names by route
    routes: HashMap<String, String>,
}

impl Index {
    fn rebuild_routes(&mut self) {
        self.routes = self
            .resources
            .values()
            .map(|resource| (resource.route().to_string(), resource.name().to_string()))
            .collect();
    }
}

/// The resources of an application.
#[derive(Default)]
pub struct ResourceRegistry {
    index: RwLock<Index>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource.
    ///
    /// # Errors
    ///
    /// Fails if a resource with the same name or route is already
    /// registered.
    pub async fn register(&self, resource: Resource) -> Result<Arc<Resource>, ConfigurationError> {
        let mut index = self.index.write().await;

        if index.resources.contains_key(resource.name()) {
            return Err(ConfigurationError::DuplicateName(resource.name().to_string()));
        }
        if let Some(existing) = index.routes.get(resource.route()) {
            return Err(ConfigurationError::DuplicateRoute {
                route: resource.route().to_string(),
                existing: existing.clone(),
            });
        }

        let resource = Arc::new(resource);
        index
            .resources
            .insert(resource.name().to_string(), Arc::clone(&resource));
        index.rebuild_routes();

        info!(
            "Registered resource: {} at /{}",
            resource.name(),
            resource.route()
        );
        Ok(resource)
    }

    /// Get a resource by name.
    pub async fn get(&self, name: &str) -> Option<Arc<Resource>> {
        self.index.read().await.resources.get(name).cloned()
    }

    /// Get the resource serving a route.
    pub async fn resolve(&self, route: &str) -> Option<Arc<Resource>> {
        let index = self.index.read().await;
        let route = route.trim_matches('/');
        index
            .routes
            .get(route)
            .and_then(|name| index.resources.get(name))
            .cloned()
    }

    /// Get every registered resource name, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.read().await.resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Initialize every resource concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first initialization failure.
    pub async fn init_all(&self) -> Result<(), AutonymError> {
        let resources: Vec<Arc<Resource>> =
            self.index.read().await.resources.values().cloned().collect();
        try_join_all(resources.iter().map(|resource| resource.init())).await?;
        Ok(())
    }

    /// Run an operation against the resource serving a route.
    ///
    /// Failures are promoted to client errors, so their payload exposes
    /// the message and data whenever the code is a client code.
    ///
    /// # Errors
    ///
    /// Fails with `NOT_FOUND` for an unknown route, or with the operation's
    /// normalized error.
    pub async fn dispatch(
        &self,
        route: &str,
        operation: Operation,
        meta: Meta,
    ) -> Result<Reply, AutonymError> {
        let resource = self.resolve(route).await.ok_or_else(|| {
            AutonymError::not_found(format!("No resource is served at /{}.", route.trim_matches('/')))
                .to_client_error()
        })?;
        debug!("Dispatching {} to {}", operation.method(), resource.name());

        let result = match operation {
            Operation::Create(data) => resource
                .create(data, meta)
                .await
                .map(|record| (201, ResponseData::One(record))),
            Operation::Find(query) => resource
                .find(query, meta)
                .await
                .map(|records| (200, ResponseData::Many(records))),
            Operation::FindOne(id) => resource
                .find_one(&id, meta)
                .await
                .map(|record| (200, ResponseData::One(record))),
            Operation::FindOneAndUpdate(id, data) => resource
                .find_one_and_update(&id, data, meta)
                .await
                .map(|record| (200, ResponseData::One(record))),
            Operation::FindOneAndDelete(id) => resource
                .find_one_and_delete(&id, meta)
                .await
                .map(|record| (200, ResponseData::One(record))),
        };

        result
            .map(|(status, data)| Reply { status, data })
            .map_err(|err| err.to_client_error())
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry").finish_non_exhaustive()
    }
}
