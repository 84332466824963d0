//! The public CRUD surface of a resource.

use crate::config::ResourceConfig;
use crate::lifecycle::{LifecycleRunner, Pipeline};
use autonym_core::{AutonymError, Meta, Record, RequestView, ResponseData};
use autonym_policy::PolicyTable;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// A configured resource.
///
/// Every operation awaits [`Resource::init`], builds a fresh shared
/// context from the configured template merged with the caller's `meta`,
/// and runs the lifecycle of its method. Failures are always normalized
/// [`AutonymError`]s; promote them with
/// [`AutonymError::to_client_error`] before exposing them.
pub struct Resource {
    config: Arc<ResourceConfig>,
    initialization: OnceCell<Result<(), AutonymError>>,
}

impl Resource {
    /// Wrap a normalized configuration.
    pub fn new(config: ResourceConfig) -> Self {
        Self {
            config: Arc::new(config),
            initialization: OnceCell::new(),
        }
    }

    /// Get the resource name.
    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// Get the route segment.
    pub fn route(&self) -> &str {
        self.config.route()
    }

    /// Get the policy table.
    pub fn policies(&self) -> &PolicyTable {
        self.config.policies()
    }

    /// Get the normalized configuration.
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Run the initialization hook, once.
    ///
    /// The outcome is memoized: later calls, including concurrent ones,
    /// return the same result without running the hook again. A failed
    /// initialization stays failed.
    pub async fn init(&self) -> Result<(), AutonymError> {
        self.initialization
            .get_or_init(|| async {
                let result = match self.config.init_hook() {
                    Some(hook) => hook().await.map_err(AutonymError::from_error),
                    None => Ok(()),
                };
                match &result {
                    Ok(()) => info!("Initialized resource: {}", self.name()),
                    Err(err) => warn!("Failed to initialize resource {}: {}", self.name(), err),
                }
                result
            })
            .await
            .clone()
    }

    /// Create a record.
    ///
    /// # Arguments
    ///
    /// * `data` - The raw input. It is validated and sanitized first.
    /// * `meta` - Entries merged over the shared-context template.
    ///
    /// # Returns
    ///
    /// The created record, unserialized.
    pub async fn create(&self, data: Record, meta: Meta) -> Result<Record, AutonymError> {
        let data = self.execute(RequestView::create(data), meta).await?;
        expect_one(data)
    }

    /// Find the records matching a query.
    pub async fn find(&self, query: Record, meta: Meta) -> Result<Vec<Record>, AutonymError> {
        match self.execute(RequestView::find(query), meta).await? {
            ResponseData::Many(records) => Ok(records),
            ResponseData::One(record) => Ok(vec![record]),
            ResponseData::Empty => Ok(Vec::new()),
        }
    }

    /// Find one record by id.
    pub async fn find_one(&self, id: &str, meta: Meta) -> Result<Record, AutonymError> {
        let data = self.execute(RequestView::find_one(id), meta).await?;
        expect_one(data)
    }

    /// Partially update one record by id.
    ///
    /// Properties missing from `data` keep their stored values. The store
    /// only receives the properties supplied here.
    pub async fn find_one_and_update(
        &self,
        id: &str,
        data: Record,
        meta: Meta,
    ) -> Result<Record, AutonymError> {
        let data = self.execute(RequestView::update(id, data), meta).await?;
        expect_one(data)
    }

    /// Delete one record by id.
    ///
    /// # Returns
    ///
    /// `{"id": id}`
    pub async fn find_one_and_delete(&self, id: &str, meta: Meta) -> Result<Record, AutonymError> {
        let data = self.execute(RequestView::delete(id), meta).await?;
        expect_one(data)
    }

    async fn execute(&self, request: RequestView, meta: Meta) -> Result<ResponseData, AutonymError> {
        self.init().await?;

        let method = request.method();
        let pipeline = Pipeline::new(request, self.config.fresh_meta(meta));
        let result = LifecycleRunner::new(&self.config).run(pipeline).await;
        if let Err(err) = &result {
            warn!("{} {} failed: {}", self.name(), method, err);
        }
        result
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("config", &self.config)
            .field("initialized", &self.initialization.initialized())
            .finish()
    }
}

fn expect_one(data: ResponseData) -> Result<Record, AutonymError> {
    match data {
        ResponseData::One(record) => Ok(record),
        _ => Err(AutonymError::internal("Expected a single record in the response.")),
    }
}
