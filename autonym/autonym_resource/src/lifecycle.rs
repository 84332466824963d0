//! The CRUD lifecycle runner.
//!
//! Every call runs a fixed list of steps chosen by its method:
//!
//! ```text
//! create:
//!     preSchema -> validate -> postSchema -> preStore -> store -> postStore
//! findOneAndUpdate:
//!     load -> preSchema -> validate -> postSchema -> preStore -> store -> postStore
//! find, findOne, findOneAndDelete:
//!     preStore -> store -> postStore
//! ```
//!
//! Each step takes the [`Pipeline`] forward. A failing step aborts the call
//! immediately, and no later step runs. Every failure is normalized into an
//! [`AutonymError`] at the step that produced it.

use crate::config::ResourceConfig;
use autonym_core::types::{defaults_deep, project_onto};
use autonym_core::{
    AutonymError, CrudMethod, Meta, Record, RequestView, ResponseData, ResponseView, Stage,
};
use autonym_policy::PolicyEvaluator;
use futures::future::{try_join, try_join_all};
use serde_json::Value;
use tracing::{debug, trace};

/// One step of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Read the stored record an update starts from.
    Load,

    /// Enforce the policy expression of a stage.
    Authorize(Stage),

    /// Validate and sanitize the working record.
    Validate,

    /// Call the store.
    Store,
}

const WRITE_STEPS: [Step; 6] = [
    Step::Authorize(Stage::PreSchema),
    Step::Validate,
    Step::Authorize(Stage::PostSchema),
    Step::Authorize(Stage::PreStore),
    Step::Store,
    Step::Authorize(Stage::PostStore),
];

const UPDATE_STEPS: [Step; 7] = [
    Step::Load,
    Step::Authorize(Stage::PreSchema),
    Step::Validate,
    Step::Authorize(Stage::PostSchema),
    Step::Authorize(Stage::PreStore),
    Step::Store,
    Step::Authorize(Stage::PostStore),
];

const READ_STEPS: [Step; 3] = [
    Step::Authorize(Stage::PreStore),
    Step::Store,
    Step::Authorize(Stage::PostStore),
];

/// Get the steps a method runs, in order.
pub fn steps_for(method: CrudMethod) -> &'static [Step] {
    match method {
        CrudMethod::Create => &WRITE_STEPS,
        CrudMethod::FindOneAndUpdate => &UPDATE_STEPS,
        _ => &READ_STEPS,
    }
}

/// The state threaded through the steps of one call.
#[derive(Debug)]
pub struct Pipeline {
    /// The request and its working record.
    pub request: RequestView,

    /// The response, populated by the store step.
    pub response: ResponseView,

    /// The shared context, owned by this call only.
    pub meta: Meta,
}

impl Pipeline {
    /// Start a pipeline with an empty response.
    pub fn new(request: RequestView, meta: Meta) -> Self {
        Self {
            request,
            response: ResponseView::new(),
            meta,
        }
    }
}

/// Drives one call through its steps.
pub struct LifecycleRunner<'c> {
    config: &'c ResourceConfig,
}

impl<'c> LifecycleRunner<'c> {
    /// Create a runner for a resource.
    pub fn new(config: &'c ResourceConfig) -> Self {
        Self { config }
    }

    /// Run every step of the request's method.
    ///
    /// # Returns
    ///
    /// * `Ok(ResponseData)` - The unserialized response.
    /// * `Err` - The normalized error of the first failing step.
    pub async fn run(&self, mut pipeline: Pipeline) -> Result<ResponseData, AutonymError> {
        let method = pipeline.request.method();
        let evaluator = PolicyEvaluator::new(self.config.policies());

        for step in steps_for(method) {
            trace!("{} {}: {:?}", self.config.name(), method, step);
            match *step {
                Step::Authorize(stage) => {
                    let Pipeline {
                        request,
                        response,
                        meta,
                    } = &mut pipeline;
                    if let Err(err) = evaluator.authorize(stage, request, response, meta).await {
                        debug!(
                            "{} {} denied at {}: {}",
                            self.config.name(),
                            method,
                            stage,
                            err
                        );
                        return Err(err);
                    }
                }
                Step::Load => self.load(&mut pipeline).await?,
                Step::Validate => self.validate(&mut pipeline).await?,
                Step::Store => self.store(&mut pipeline).await?,
            }
        }

        self.unserialize(method, pipeline.response.into_data()).await
    }

    /// Read and unserialize the record an update starts from.
    ///
    /// This is the only store read besides the operation's own store call.
    /// It also seeds the complete record with the raw merge, so `preSchema`
    /// policies can inspect both.
    async fn load(&self, pipeline: &mut Pipeline) -> Result<(), AutonymError> {
        let request = &mut pipeline.request;
        let id = require_id(request)?;
        let stored = self
            .config
            .store()
            .find_one(&id, &pipeline.meta)
            .await
            .map_err(AutonymError::from_error)?;
        let original = self
            .config
            .codec()
            .unserialize(stored)
            .await
            .map_err(AutonymError::from_error)?;

        let mut complete = request.data().cloned().unwrap_or_default();
        defaults_deep(&mut complete, &original);
        request.set_original_data(original);
        request.set_complete_data(complete);
        Ok(())
    }

    /// Validate the working record.
    ///
    /// An update is validated as the stored record with the input merged
    /// over it. The working record then becomes the update delta: only the
    /// sanitized properties the caller supplied.
    async fn validate(&self, pipeline: &mut Pipeline) -> Result<(), AutonymError> {
        let request = &mut pipeline.request;
        let input = request.data().cloned().unwrap_or_default();

        if request.is_updating() {
            let mut complete = input.clone();
            if let Some(original) = request.original_data() {
                defaults_deep(&mut complete, original);
            }
            let complete = self.config.schema().validate(complete, true)?;

            request.set_data(project_onto(&input, &complete))?;
            request.set_complete_data(complete);
        } else {
            let sanitized = self.config.schema().validate(input, false)?;
            request.set_data(sanitized.clone())?;
            request.set_complete_data(sanitized);
        }

        request.mark_validated();
        Ok(())
    }

    /// Make the single store call of this operation.
    async fn store(&self, pipeline: &mut Pipeline) -> Result<(), AutonymError> {
        let store = self.config.store();
        let codec = self.config.codec();
        let request = &pipeline.request;
        let meta = &pipeline.meta;

        debug!("{} {}: calling store", self.config.name(), request.method());
        let data = match request.method() {
            CrudMethod::Create => {
                let data = codec
                    .serialize(request.data().cloned().unwrap_or_default())
                    .await
                    .map_err(AutonymError::from_error)?;
                let created = store
                    .create(data, meta)
                    .await
                    .map_err(AutonymError::from_error)?;
                ResponseData::One(created)
            }
            CrudMethod::Find => {
                let records = store
                    .find(request.query(), meta)
                    .await
                    .map_err(AutonymError::from_error)?;
                ResponseData::Many(records)
            }
            CrudMethod::FindOne => {
                let id = require_id(request)?;
                let record = store
                    .find_one(&id, meta)
                    .await
                    .map_err(AutonymError::from_error)?;
                ResponseData::One(record)
            }
            CrudMethod::FindOneAndUpdate => {
                let id = require_id(request)?;
                let (delta, complete) = try_join(
                    codec.serialize(request.data().cloned().unwrap_or_default()),
                    codec.serialize(request.complete_data().cloned().unwrap_or_default()),
                )
                .await
                .map_err(AutonymError::from_error)?;
                let updated = store
                    .find_one_and_update(&id, delta, complete, meta)
                    .await
                    .map_err(AutonymError::from_error)?;
                ResponseData::One(updated)
            }
            CrudMethod::FindOneAndDelete => {
                let id = require_id(request)?;
                store
                    .find_one_and_delete(&id, meta)
                    .await
                    .map_err(AutonymError::from_error)?;
                let mut deleted = Record::new();
                deleted.insert("id".to_string(), Value::String(id));
                ResponseData::One(deleted)
            }
        };

        pipeline.response.set_data(data);
        Ok(())
    }

    /// Convert the response back into its API shape.
    ///
    /// A delete response is synthesized rather than read from the store, so
    /// it is returned as is.
    async fn unserialize(
        &self,
        method: CrudMethod,
        data: ResponseData,
    ) -> Result<ResponseData, AutonymError> {
        let codec = self.config.codec();
        match data {
            ResponseData::One(record) if method != CrudMethod::FindOneAndDelete => codec
                .unserialize(record)
                .await
                .map(ResponseData::One)
                .map_err(AutonymError::from_error),
            ResponseData::Many(records) => {
                try_join_all(records.into_iter().map(|record| codec.unserialize(record)))
                    .await
                    .map(ResponseData::Many)
                    .map_err(AutonymError::from_error)
            }
            other => Ok(other),
        }
    }
}

fn require_id(request: &RequestView) -> Result<String, AutonymError> {
    request
        .id()
        .map(str::to_string)
        .ok_or_else(|| AutonymError::internal(format!("{} request has no id.", request.method())))
}
