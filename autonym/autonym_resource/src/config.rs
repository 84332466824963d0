//! Resource declarations and their normalized configuration.
//!
//! A [`ResourceDeclaration`] collects what a developer says about a
//! resource. [`ResourceDeclaration::build`] normalizes it into an immutable
//! [`ResourceConfig`]: the name and route are checked, the schema is
//! compiled, and every missing piece gets its default.

use crate::codec::{IdentityCodec, RecordCodec};
use crate::resource::Resource;
use crate::schema::{SchemaGate, ValidatorOptions};
use crate::store::{Store, UnimplementedStore};
use autonym_core::utils::default_route;
use autonym_core::{BoxError, ConfigurationError, CrudMethod, Meta, Stage};
use autonym_policy::{Expression, PolicyTable};
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// One-time asynchronous initialization of a resource.
pub type InitHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// What a resource declares about its schema.
#[derive(Debug, Clone)]
enum SchemaDeclaration {
    None,
    Schema(Value),
}

/// A raw resource declaration.
///
/// ```
/// use autonym_core::{CrudMethod, Stage};
/// use autonym_resource::{InMemoryStore, ResourceDeclaration};
/// use serde_json::json;
///
/// let posts = ResourceDeclaration::new("post")
///     .schema(json!({
///         "type": "object",
///         "properties": { "title": { "type": "string" } },
///         "required": ["title"]
///     }))
///     .policy(Stage::PreStore, CrudMethod::FindOneAndDelete, false)
///     .store(InMemoryStore::new())
///     .build()
///     .unwrap();
///
/// assert_eq!(posts.route(), "posts");
/// ```
#[derive(Clone)]
pub struct ResourceDeclaration {
    name: String,
    schema: SchemaDeclaration,
    validator_options: ValidatorOptions,
    optional_update_properties: Vec<String>,
    policies: PolicyTable,
    store: Option<Arc<dyn Store>>,
    route: Option<String>,
    codec: Option<Arc<dyn RecordCodec>>,
    initial_meta: Meta,
    init: Option<InitHook>,
}

impl ResourceDeclaration {
    /// Start declaring a resource.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: SchemaDeclaration::None,
            validator_options: ValidatorOptions::default(),
            optional_update_properties: Vec::new(),
            policies: PolicyTable::new(),
            store: None,
            route: None,
            codec: None,
            initial_meta: Meta::new(),
            init: None,
        }
    }

    /// Declare the JSON schema of the resource.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = SchemaDeclaration::Schema(schema);
        self
    }

    /// Declare that the resource has no schema. Records are not validated.
    ///
    /// This is also the default when [`schema`](Self::schema) is never
    /// called.
    pub fn no_schema(mut self) -> Self {
        self.schema = SchemaDeclaration::None;
        self
    }

    /// Set the validator options.
    pub fn validator_options(mut self, options: ValidatorOptions) -> Self {
        self.validator_options = options;
        self
    }

    /// Declare dotted property paths that are required on create but
    /// optional on update.
    pub fn optional_update_properties<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_update_properties = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expression of one stage and method.
    pub fn policy(
        mut self,
        stage: Stage,
        method: CrudMethod,
        expression: impl Into<Expression>,
    ) -> Self {
        self.policies.set(stage, method, expression);
        self
    }

    /// Replace the whole policy table.
    pub fn policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// Set the store.
    pub fn store(self, store: impl Store + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Set a store shared with other owners.
    pub fn shared_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the route segment, instead of the pluralized kebab-case name.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Set the record codec.
    pub fn codec(mut self, codec: impl RecordCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Set the template every call's shared context is cloned from.
    pub fn initial_meta(mut self, meta: Meta) -> Self {
        self.initial_meta = meta;
        self
    }

    /// Set the one-time initialization hook.
    pub fn init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.init = Some(Arc::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
            Box::pin(hook())
        }));
        self
    }

    /// Normalize this declaration and wrap it in a [`Resource`].
    ///
    /// # Errors
    ///
    /// Fails with a [`ConfigurationError`] on any structural violation.
    pub fn build(self) -> Result<Resource, ConfigurationError> {
        Ok(Resource::new(ResourceConfig::normalize(self)?))
    }
}

impl fmt::Debug for ResourceDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDeclaration")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("route", &self.route)
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

/// The canonical, immutable configuration of a resource.
pub struct ResourceConfig {
    name: String,
    route: String,
    schema: SchemaGate,
    policies: PolicyTable,
    store: Arc<dyn Store>,
    codec: Arc<dyn RecordCodec>,
    initial_meta: Meta,
    init: Option<InitHook>,
}

impl ResourceConfig {
    /// Validate a declaration and apply defaults.
    ///
    /// * The name must be non-empty.
    /// * A schema, if declared, must describe an object and compile.
    ///   Without one, validation passes records through unchanged.
    /// * An explicit route must be non-empty. Without one the route is the
    ///   pluralized kebab-case name.
    /// * A missing store becomes [`UnimplementedStore`], and a missing codec
    ///   becomes [`IdentityCodec`].
    pub fn normalize(declaration: ResourceDeclaration) -> Result<Self, ConfigurationError> {
        let name = declaration.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }

        let schema = match declaration.schema {
            SchemaDeclaration::None => {
                if !declaration.optional_update_properties.is_empty() {
                    return Err(ConfigurationError::UnknownSchemaPath {
                        name,
                        path: declaration.optional_update_properties.join(", "),
                    });
                }
                SchemaGate::disabled(&name)
            }
            SchemaDeclaration::Schema(schema) => SchemaGate::compile(
                &name,
                schema,
                declaration.validator_options,
                &declaration.optional_update_properties,
            )?,
        };

        let route = match declaration.route {
            Some(route) => {
                let route = route.trim().trim_matches('/').to_string();
                if route.is_empty() {
                    return Err(ConfigurationError::EmptyRoute(name));
                }
                route
            }
            None => default_route(&name),
        };

        Ok(Self {
            route,
            schema,
            policies: declaration.policies,
            store: declaration
                .store
                .unwrap_or_else(|| Arc::new(UnimplementedStore)),
            codec: declaration
                .codec
                .unwrap_or_else(|| Arc::new(IdentityCodec)),
            initial_meta: declaration.initial_meta,
            init: declaration.init,
            name,
        })
    }

    /// Get the resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the route segment.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Get the schema gate.
    pub fn schema(&self) -> &SchemaGate {
        &self.schema
    }

    /// Get the policy table.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Get the store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Get the record codec.
    pub fn codec(&self) -> &dyn RecordCodec {
        self.codec.as_ref()
    }

    /// Get the shared-context template.
    pub fn initial_meta(&self) -> &Meta {
        &self.initial_meta
    }

    /// Get the initialization hook.
    pub fn init_hook(&self) -> Option<&InitHook> {
        self.init.as_ref()
    }

    /// Create the shared context of a new call.
    ///
    /// The template is deep-cloned, then the caller's entries are merged
    /// over it. No two calls ever share a context.
    pub fn fresh_meta(&self, overrides: Meta) -> Meta {
        let mut meta = self.initial_meta.clone();
        meta.extend(overrides);
        meta
    }
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("schema", &self.schema)
            .field("policies", &self.policies)
            .field("initial_meta", &self.initial_meta)
            .finish_non_exhaustive()
    }
}
