//! # Autonym Resource
//!
//! `autonym_resource` turns a resource declaration into a CRUD surface
//! that validates and authorizes every call the same way.
//!
//! Key concepts:
//!
//! 1. **Declaration**: Name, JSON schema, policies, store, route and
//!    shared-context template, written in code with
//!    [`ResourceDeclaration`] or as data with [`ResourceManifest`].
//!
//! 2. **Configuration**: The normalized, immutable [`ResourceConfig`] a
//!    declaration builds into. Structural mistakes fail here, at startup.
//!
//! 3. **Lifecycle**: The fixed list of stages each call passes through,
//!    driven by the [`LifecycleRunner`]. The store is called exactly once
//!    per operation.
//!
//! 4. **Registry**: Resources indexed by name and route, for transport
//!    layers that dispatch by path.

pub mod codec;
pub mod config;
pub mod lifecycle;
pub mod manifest;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod store;

// Re-export key types and traits for convenience
pub use codec::{FnCodec, IdentityCodec, RecordCodec};
pub use config::{InitHook, ResourceConfig, ResourceDeclaration};
pub use lifecycle::{LifecycleRunner, Pipeline, Step};
pub use manifest::ResourceManifest;
pub use registry::{Operation, Reply, ResourceRegistry};
pub use resource::Resource;
pub use schema::{RemoveAdditional, SchemaGate, ValidatorOptions};
pub use store::{InMemoryStore, Store, UnimplementedStore};
