//! Store collaborators.
//!
//! A [`Store`] persists the records of one resource. Every operation is
//! optional: an operation the store does not override fails with
//! `METHOD_NOT_ALLOWED`, so a resource exposes exactly the operations its
//! store supports.

mod in_memory;

pub use in_memory::InMemoryStore;

use async_trait::async_trait;
use autonym_core::{AutonymError, BoxError, Meta, Record};

fn not_implemented(method: &str) -> BoxError {
    Box::new(AutonymError::method_not_allowed(format!(
        "{} is not implemented for this store.",
        method
    )))
}

/// Storage operations of a resource.
///
/// Records handed to the store have already been validated and serialized.
/// Records returned by it are unserialized before reaching the caller.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a record and return it as stored.
    async fn create(&self, _data: Record, _meta: &Meta) -> Result<Record, BoxError> {
        Err(not_implemented("create"))
    }

    /// Return the records matching a query, in a stable order.
    async fn find(&self, _query: &Record, _meta: &Meta) -> Result<Vec<Record>, BoxError> {
        Err(not_implemented("find"))
    }

    /// Return one record by id.
    async fn find_one(&self, _id: &str, _meta: &Meta) -> Result<Record, BoxError> {
        Err(not_implemented("findOne"))
    }

    /// Apply an update and return the updated record.
    ///
    /// # Arguments
    ///
    /// * `id` - The record id.
    /// * `data` - Only the properties the caller supplied.
    /// * `complete` - The stored record with the update merged over it.
    /// * `meta` - The shared context of this call.
    async fn find_one_and_update(
        &self,
        _id: &str,
        _data: Record,
        _complete: Record,
        _meta: &Meta,
    ) -> Result<Record, BoxError> {
        Err(not_implemented("findOneAndUpdate"))
    }

    /// Delete one record by id.
    async fn find_one_and_delete(&self, _id: &str, _meta: &Meta) -> Result<(), BoxError> {
        Err(not_implemented("findOneAndDelete"))
    }
}

/// A store that implements nothing. Resources declared without a store
/// use it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedStore;

#[async_trait]
impl Store for UnimplementedStore {}
