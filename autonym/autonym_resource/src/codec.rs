//! Record serialization between the resource and its store.
//!
//! Records pass through [`RecordCodec::serialize`] on their way into the
//! store and through [`RecordCodec::unserialize`] on their way out. Both
//! transforms must tolerate partial records, since update deltas are
//! serialized too.

use async_trait::async_trait;
use autonym_core::{BoxError, Record};
use std::fmt;

/// Transforms records between their API shape and their stored shape.
#[async_trait]
pub trait RecordCodec: Send + Sync {
    /// Convert an API record into its stored shape.
    async fn serialize(&self, record: Record) -> Result<Record, BoxError> {
        Ok(record)
    }

    /// Convert a stored record into its API shape.
    async fn unserialize(&self, record: Record) -> Result<Record, BoxError> {
        Ok(record)
    }
}

/// The default codec: records pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

#[async_trait]
impl RecordCodec for IdentityCodec {}

/// A codec backed by a pair of synchronous closures.
pub struct FnCodec<S, U> {
    serialize: S,
    unserialize: U,
}

impl<S, U> FnCodec<S, U>
where
    S: Fn(Record) -> Result<Record, BoxError> + Send + Sync,
    U: Fn(Record) -> Result<Record, BoxError> + Send + Sync,
{
    /// Create a codec from its two directions.
    pub fn new(serialize: S, unserialize: U) -> Self {
        Self {
            serialize,
            unserialize,
        }
    }
}

#[async_trait]
impl<S, U> RecordCodec for FnCodec<S, U>
where
    S: Fn(Record) -> Result<Record, BoxError> + Send + Sync,
    U: Fn(Record) -> Result<Record, BoxError> + Send + Sync,
{
    async fn serialize(&self, record: Record) -> Result<Record, BoxError> {
        (self.serialize)(record)
    }

    async fn unserialize(&self, record: Record) -> Result<Record, BoxError> {
        (self.unserialize)(record)
    }
}

impl<S, U> fmt::Debug for FnCodec<S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}
