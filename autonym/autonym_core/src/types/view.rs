//! Request and response views handed to policies.
//!
//! A [`RequestView`] describes the CRUD call in flight and holds the working
//! record on its way to the store. A [`ResponseView`] holds the store result
//! on its way back to the caller. Policies receive both mutably, so a
//! `postSchema` policy may trim the working record and a `postStore` policy
//! may redact the response.

use crate::error::{AutonymError, Result};
use crate::types::method::CrudMethod;
use crate::types::record::{defaults_deep, Record};
use serde::{Deserialize, Serialize};

/// The request side of a CRUD call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestView {
    method: CrudMethod,
    id: Option<String>,
    query: Record,
    data: Option<Record>,
    original_data: Option<Record>,
    complete_data: Option<Record>,
    validated: bool,
}

impl RequestView {
    fn new(method: CrudMethod) -> Self {
        Self {
            method,
            id: None,
            query: Record::new(),
            data: None,
            original_data: None,
            complete_data: None,
            validated: false,
        }
    }

    /// A `create` request carrying the raw input.
    pub fn create(data: Record) -> Self {
        Self {
            original_data: Some(Record::new()),
            complete_data: Some(data.clone()),
            data: Some(data),
            ..Self::new(CrudMethod::Create)
        }
    }

    /// A `find` request carrying a query.
    pub fn find(query: Record) -> Self {
        Self {
            query,
            ..Self::new(CrudMethod::Find)
        }
    }

    /// A `findOne` request for one id.
    pub fn find_one(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(CrudMethod::FindOne)
        }
    }

    /// A `findOneAndUpdate` request carrying a partial input.
    pub fn update(id: impl Into<String>, data: Record) -> Self {
        Self {
            id: Some(id.into()),
            data: Some(data),
            ..Self::new(CrudMethod::FindOneAndUpdate)
        }
    }

    /// A `findOneAndDelete` request for one id.
    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(CrudMethod::FindOneAndDelete)
        }
    }

    /// Get the CRUD method of this request.
    pub fn method(&self) -> CrudMethod {
        self.method
    }

    /// Get the addressed record id, if the method takes one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Get the query of a `find` request. Empty for every other method.
    pub fn query(&self) -> &Record {
        &self.query
    }

    /// Get the working record, if the method carries a body.
    ///
    /// Before the schema stage this is the raw input. After it, this is the
    /// sanitized record (for an update, the sanitized delta).
    pub fn data(&self) -> Option<&Record> {
        self.data.as_ref()
    }

    /// Get the working record mutably.
    pub fn data_mut(&mut self) -> Option<&mut Record> {
        self.data.as_mut()
    }

    /// Replace the working record outright.
    ///
    /// Use [`merge_data`](Self::merge_data) to only fill in missing
    /// properties.
    ///
    /// # Errors
    ///
    /// Fails with `INTERNAL_SERVER_ERROR` when the method carries no body.
    pub fn set_data(&mut self, data: Record) -> Result<()> {
        if !self.method.has_body() {
            return Err(AutonymError::internal(format!(
                "Cannot set request data for a {} request.",
                self.method
            )));
        }
        self.data = Some(data);
        Ok(())
    }

    /// Fill in the properties the working record lacks from `data`.
    ///
    /// Properties already present are kept, nested objects are merged
    /// recursively.
    ///
    /// # Errors
    ///
    /// Fails with `INTERNAL_SERVER_ERROR` when the method carries no body.
    pub fn merge_data(&mut self, data: Record) -> Result<()> {
        if let Some(current) = self.data.as_mut() {
            defaults_deep(current, &data);
            return Ok(());
        }
        self.set_data(data)
    }

    /// Get the record a write starts from: the stored record of an update,
    /// or an empty record for a create.
    ///
    /// For an update this is loaded before the `preSchema` stage, so every
    /// write-stage policy sees it. `None` for reads.
    pub fn original_data(&self) -> Option<&Record> {
        self.original_data.as_ref()
    }

    /// Set the record an update starts from.
    pub fn set_original_data(&mut self, original: Record) {
        self.original_data = Some(original);
    }

    /// Get the complete record of a write: the working record merged over
    /// [`original_data`](Self::original_data).
    ///
    /// Before the schema stage it is the raw merge. After it, it is the
    /// validated merge.
    pub fn complete_data(&self) -> Option<&Record> {
        self.complete_data.as_ref()
    }

    /// Get the complete record mutably.
    pub fn complete_data_mut(&mut self) -> Option<&mut Record> {
        self.complete_data.as_mut()
    }

    /// Set the complete record of a write.
    pub fn set_complete_data(&mut self, complete: Record) {
        self.complete_data = Some(complete);
    }

    /// Flag the working record as having passed schema validation.
    pub fn mark_validated(&mut self) {
        self.validated = true;
    }

    /// Check if the working record has passed schema validation.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Check if this is a `create` request.
    pub fn is_creating(&self) -> bool {
        self.method == CrudMethod::Create
    }

    /// Check if this is a `find` request.
    pub fn is_finding(&self) -> bool {
        self.method == CrudMethod::Find
    }

    /// Check if this is a `findOne` request.
    pub fn is_finding_one(&self) -> bool {
        self.method == CrudMethod::FindOne
    }

    /// Check if this is a `findOneAndUpdate` request.
    pub fn is_updating(&self) -> bool {
        self.method == CrudMethod::FindOneAndUpdate
    }

    /// Check if this is a `findOneAndDelete` request.
    pub fn is_deleting(&self) -> bool {
        self.method == CrudMethod::FindOneAndDelete
    }

    /// Check if this request only reads.
    pub fn is_reading(&self) -> bool {
        !self.method.is_writing()
    }

    /// Check if this request changes stored state.
    pub fn is_writing(&self) -> bool {
        self.method.is_writing()
    }

    /// Check if this request carries a body.
    pub fn has_body(&self) -> bool {
        self.method.has_body()
    }

    /// Check if this request addresses a record by id.
    pub fn has_id(&self) -> bool {
        self.method.has_id()
    }
}

/// The payload held by a [`ResponseView`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Nothing has been stored or fetched yet.
    #[default]
    Empty,

    /// A single record.
    One(Record),

    /// A list of records, in store order.
    Many(Vec<Record>),
}

/// The response side of a CRUD call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseView {
    data: ResponseData,
}

impl ResponseView {
    /// Create an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the response payload.
    pub fn data(&self) -> &ResponseData {
        &self.data
    }

    /// Get the response payload mutably.
    pub fn data_mut(&mut self) -> &mut ResponseData {
        &mut self.data
    }

    /// Replace the response payload.
    pub fn set_data(&mut self, data: ResponseData) {
        self.data = data;
    }

    /// Check if the store has populated this response.
    pub fn is_populated(&self) -> bool {
        !matches!(self.data, ResponseData::Empty)
    }

    /// Consume the view and return its payload.
    pub fn into_data(self) -> ResponseData {
        self.data
    }
}
