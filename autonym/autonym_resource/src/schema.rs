//! Schema validation gate.
//!
//! A [`SchemaGate`] wraps the JSON schema of a resource. It compiles the
//! schema once when the resource is configured, along with a relaxed copy
//! used for partial updates, and then validates and sanitizes every
//! incoming record: undeclared properties are stripped and declared
//! defaults are filled before the validator runs.

use autonym_core::{AutonymError, ConfigurationError, Record};
use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Which undeclared properties are stripped before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoveAdditional {
    /// Keep every property.
    None,

    /// Strip undeclared properties of objects whose schema sets
    /// `additionalProperties: false`.
    Declared,

    /// Strip every undeclared property.
    #[default]
    All,
}

/// Validator behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ValidatorOptions {
    /// Report every failure instead of only the first one.
    pub all_errors: bool,

    /// Which undeclared properties to strip.
    pub remove_additional: RemoveAdditional,

    /// Fill missing properties from their schema `default`.
    pub use_defaults: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            all_errors: true,
            remove_additional: RemoveAdditional::All,
            use_defaults: true,
        }
    }
}

struct CompiledSchema {
    schema: Value,
    validator: Validator,
}

impl CompiledSchema {
    fn compile(resource: &str, schema: Value) -> Result<Self, ConfigurationError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|err| ConfigurationError::SchemaCompile {
                name: resource.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self { schema, validator })
    }
}

/// Validates and sanitizes records against a resource schema.
///
/// A gate is immutable after construction and shared by every concurrent
/// call of its resource.
#[derive(Clone)]
pub struct SchemaGate {
    resource: String,
    options: ValidatorOptions,
    full: Option<Arc<CompiledSchema>>,
    partial: Option<Arc<CompiledSchema>>,
}

impl SchemaGate {
    /// A gate that accepts every record unchanged.
    pub fn disabled(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            options: ValidatorOptions::default(),
            full: None,
            partial: None,
        }
    }

    /// Compile a schema.
    ///
    /// # Arguments
    ///
    /// * `resource` - The resource name, used in error messages.
    /// * `schema` - The JSON schema. It must have `"type": "object"`.
    /// * `options` - Validator behavior.
    /// * `optional_update_properties` - Dotted property paths that are
    ///   required on create but optional on update.
    ///
    /// # Errors
    ///
    /// Fails if the schema does not describe an object, does not compile,
    /// or if an optional update property does not exist in it.
    pub fn compile(
        resource: &str,
        schema: Value,
        options: ValidatorOptions,
        optional_update_properties: &[String],
    ) -> Result<Self, ConfigurationError> {
        if schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(ConfigurationError::SchemaNotObject(resource.to_string()));
        }

        let mut relaxed = schema.clone();
        for path in optional_update_properties {
            relax_required(&mut relaxed, path).ok_or_else(|| {
                ConfigurationError::UnknownSchemaPath {
                    name: resource.to_string(),
                    path: path.clone(),
                }
            })?;
        }

        let full = Arc::new(CompiledSchema::compile(resource, schema)?);
        let partial = if optional_update_properties.is_empty() {
            Arc::clone(&full)
        } else {
            Arc::new(CompiledSchema::compile(resource, relaxed)?)
        };

        Ok(Self {
            resource: resource.to_string(),
            options,
            full: Some(full),
            partial: Some(partial),
        })
    }

    /// Check if this gate validates anything.
    pub fn is_enabled(&self) -> bool {
        self.full.is_some()
    }

    /// Get the full schema, if one is declared.
    pub fn schema(&self) -> Option<&Value> {
        self.full.as_ref().map(|compiled| &compiled.schema)
    }

    /// Get the schema used for partial updates, if one is declared.
    pub fn partial_schema(&self) -> Option<&Value> {
        self.partial.as_ref().map(|compiled| &compiled.schema)
    }

    /// Get the validator options.
    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Sanitize and validate a record.
    ///
    /// # Arguments
    ///
    /// * `record` - The record to check.
    /// * `partial` - Use the relaxed update schema.
    ///
    /// # Returns
    ///
    /// * `Ok(Record)` - The sanitized record.
    /// * `Err` - A `NOT_ACCEPTABLE` error whose data holds
    ///   `{"errors": {path: [message, ...]}}`.
    pub fn validate(&self, record: Record, partial: bool) -> Result<Record, AutonymError> {
        let compiled = match if partial { &self.partial } else { &self.full } {
            Some(compiled) => compiled,
            None => return Ok(record),
        };

        let mut instance = Value::Object(record);
        sanitize(&mut instance, &compiled.schema, &self.options);

        let mut grouped = Map::new();
        let errors = compiled.validator.iter_errors(&instance);
        let limit = if self.options.all_errors { usize::MAX } else { 1 };
        for error in errors.take(limit) {
            let mut path = error.instance_path.to_string();
            if let ValidationErrorKind::Required { property } = &error.kind {
                match property {
                    Value::String(name) => path = format!("{}/{}", path, name),
                    other => path = format!("{}/{}", path, other),
                }
            }
            if path.is_empty() {
                path = "/".to_string();
            }
            let messages = grouped
                .entry(path)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(messages) = messages {
                messages.push(Value::String(error.to_string()));
            }
        }

        if !grouped.is_empty() {
            let mut data = Map::new();
            data.insert("errors".to_string(), Value::Object(grouped));
            return Err(AutonymError::not_acceptable(format!(
                "Schema validation for resource \"{}\" failed.",
                self.resource
            ))
            .with_data(data));
        }

        match instance {
            Value::Object(record) => Ok(record),
            _ => Err(AutonymError::internal("Sanitized record is not an object.")),
        }
    }
}

impl fmt::Debug for SchemaGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaGate")
            .field("resource", &self.resource)
            .field("options", &self.options)
            .field("schema", &self.schema())
            .finish()
    }
}

/// Remove the last segment of a dotted path from the `required` list of
/// the object schema holding it. Returns `None` if the path does not exist.
fn relax_required(schema: &mut Value, path: &str) -> Option<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut node = schema;
    for segment in parents {
        node = node.get_mut("properties")?.get_mut(*segment)?;
    }
    node.get("properties")?.get(*last)?;

    if let Some(Value::Array(required)) = node.get_mut("required") {
        required.retain(|name| name.as_str() != Some(*last));
    }
    Some(())
}

/// Strip undeclared properties and fill defaults, recursively.
fn sanitize(instance: &mut Value, schema: &Value, options: &ValidatorOptions) {
    match instance {
        Value::Object(record) => {
            let properties = schema.get("properties").and_then(Value::as_object);

            let strip = match options.remove_additional {
                RemoveAdditional::None => false,
                RemoveAdditional::Declared => {
                    schema.get("additionalProperties") == Some(&Value::Bool(false))
                }
                RemoveAdditional::All => properties.is_some(),
            };
            if strip {
                record.retain(|key, _| properties.map_or(false, |p| p.contains_key(key)));
            }

            let Some(properties) = properties else {
                return;
            };
            for (key, subschema) in properties {
                match record.get_mut(key) {
                    Some(value) => sanitize(value, subschema, options),
                    None if options.use_defaults => {
                        if let Some(default) = subschema.get("default") {
                            record.insert(key.clone(), default.clone());
                        }
                    }
                    None => {}
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items {
                    sanitize(item, item_schema, options);
                }
            }
        }
        _ => {}
    }
}
