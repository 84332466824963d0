//! Declarative resource manifests.
//!
//! A manifest describes everything about a resource that can be written
//! as data: name, schema, validator options, policies, route and the
//! shared-context template. Policies refer to functions by name and are
//! resolved against a [`PolicyCatalog`]. Stores, codecs and init hooks are
//! code, so they are attached to the resulting [`ResourceDeclaration`].
//!
//! ```toml
//! name = "post"
//! schema = false
//! route = "articles"
//!
//! [initialMeta]
//! tenant = "default"
//! ```

use crate::config::ResourceDeclaration;
use crate::schema::ValidatorOptions;
use anyhow::{Context, Result};
use autonym_core::{ConfigurationError, Meta};
use autonym_policy::{PolicyCatalog, PolicyTable, PolicyTableSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::info;

/// A resource manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ResourceManifest {
    /// Resource name
    pub name: String,

    /// JSON schema, or `null`/`false` for none. A missing key means none.
    #[serde(default)]
    pub schema: Value,

    /// Validator behavior
    #[serde(default)]
    pub validator_options: ValidatorOptions,

    /// Dotted paths required on create but optional on update
    #[serde(default)]
    pub optional_update_properties: Vec<String>,

    /// Stage -> method -> expression
    #[serde(default)]
    pub policies: PolicyTableSpec,

    /// Route segment
    #[serde(default)]
    pub route: Option<String>,

    /// Shared-context template
    #[serde(default)]
    pub initial_meta: Meta,
}

impl ResourceManifest {
    /// Parse a JSON manifest.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(source).map_err(|e| ConfigurationError::InvalidManifest(e.to_string()))
    }

    /// Parse a TOML manifest.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(source).map_err(|e| ConfigurationError::InvalidManifest(e.to_string()))
    }

    /// Load a manifest from a file.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read resource manifest {}", path.display()))?;

        let manifest = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&source),
            _ => Self::from_json_str(&source),
        }
        .with_context(|| format!("Failed to parse resource manifest {}", path.display()))?;

        info!("Loaded manifest for resource {} from {}", manifest.name, path.display());
        Ok(manifest)
    }

    /// Turn this manifest into a declaration.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Where policy names are resolved.
    ///
    /// # Errors
    ///
    /// Fails if the schema is neither an object nor an explicit `null` or
    /// `false`, or if a policy name is missing from the catalog.
    pub fn into_declaration(
        self,
        catalog: &PolicyCatalog,
    ) -> Result<ResourceDeclaration, ConfigurationError> {
        let policies = PolicyTable::from_spec(&self.policies, catalog, &self.name)?;

        let mut declaration = ResourceDeclaration::new(self.name.clone())
            .validator_options(self.validator_options)
            .optional_update_properties(self.optional_update_properties)
            .policies(policies)
            .initial_meta(self.initial_meta);

        declaration = match self.schema {
            Value::Null | Value::Bool(false) => declaration.no_schema(),
            schema @ Value::Object(_) => declaration.schema(schema),
            other => {
                return Err(ConfigurationError::InvalidManifest(format!(
                    "schema of resource `{}` must be an object, null or false, found {}",
                    self.name, other
                )))
            }
        };

        if let Some(route) = self.route {
            declaration = declaration.route(route);
        }
        Ok(declaration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonym_core::{CrudMethod, Stage};
    use autonym_policy::Expression;

    #[test]
    fn test_json_manifest() {
        let manifest = ResourceManifest::from_json_str(
            r#"{
                "name": "post",
                "schema": { "type": "object", "properties": { "title": { "type": "string" } } },
                "validatorOptions": { "removeAdditional": "declared" },
                "policies": { "preStore": { "find": false } }
            }"#,
        )
        .unwrap();
        assert_eq!(
            manifest.validator_options.remove_additional,
            crate::schema::RemoveAdditional::Declared
        );
        assert!(manifest.validator_options.all_errors);

        let resource = manifest
            .into_declaration(&PolicyCatalog::new())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(resource.route(), "posts");
        assert!(matches!(
            resource.policies().get(Stage::PreStore, CrudMethod::Find),
            Expression::Literal(false)
        ));
    }

    #[test]
    fn test_toml_manifest() {
        let manifest = ResourceManifest::from_toml_str(
            r#"
            name = "person"
            schema = false
            route = "staff"

            [initialMeta]
            tenant = "default"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.initial_meta["tenant"], Value::from("default"));

        let resource = manifest
            .into_declaration(&PolicyCatalog::new())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(resource.route(), "staff");
        assert!(!resource.config().schema().is_enabled());
    }

    #[test]
    fn test_rejects_unknown_and_missing_fields() {
        let unknown = ResourceManifest::from_json_str(
            r#"{ "name": "post", "schema": null, "sortBy": "title" }"#,
        );
        assert!(matches!(unknown, Err(ConfigurationError::InvalidManifest(_))));

        let missing_name = ResourceManifest::from_json_str(r#"{ "schema": null }"#);
        assert!(matches!(missing_name, Err(ConfigurationError::InvalidManifest(_))));

        let bad_stage = ResourceManifest::from_json_str(
            r#"{ "name": "post", "schema": null, "policies": { "preFlight": {} } }"#,
        );
        assert!(matches!(bad_stage, Err(ConfigurationError::InvalidManifest(_))));
    }

    #[test]
    fn test_missing_schema_means_none() {
        let manifest = ResourceManifest::from_toml_str(r#"name = "note""#).unwrap();
        assert_eq!(manifest.schema, Value::Null);

        let resource = manifest
            .into_declaration(&PolicyCatalog::new())
            .unwrap()
            .build()
            .unwrap();
        assert!(!resource.config().schema().is_enabled());
    }

    #[test]
    fn test_invalid_schema_value() {
        let manifest =
            ResourceManifest::from_json_str(r#"{ "name": "post", "schema": true }"#).unwrap();
        assert!(matches!(
            manifest.into_declaration(&PolicyCatalog::new()),
            Err(ConfigurationError::InvalidManifest(_))
        ));
    }
}
