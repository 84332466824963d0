//! Error types for the Autonym resource lifecycle.
//!
//! This module defines the normalized error that every resource operation
//! fails with, the codes it can carry, and the configuration errors raised
//! while a resource declaration is being normalized.
//!
//! Anything that crosses a lifecycle stage boundary is converted with
//! [`AutonymError::from_error`]. Policies, stores and codecs may fail with
//! any error type; only the normalized form ever reaches the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Boxed error returned by user-supplied policies, stores, codecs and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type defaulting to [`AutonymError`].
pub type Result<T, E = AutonymError> = std::result::Result<T, E>;

/// Message exposed for every error that is not client-safe.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// Message used when a policy denies an action without a specific reason.
pub const FORBIDDEN_MESSAGE: &str = "This action may not be performed.";

/// Message used when a failure carries no message of its own.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

/// Error code carried by an [`AutonymError`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ErrorCode {
    /// The request could not be understood.
    BadRequest,

    /// The caller must be authenticated.
    Unauthorized,

    /// A policy denied the action.
    Forbidden,

    /// The requested record does not exist.
    NotFound,

    /// The store does not implement the requested operation.
    MethodNotAllowed,

    /// The submitted record failed schema validation.
    NotAcceptable,

    /// Default code for anything unhandled.
    InternalServerError,

    /// An application-defined code.
    Other(String),
}

impl ErrorCode {
    /// Codes whose message and data may be exposed to a caller.
    pub const CLIENT_ERRORS: [ErrorCode; 6] = [
        ErrorCode::BadRequest,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::NotFound,
        ErrorCode::MethodNotAllowed,
        ErrorCode::NotAcceptable,
    ];

    /// Get the wire name of this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::NotAcceptable => "NOT_ACCEPTABLE",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::Other(code) => code,
        }
    }

    /// Check if this code is one of [`ErrorCode::CLIENT_ERRORS`].
    pub fn is_client_code(&self) -> bool {
        Self::CLIENT_ERRORS.contains(self)
    }

    /// Get the HTTP status number associated with this code.
    ///
    /// Unknown application codes fall back to 500.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::NotAcceptable => 406,
            Self::InternalServerError | Self::Other(_) => 500,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "BAD_REQUEST" => Self::BadRequest,
            "UNAUTHORIZED" => Self::Unauthorized,
            "FORBIDDEN" => Self::Forbidden,
            "NOT_FOUND" => Self::NotFound,
            "METHOD_NOT_ALLOWED" => Self::MethodNotAllowed,
            "NOT_ACCEPTABLE" => Self::NotAcceptable,
            "INTERNAL_SERVER_ERROR" | "" => Self::InternalServerError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized error every resource operation fails with.
///
/// An `AutonymError` is immutable once built. Promoting it to a client
/// error produces a copy; the original stays internal.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{code}] {message}")]
pub struct AutonymError {
    code: ErrorCode,
    message: String,
    data: Map<String, Value>,
    client_error: bool,
}

impl AutonymError {
    /// Create a new error with an empty data payload.
    ///
    /// # Arguments
    ///
    /// * `code` - The error code.
    /// * `message` - A human-readable description. It only reaches a caller
    ///   once the error is a client error.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: Map::new(),
            client_error: false,
        }
    }

    /// Attach a data payload to this error.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// The generic denial used when a policy gives no specific reason.
    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, FORBIDDEN_MESSAGE)
    }

    /// A denial with a specific reason.
    pub fn forbidden_with(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// A missing-record error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// An unimplemented-operation error.
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MethodNotAllowed, message)
    }

    /// A schema validation error.
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotAcceptable, message)
    }

    /// An internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    /// Normalize an arbitrary failure.
    ///
    /// * An `AutonymError` passes through unchanged.
    /// * A [`Rejection`] keeps its own code (default `INTERNAL_SERVER_ERROR`),
    ///   message and detail.
    /// * Anything else becomes an `INTERNAL_SERVER_ERROR` whose data keeps the
    ///   original error's text under `"error"`.
    pub fn from_error(err: BoxError) -> Self {
        let err = match err.downcast::<AutonymError>() {
            Ok(err) => return *err,
            Err(err) => err,
        };
        match err.downcast::<Rejection>() {
            Ok(rejection) => (*rejection).into(),
            Err(other) => {
                let text = other.to_string();
                let message = if text.is_empty() {
                    UNKNOWN_ERROR_MESSAGE.to_string()
                } else {
                    text.clone()
                };
                let mut data = Map::new();
                data.insert("error".to_string(), Value::String(text));
                Self::new(ErrorCode::InternalServerError, message).with_data(data)
            }
        }
    }

    /// Get the error code.
    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error data.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Get the HTTP status number for this error's code.
    pub fn status(&self) -> u16 {
        self.code.status()
    }

    /// Create a copy of this error flagged as client-safe.
    pub fn to_client_error(&self) -> Self {
        Self {
            client_error: true,
            ..self.clone()
        }
    }

    /// Check if this error was promoted and carries a client code.
    pub fn is_client_error(&self) -> bool {
        self.client_error && self.code.is_client_code()
    }

    /// Get the payload safe to expose outside the process.
    ///
    /// Client errors expose their data merged with their message; every
    /// other error collapses to a generic message.
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        let message = if self.is_client_error() {
            payload.extend(self.data.clone());
            self.message.clone()
        } else {
            INTERNAL_ERROR_MESSAGE.to_string()
        };
        payload.insert("message".to_string(), Value::String(message));
        Value::Object(payload)
    }
}

/// A failure that declares its own code, for policies and stores that
/// want a specific outcome without building an [`AutonymError`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rejection {
    code: Option<ErrorCode>,
    message: Option<String>,
    detail: Option<Value>,
}

impl Rejection {
    /// Create an empty rejection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the code.
    pub fn code(mut self, code: impl Into<ErrorCode>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the detail, kept as the normalized error's data.
    pub fn detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message),
            None => f.write_str(UNKNOWN_ERROR_MESSAGE),
        }
    }
}

impl std::error::Error for Rejection {}

impl From<Rejection> for AutonymError {
    fn from(rejection: Rejection) -> Self {
        let data = match rejection.detail {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(other) => {
                let mut map = Map::new();
                map.insert("detail".to_string(), other);
                map
            }
        };
        AutonymError::new(
            rejection.code.unwrap_or(ErrorCode::InternalServerError),
            rejection
                .message
                .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
        )
        .with_data(data)
    }
}

/// Errors raised while normalizing a resource declaration.
///
/// These are fatal at startup and never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The resource name is empty
    #[error("resource name must be a non-empty string")]
    EmptyName,

    /// The schema does not describe an object
    #[error("schema for resource `{0}` must have type `object`")]
    SchemaNotObject(String),

    /// The schema failed to compile
    #[error("schema for resource `{name}` failed to compile: {reason}")]
    SchemaCompile {
        /// Resource name
        name: String,

        /// Compiler message
        reason: String,
    },

    /// An optional-update property path does not exist in the schema
    #[error("optional update property `{path}` does not exist in the schema for resource `{name}`")]
    UnknownSchemaPath {
        /// Resource name
        name: String,

        /// Dotted property path
        path: String,
    },

    /// An explicit route is empty
    #[error("route for resource `{0}` must be a non-empty string")]
    EmptyRoute(String),

    /// A declarative expression names a policy that is not in the catalog
    #[error("resource `{resource}` references unknown policy `{policy}`")]
    UnknownPolicy {
        /// Resource name
        resource: String,

        /// Policy name
        policy: String,
    },

    /// A resource with the same name is already registered
    #[error("resource `{0}` is already registered")]
    DuplicateName(String),

    /// Another resource already serves this route
    #[error("route `{route}` is already used by resource `{existing}`")]
    DuplicateRoute {
        /// Route segment
        route: String,

        /// Name of the resource holding the route
        existing: String,
    },

    /// The manifest is structurally invalid
    #[error("invalid resource manifest: {0}")]
    InvalidManifest(String),
}
