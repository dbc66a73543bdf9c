//! Error types for type registration, marshaling, unmarshaling and validation.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::KindMismatch;

/// Errors while loading type descriptions or payloads.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while registering type descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type not found: {name}")]
    TypeNotFound { name: String },

    #[error("type name is empty")]
    EmptyTypeName,

    #[error("type {type_name} is already registered")]
    DuplicateType { type_name: String },

    #[error("type {type_name} has no id field")]
    MissingIdField { type_name: String },

    #[error("type {type_name} declares more than one id field")]
    DuplicateIdField { type_name: String },

    #[error("attribute {field} of type {type_name} has unsupported kind \"{kind}\"")]
    UnsupportedAttributeKind {
        type_name: String,
        field: String,
        kind: String,
    },

    #[error("relationship {field} of type {type_name} is malformed: {reason}")]
    MalformedRelationship {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("field {field} of type {type_name} is declared twice")]
    DuplicateField { type_name: String, field: String },

    #[error("field name \"{field}\" of type {type_name} is reserved")]
    ReservedFieldName { type_name: String, field: String },

    #[error("field {field} of type {type_name} has no accessor")]
    MissingAccessor { type_name: String, field: String },

    #[error("accessor {field} of type {type_name} does not fit: {reason}")]
    AccessorMismatch {
        type_name: String,
        field: String,
        reason: String,
    },
}

/// Errors reading or writing a single field of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("type {type_name} has no attribute {field}")]
    UnknownAttribute { type_name: String, field: String },

    #[error("type {type_name} has no relationship {field}")]
    UnknownRelationship { type_name: String, field: String },

    #[error("attribute {field} of type {type_name} expects {expected}: {mismatch}")]
    KindMismatch {
        type_name: String,
        field: String,
        expected: String,
        mismatch: KindMismatch,
    },

    #[error("relationship {field} of type {type_name} is to-{expected}")]
    CardinalityMismatch {
        type_name: String,
        field: String,
        expected: &'static str,
    },
}

/// Errors while marshaling a document.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("type {type_name} is not registered")]
    UnknownType { type_name: String },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("failed to serialize document: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

impl MarshalError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while unmarshaling a payload.
#[derive(Debug, Error)]
pub enum UnmarshalError {
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("document has neither data nor errors")]
    MissingPrimaryData,

    #[error("primary data must be an object, an array or null, got {found}")]
    InvalidPrimaryData { found: String },

    #[error("expected an object at {pointer}, got {found}")]
    NotAnObject { pointer: String, found: String },

    #[error("id at {pointer} must be a string, got {found}")]
    InvalidId { pointer: String, found: String },

    #[error("resource object at {pointer} has no type")]
    MissingType { pointer: String },

    #[error("unknown type {type_name} at {pointer}")]
    UnknownType { type_name: String, pointer: String },

    #[error("type {type_name} has no member {member} (at {pointer})")]
    UnknownMember {
        type_name: String,
        member: String,
        pointer: String,
    },

    #[error("invalid attribute {field} of type {type_name} at {pointer}: {reason}")]
    InvalidAttribute {
        type_name: String,
        field: String,
        pointer: String,
        reason: String,
    },

    #[error("invalid relationship {field} of type {type_name} at {pointer}: {reason}")]
    InvalidRelationship {
        type_name: String,
        field: String,
        pointer: String,
        reason: String,
    },

    #[error("relationship {field} of type {type_name} links to {expected}, got {actual} (at {pointer})")]
    RelationshipTypeMismatch {
        type_name: String,
        field: String,
        pointer: String,
        expected: String,
        actual: String,
    },

    #[error("resource {type_name} {id} is included more than once")]
    DuplicateIncluded { type_name: String, id: String },
}

impl UnmarshalError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// JSON pointer into the payload where the error was found, if any.
    pub fn pointer(&self) -> Option<&str> {
        match self {
            UnmarshalError::MissingType { pointer }
            | UnmarshalError::NotAnObject { pointer, .. }
            | UnmarshalError::InvalidId { pointer, .. }
            | UnmarshalError::UnknownType { pointer, .. }
            | UnmarshalError::UnknownMember { pointer, .. }
            | UnmarshalError::InvalidAttribute { pointer, .. }
            | UnmarshalError::InvalidRelationship { pointer, .. }
            | UnmarshalError::RelationshipTypeMismatch { pointer, .. } => Some(pointer.as_str()),
            UnmarshalError::MissingPrimaryData => Some(""),
            UnmarshalError::InvalidPrimaryData { .. } => Some("/data"),
            _ => None,
        }
    }
}

/// Errors during structural validation of a raw payload.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("invalid envelope schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<Violation> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) to the offending member.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("types.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::from(RegistryError::MissingIdField {
            type_name: "articles".into(),
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "type articles has no id field");
    }

    #[test]
    fn unmarshal_error_pointer() {
        let err = UnmarshalError::UnknownType {
            type_name: "ghosts".into(),
            pointer: "/included/2".into(),
        };
        assert_eq!(err.pointer(), Some("/included/2"));
        assert_eq!(UnmarshalError::MissingPrimaryData.pointer(), Some(""));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn field_error_display() {
        let err = FieldError::KindMismatch {
            type_name: "articles".into(),
            field: "title".into(),
            expected: "string".into(),
            mismatch: KindMismatch::Kind { actual: "bool" },
        };
        assert_eq!(
            err.to_string(),
            "attribute title of type articles expects string: got bool"
        );
    }

    #[test]
    fn violation_display() {
        let err = Violation {
            path: "/data/type".into(),
            message: "42 is not of type \"string\"".into(),
        };
        assert_eq!(err.to_string(), "/data/type: 42 is not of type \"string\"");
    }
}
