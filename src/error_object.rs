//! Error objects, the structured errors a document carries instead of data.
//!
//! The set of constructors is the whole vocabulary: servers are expected to
//! pick the one matching the failure rather than build free-form errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UnmarshalError;

/// Where in the request an error originates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    /// JSON Pointer into the request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    /// Name of the offending query parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// A single error object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// HTTP status code, as a string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ErrorObject {
    fn with_status(status: u16, title: &str, detail: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            title: title.to_string(),
            detail: detail.into(),
            ..Self::default()
        }
    }

    fn meta_entry(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    fn parameter(mut self, parameter: impl Into<String>) -> Self {
        self.source = Some(ErrorSource {
            pointer: None,
            parameter: Some(parameter.into()),
        });
        self
    }

    /// Point the error at a member of the request body.
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source = Some(ErrorSource {
            pointer: Some(pointer.into()),
            parameter: None,
        });
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Status code as a number, if it parses.
    pub fn status_code(&self) -> Option<u16> {
        self.status.parse().ok()
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::with_status(400, "Bad Request", detail)
    }

    pub fn invalid_field(detail: impl Into<String>) -> Self {
        Self::with_status(400, "Invalid field", detail)
    }

    pub fn invalid_field_value_in_body(field: &str, type_name: &str) -> Self {
        Self::with_status(
            400,
            "Invalid field value in body",
            "The field value is invalid for the expected type.",
        )
        .meta_entry("field", field)
        .meta_entry("type", type_name)
    }

    pub fn missing_data_member() -> Self {
        Self::with_status(
            400,
            "Missing data top-level member in payload",
            "The data top-level member is missing from the payload.",
        )
        .with_pointer("")
    }

    pub fn unknown_field_in_body(field: &str, type_name: &str) -> Self {
        Self::with_status(
            400,
            "Unknown field in body",
            format!("{} is not a known field of type {}.", field, type_name),
        )
        .meta_entry("field", field)
        .meta_entry("type", type_name)
    }

    pub fn unknown_type_in_url(type_name: &str) -> Self {
        Self::with_status(
            400,
            "Unknown type in URL",
            format!("{} is not a known type.", type_name),
        )
        .meta_entry("type", type_name)
    }

    pub fn unknown_parameter(parameter: &str) -> Self {
        Self::with_status(
            400,
            "Unknown parameter",
            format!("{} is not a known parameter.", parameter),
        )
        .parameter(parameter)
    }

    pub fn duplicate_field_in_fields_parameter(type_name: &str, field: &str) -> Self {
        Self::with_status(
            400,
            "Duplicate field",
            format!(
                "The fields parameter contains the same field ({}) more than once.",
                field
            ),
        )
        .parameter(format!("fields[{}]", type_name))
        .meta_entry("duplicate-field", field)
    }

    pub fn not_found() -> Self {
        Self::with_status(404, "Not Found", "The requested resource does not exist.")
    }

    pub fn unsupported_media_type() -> Self {
        Self::with_status(
            415,
            "Unsupported Media Type",
            "The request's media type is not supported.",
        )
    }

    pub fn internal_server_error() -> Self {
        Self::with_status(
            500,
            "Internal Server Error",
            "An internal error occurred while processing the request.",
        )
    }

    pub fn not_implemented() -> Self {
        Self::with_status(
            501,
            "Not Implemented",
            "This feature is not implemented.",
        )
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status.is_empty(), self.detail.is_empty()) {
            (false, false) => write!(f, "{} {}: {}", self.status, self.title, self.detail),
            (false, true) => write!(f, "{} {}", self.status, self.title),
            (true, false) => write!(f, "{}: {}", self.title, self.detail),
            (true, true) => f.write_str(&self.title),
        }
    }
}

impl std::error::Error for ErrorObject {}

impl From<&UnmarshalError> for ErrorObject {
    fn from(err: &UnmarshalError) -> Self {
        let obj = match err {
            UnmarshalError::MissingPrimaryData => return ErrorObject::missing_data_member(),
            UnmarshalError::UnknownMember {
                type_name, member, ..
            } => ErrorObject::unknown_field_in_body(member, type_name),
            UnmarshalError::InvalidAttribute {
                type_name, field, ..
            } => ErrorObject::invalid_field_value_in_body(field, type_name),
            other => ErrorObject::bad_request(other.to_string()),
        };
        match err.pointer() {
            Some(pointer) => obj.with_pointer(pointer),
            None => obj,
        }
    }
}
