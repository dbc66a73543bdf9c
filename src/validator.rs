//! Structural validation of raw payloads against the document envelope.
//!
//! This checks shape only: it knows nothing about registered types. A
//! payload that passes can still fail to unmarshal.

use serde_json::{json, Value};

use crate::error::{ValidateError, Violation};

/// JSON Schema (draft-07) of a top-level document.
pub fn envelope_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "anyOf": [
            { "required": ["data"] },
            { "required": ["errors"] },
            { "required": ["meta"] }
        ],
        "not": { "required": ["data", "errors"] },
        "dependencies": { "included": ["data"] },
        "properties": {
            "data": {
                "type": ["object", "array", "null"],
                "if": { "type": "object" },
                "then": { "$ref": "#/definitions/resource" },
                "items": { "$ref": "#/definitions/resource" }
            },
            "included": {
                "type": "array",
                "items": { "$ref": "#/definitions/resource" }
            },
            "errors": {
                "type": "array",
                "items": { "$ref": "#/definitions/error" }
            },
            "links": { "$ref": "#/definitions/links" },
            "meta": { "type": "object" },
            "jsonapi": {
                "type": "object",
                "properties": { "version": { "type": "string" } }
            }
        },
        "definitions": {
            "resource": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 },
                    "id": { "type": "string" },
                    "attributes": { "type": "object" },
                    "relationships": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/definitions/relationship" }
                    },
                    "links": { "$ref": "#/definitions/links" },
                    "meta": { "type": "object" }
                }
            },
            "relationship": {
                "type": "object",
                "properties": {
                    "data": {
                        "type": ["object", "array", "null"],
                        "if": { "type": "object" },
                        "then": { "$ref": "#/definitions/identifier" },
                        "items": { "$ref": "#/definitions/identifier" }
                    },
                    "links": { "$ref": "#/definitions/links" },
                    "meta": { "type": "object" }
                }
            },
            "identifier": {
                "type": "object",
                "required": ["type", "id"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 },
                    "id": { "type": "string" },
                    "meta": { "type": "object" }
                }
            },
            "error": {
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "status": { "type": "string" },
                    "code": { "type": "string" },
                    "title": { "type": "string" },
                    "detail": { "type": "string" },
                    "source": {
                        "type": "object",
                        "properties": {
                            "pointer": { "type": "string" },
                            "parameter": { "type": "string" }
                        }
                    },
                    "meta": { "type": "object" }
                }
            },
            "links": {
                "type": "object",
                "additionalProperties": {
                    "type": ["string", "object", "null"],
                    "if": { "type": "object" },
                    "then": {
                        "required": ["href"],
                        "properties": {
                            "href": { "type": "string" },
                            "meta": { "type": "object" }
                        }
                    }
                }
            }
        }
    })
}

/// Validate a payload against the document envelope.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` with every violation found, each with
/// the JSON pointer of the offending member.
pub fn validate_document(payload: &Value) -> Result<(), ValidateError> {
    let schema = envelope_schema();
    let validator =
        jsonschema::validator_for(&schema).map_err(|e| ValidateError::InvalidSchema {
            message: e.to_string(),
        })?;

    let errors: Vec<Violation> = validator
        .iter_errors(payload)
        .map(|e| Violation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(violations = errors.len(), "payload failed envelope validation");
        Err(ValidateError::Invalid { errors })
    }
}
