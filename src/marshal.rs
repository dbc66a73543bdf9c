//! Marshaling - documents to JSON.
//!
//! Every resource is emitted through its registered [`TypeDescriptor`], so
//! attributes and relationships come out in declaration order, restricted
//! to the sparse fieldset of their type when one is given.

use serde_json::{json, Map, Value};

use crate::collection::Collection;
use crate::document::{Data, Document, Link};
use crate::error::{FieldError, MarshalError};
use crate::registry::{Registry, TypeDescriptor};
use crate::resource::Resource;
use crate::types::{Cardinality, MarshalOptions, JSONAPI_VERSION};

/// Marshal a document to bytes.
///
/// # Errors
///
/// Returns `MarshalError` if a resource has an unregistered type or does
/// not expose a field its type declares. No output is produced in that case.
pub fn marshal_document(
    doc: &Document,
    registry: &Registry,
    options: &MarshalOptions,
) -> Result<Vec<u8>, MarshalError> {
    let value = marshal_value(doc, registry, options)?;
    let bytes = if options.pretty {
        serde_json::to_vec_pretty(&value)
    } else {
        serde_json::to_vec(&value)
    };
    bytes.map_err(|source| MarshalError::Serialize { source })
}

/// Marshal a document to a JSON value.
///
/// Members are emitted in this order: `data` or `errors`, `included`,
/// `links`, `meta`, `jsonapi`.
pub fn marshal_value(
    doc: &Document,
    registry: &Registry,
    options: &MarshalOptions,
) -> Result<Value, MarshalError> {
    tracing::debug!(
        variant = doc.data.variant_name(),
        included = doc.included.len(),
        "marshaling document"
    );

    let mut out = Map::new();

    match &doc.data {
        Data::Errors(errors) if !errors.is_empty() => {
            let errors =
                serde_json::to_value(errors).map_err(|source| MarshalError::Serialize { source })?;
            out.insert("errors".to_string(), errors);
        }
        // An empty error list is no error at all.
        Data::Null | Data::Errors(_) => {
            out.insert("data".to_string(), Value::Null);
        }
        Data::Resource(res) => {
            out.insert(
                "data".to_string(),
                marshal_resource(res.as_ref(), registry, options)?,
            );
        }
        Data::Collection(col) => {
            out.insert(
                "data".to_string(),
                marshal_collection(col.as_ref(), registry, options)?,
            );
        }
        Data::Identifier(id) => {
            out.insert("data".to_string(), json!(id));
        }
        Data::Identifiers(ids) => {
            out.insert("data".to_string(), json!(ids));
        }
    }

    if out.contains_key("data") && !doc.included.is_empty() {
        let included = doc
            .included
            .sorted()
            .into_iter()
            .map(|res| marshal_resource(res, registry, options))
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("included".to_string(), Value::Array(included));
    }

    let mut links = doc.links.clone();
    if let Some(path) = &options.self_link {
        links.insert(
            "self".to_string(),
            Link::Href(format!("{}{}", options.base_url, path)),
        );
    }
    if !links.is_empty() {
        out.insert("links".to_string(), json!(links));
    }

    if !doc.meta.is_empty() {
        out.insert("meta".to_string(), Value::Object(doc.meta.clone()));
    }

    out.insert("jsonapi".to_string(), json!({ "version": JSONAPI_VERSION }));

    Ok(Value::Object(out))
}

/// Marshal every resource of a collection into an array.
pub fn marshal_collection(
    col: &dyn Collection,
    registry: &Registry,
    options: &MarshalOptions,
) -> Result<Value, MarshalError> {
    let resources = col
        .iter()
        .map(|res| marshal_resource(res, registry, options))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(resources))
}

/// Marshal a single resource object.
pub fn marshal_resource(
    res: &dyn Resource,
    registry: &Registry,
    options: &MarshalOptions,
) -> Result<Value, MarshalError> {
    let desc = registry
        .lookup(res.type_name())
        .ok_or_else(|| MarshalError::UnknownType {
            type_name: res.type_name().to_string(),
        })?;
    let type_name = desc.name();
    let params = &options.params;
    let self_url = format!("{}/{}/{}", options.base_url, type_name, res.id());

    let mut attributes = Map::new();
    for attr in desc.attrs() {
        if !params.is_selected(type_name, &attr.name) {
            continue;
        }
        let value = res
            .get(&attr.name)
            .ok_or_else(|| FieldError::UnknownAttribute {
                type_name: type_name.to_string(),
                field: attr.name.clone(),
            })?;
        attributes.insert(attr.name.clone(), value.to_json());
    }

    let mut relationships = Map::new();
    for rel in desc.rels() {
        if !params.is_selected(type_name, &rel.name) {
            continue;
        }
        let mut relationship = Map::new();
        if params.wants_data(type_name, &rel.name) {
            relationship.insert("data".to_string(), linkage(desc, res, &rel.name, rel.cardinality)?);
        }
        relationship.insert(
            "links".to_string(),
            json!({
                "self": format!("{}/relationships/{}", self_url, rel.name),
                "related": format!("{}/{}", self_url, rel.name),
            }),
        );
        relationships.insert(rel.name.clone(), Value::Object(relationship));
    }

    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(type_name));
    obj.insert("id".to_string(), json!(res.id()));
    if !attributes.is_empty() {
        obj.insert("attributes".to_string(), Value::Object(attributes));
    }
    if !relationships.is_empty() {
        obj.insert("relationships".to_string(), Value::Object(relationships));
    }
    obj.insert("links".to_string(), json!({ "self": self_url }));

    Ok(Value::Object(obj))
}

/// Resource linkage of one relationship: an identifier or null for to-one,
/// an array of identifiers for to-many.
fn linkage(
    desc: &TypeDescriptor,
    res: &dyn Resource,
    rel: &str,
    cardinality: Cardinality,
) -> Result<Value, MarshalError> {
    let value = match cardinality {
        Cardinality::One => match desc.to_one_identifier(res, rel)? {
            Some(id) => json!(id),
            None => Value::Null,
        },
        Cardinality::Many => json!(desc.to_many_identifiers(res, rel)?),
    };
    Ok(value)
}
