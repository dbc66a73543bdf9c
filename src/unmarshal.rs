//! Unmarshaling - JSON payloads to documents.
//!
//! Decoding runs in two phases. The envelope is first split into raw
//! members without looking at resource shapes, so that the kind of primary
//! data can be told apart by its first character. Resource objects are then
//! decoded against the registry, the primary data first and `included`
//! after it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::collection::{Collection, Resources, TypedCollection};
use crate::document::{Data, Document, Link};
use crate::error::UnmarshalError;
use crate::error_object::ErrorObject;
use crate::registry::{Registry, TypeDescriptor};
use crate::resource::{Identifier, Resource, SoftResource};
use crate::types::{json_type_name, Cardinality, UnmarshalOptions};

/// Members a resource object may carry.
const RESOURCE_MEMBERS: &[&str] = &["id", "type", "attributes", "relationships", "links", "meta"];

/// Top-level members, undecoded.
#[derive(Debug, Deserialize)]
struct Skeleton {
    #[serde(default, deserialize_with = "present")]
    data: Option<Box<RawValue>>,
    #[serde(default)]
    included: Vec<Box<RawValue>>,
    #[serde(default)]
    errors: Vec<ErrorObject>,
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    links: BTreeMap<String, Option<Link>>,
}

/// Keeps an explicit `null` apart from an absent member.
fn present<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Unmarshal a payload into a document.
///
/// # Errors
///
/// Returns `UnmarshalError` on malformed JSON, a document without primary
/// data, a resource of an unregistered type (in `data` or in `included`),
/// or a member that does not fit its declared field. In strict mode,
/// undeclared members and duplicate included resources are errors too.
pub fn unmarshal_document(
    payload: &[u8],
    registry: &Registry,
    options: &UnmarshalOptions,
) -> Result<Document, UnmarshalError> {
    let skeleton: Skeleton =
        serde_json::from_slice(payload).map_err(|source| UnmarshalError::InvalidJson { source })?;
    let decoder = Decoder { registry, options };

    let data = match &skeleton.data {
        Some(raw) => {
            if !skeleton.errors.is_empty() {
                tracing::warn!(
                    errors = skeleton.errors.len(),
                    "document carries both data and errors, ignoring errors"
                );
            }
            decoder.primary_data(raw)?
        }
        None if !skeleton.errors.is_empty() => Data::Errors(skeleton.errors),
        None => return Err(UnmarshalError::MissingPrimaryData),
    };
    tracing::debug!(variant = data.variant_name(), "decoded primary data");

    let mut doc = Document::new(data);
    for res in decoder.included(&skeleton.included)? {
        doc.include(res);
    }
    doc.meta = skeleton.meta;
    doc.links = skeleton
        .links
        .into_iter()
        .filter_map(|(name, link)| link.map(|link| (name, link)))
        .collect();

    Ok(doc)
}

/// Unmarshal a payload held in a string.
pub fn unmarshal_str(
    payload: &str,
    registry: &Registry,
    options: &UnmarshalOptions,
) -> Result<Document, UnmarshalError> {
    unmarshal_document(payload.as_bytes(), registry, options)
}

struct Decoder<'a> {
    registry: &'a Registry,
    options: &'a UnmarshalOptions,
}

impl Decoder<'_> {
    fn primary_data(&self, raw: &RawValue) -> Result<Data, UnmarshalError> {
        let text = raw.get().trim_start();
        match text.as_bytes().first() {
            Some(b'{') => {
                let value = parse(raw)?;
                let res = self.resource(&value, "/data")?;
                Ok(Data::Resource(Box::new(res)))
            }
            Some(b'[') => {
                let values: Vec<Value> = serde_json::from_str(raw.get())
                    .map_err(|source| UnmarshalError::InvalidJson { source })?;
                let mut resources = Vec::with_capacity(values.len());
                for (i, value) in values.iter().enumerate() {
                    resources.push(self.resource(value, &format!("/data/{}", i))?);
                }
                Ok(Data::Collection(self.collection(resources)))
            }
            _ if text == "null" => Ok(Data::Null),
            _ => Err(UnmarshalError::InvalidPrimaryData {
                found: json_type_name(&parse(raw)?).to_string(),
            }),
        }
    }

    /// A typed collection when every resource shares one type, otherwise a
    /// plain list.
    fn collection(&self, resources: Vec<SoftResource>) -> Box<dyn Collection> {
        let descriptor = match resources.first() {
            Some(first)
                if resources
                    .iter()
                    .all(|r| r.type_name() == first.type_name()) =>
            {
                self.registry.lookup(first.type_name()).cloned()
            }
            _ => None,
        };

        match descriptor {
            Some(descriptor) => {
                let mut col = TypedCollection::new(descriptor);
                for res in resources {
                    col.add(Box::new(res));
                }
                Box::new(col)
            }
            None => {
                let items: Vec<Box<dyn Resource>> = resources
                    .into_iter()
                    .map(|r| Box::new(r) as Box<dyn Resource>)
                    .collect();
                Box::new(Resources::from(items))
            }
        }
    }

    /// Decode `included`: identify and check every entry, then decode them.
    fn included(&self, raws: &[Box<RawValue>]) -> Result<Vec<Box<dyn Resource>>, UnmarshalError> {
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(raws.len());

        for (i, raw) in raws.iter().enumerate() {
            let pointer = format!("/included/{}", i);
            let value = parse(raw)?;
            let id = identifier(&value, &pointer)?;
            if !self.registry.contains(&id.type_name) {
                return Err(UnmarshalError::UnknownType {
                    type_name: id.type_name,
                    pointer: format!("{}/type", pointer),
                });
            }
            if !seen.insert(id.clone()) {
                if self.options.strict {
                    return Err(UnmarshalError::DuplicateIncluded {
                        type_name: id.type_name,
                        id: id.id,
                    });
                }
                tracing::debug!(resource = %id, %pointer, "skipping duplicate included resource");
                continue;
            }
            pending.push((pointer, value));
        }

        pending
            .iter()
            .map(|(pointer, value)| {
                self.resource(value, pointer)
                    .map(|res| Box::new(res) as Box<dyn Resource>)
            })
            .collect()
    }

    fn resource(&self, value: &Value, pointer: &str) -> Result<SoftResource, UnmarshalError> {
        let obj = value.as_object().ok_or_else(|| UnmarshalError::NotAnObject {
            pointer: pointer.to_string(),
            found: json_type_name(value).to_string(),
        })?;

        let type_name = match obj.get("type") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => {
                return Err(UnmarshalError::MissingType {
                    pointer: pointer.to_string(),
                })
            }
        };
        let desc = self
            .registry
            .lookup(type_name)
            .ok_or_else(|| UnmarshalError::UnknownType {
                type_name: type_name.clone(),
                pointer: format!("{}/type", pointer),
            })?;
        let mut res = SoftResource::new(Arc::clone(desc));

        match obj.get("id") {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) => res.set_id(id),
            Some(other) => {
                return Err(UnmarshalError::InvalidId {
                    pointer: format!("{}/id", pointer),
                    found: json_type_name(other).to_string(),
                })
            }
        }

        for member in obj.keys() {
            if !RESOURCE_MEMBERS.contains(&member.as_str()) {
                self.unknown_member(desc, member, &format!("{}/{}", pointer, member))?;
            }
        }

        if let Some(attrs) = members(obj, "attributes", pointer)? {
            for (name, value) in attrs {
                let field_pointer = format!("{}/attributes/{}", pointer, name);
                match desc.attr(name) {
                    Some(attr) => {
                        let invalid = |reason: String| UnmarshalError::InvalidAttribute {
                            type_name: desc.name().to_string(),
                            field: name.clone(),
                            pointer: field_pointer.clone(),
                            reason,
                        };
                        let decoded = attr
                            .kind
                            .decode(value, attr.nullable)
                            .map_err(|m| invalid(format!("expected {}, {}", attr.kind, m)))?;
                        res.set(name, decoded).map_err(|e| invalid(e.to_string()))?;
                    }
                    None => self.unknown_member(desc, name, &field_pointer)?,
                }
            }
        }

        if let Some(rels) = members(obj, "relationships", pointer)? {
            for (name, value) in rels {
                let rel_pointer = format!("{}/relationships/{}", pointer, name);
                match desc.rel(name) {
                    Some(_) => self.relationship(desc, &mut res, name, value, &rel_pointer)?,
                    None => self.unknown_member(desc, name, &rel_pointer)?,
                }
            }
        }

        tracing::trace!(resource = %res.identifier(), %pointer, "decoded resource");
        Ok(res)
    }

    fn relationship(
        &self,
        desc: &TypeDescriptor,
        res: &mut SoftResource,
        name: &str,
        value: &Value,
        pointer: &str,
    ) -> Result<(), UnmarshalError> {
        let rel_obj = value.as_object().ok_or_else(|| UnmarshalError::NotAnObject {
            pointer: pointer.to_string(),
            found: json_type_name(value).to_string(),
        })?;
        // Without data the linkage is unknown, the zero value stays.
        let Some(data) = rel_obj.get("data") else {
            return Ok(());
        };
        let data_pointer = format!("{}/data", pointer);
        let invalid = |reason: String| UnmarshalError::InvalidRelationship {
            type_name: desc.name().to_string(),
            field: name.to_string(),
            pointer: data_pointer.clone(),
            reason,
        };

        let Some(rel) = desc.rel(name) else {
            return Ok(());
        };
        let result = match (rel.cardinality, data) {
            (Cardinality::One, Value::Null) => res.set_to_one(name, ""),
            (Cardinality::One, Value::Object(_)) => {
                let id = self.linkage(desc, name, &rel.target, data, &data_pointer)?;
                res.set_to_one(name, &id)
            }
            (Cardinality::One, other) => {
                return Err(invalid(format!(
                    "to-one linkage must be an identifier or null, got {}",
                    json_type_name(other)
                )))
            }
            (Cardinality::Many, Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_pointer = format!("{}/{}", data_pointer, i);
                    ids.push(self.linkage(desc, name, &rel.target, item, &item_pointer)?);
                }
                res.set_to_many(name, ids)
            }
            (Cardinality::Many, other) => {
                return Err(invalid(format!(
                    "to-many linkage must be an array of identifiers, got {}",
                    json_type_name(other)
                )))
            }
        };
        result.map_err(|e| invalid(e.to_string()))
    }

    /// Read one identifier of relationship `name` and return its id.
    fn linkage(
        &self,
        desc: &TypeDescriptor,
        name: &str,
        target: &str,
        value: &Value,
        pointer: &str,
    ) -> Result<String, UnmarshalError> {
        let id = identifier(value, pointer)?;
        if id.type_name != target {
            return Err(UnmarshalError::RelationshipTypeMismatch {
                type_name: desc.name().to_string(),
                field: name.to_string(),
                pointer: pointer.to_string(),
                expected: target.to_string(),
                actual: id.type_name,
            });
        }
        // An empty id is indistinguishable from "no linkage".
        if id.id.is_empty() {
            return Err(UnmarshalError::InvalidRelationship {
                type_name: desc.name().to_string(),
                field: name.to_string(),
                pointer: format!("{}/id", pointer),
                reason: "linkage id is empty".to_string(),
            });
        }
        Ok(id.id)
    }

    /// An undeclared member: an error in strict mode, skipped otherwise.
    fn unknown_member(
        &self,
        desc: &TypeDescriptor,
        member: &str,
        pointer: &str,
    ) -> Result<(), UnmarshalError> {
        if self.options.strict {
            return Err(UnmarshalError::UnknownMember {
                type_name: desc.name().to_string(),
                member: member.to_string(),
                pointer: pointer.to_string(),
            });
        }
        tracing::trace!(type_name = desc.name(), member, "ignoring unknown member");
        Ok(())
    }
}

fn parse(raw: &RawValue) -> Result<Value, UnmarshalError> {
    serde_json::from_str(raw.get()).map_err(|source| UnmarshalError::InvalidJson { source })
}

/// The object held by member `name` of a resource object, `None` if the
/// member is absent or null.
fn members<'v>(
    obj: &'v Map<String, Value>,
    name: &str,
    pointer: &str,
) -> Result<Option<&'v Map<String, Value>>, UnmarshalError> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(UnmarshalError::NotAnObject {
            pointer: format!("{}/{}", pointer, name),
            found: json_type_name(other).to_string(),
        }),
    }
}

/// Read a resource identifier object.
fn identifier(value: &Value, pointer: &str) -> Result<Identifier, UnmarshalError> {
    let obj = value.as_object().ok_or_else(|| UnmarshalError::NotAnObject {
        pointer: pointer.to_string(),
        found: json_type_name(value).to_string(),
    })?;
    let type_name = match obj.get("type") {
        Some(Value::String(s)) if !s.is_empty() => s,
        _ => {
            return Err(UnmarshalError::MissingType {
                pointer: pointer.to_string(),
            })
        }
    };
    match obj.get("id") {
        Some(Value::String(id)) => Ok(Identifier::new(type_name, id)),
        other => Err(UnmarshalError::InvalidId {
            pointer: format!("{}/id", pointer),
            found: other.map_or("nothing", json_type_name).to_string(),
        }),
    }
}
