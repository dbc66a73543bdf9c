//! JSON:API document codec
//!
//! Schema-driven marshaling and unmarshaling of JSON:API documents.
//!
//! Resource types are declared once in a [`Registry`], then used by every
//! marshal and unmarshal call to map resources to and from their wire
//! shape. The registry is read-only once built and can be shared between
//! threads.
//!
//! Resources are either dynamic ([`SoftResource`]) or native structs exposed
//! through a [`Binding`] of their fields.
//!
//! # Example
//!
//! ```
//! use jsonapi_doc::{
//!     marshal_value, Document, Identifier, MarshalOptions, QueryParams, Registry, Resource,
//!     TypeDef,
//! };
//! use serde_json::json;
//!
//! let registry = Registry::from_defs(&[
//!     TypeDef::new("articles")
//!         .id("id")
//!         .attr("title", "string")
//!         .to_one("author", "people"),
//!     TypeDef::new("people").id("id").attr("name", "string"),
//! ])
//! .unwrap();
//!
//! let article = registry
//!     .new_resource("articles")
//!     .unwrap()
//!     .with_id("1")
//!     .with_attr("title", "A")
//!     .unwrap()
//!     .with_to_one("author", "9")
//!     .unwrap();
//!
//! let params = QueryParams::new().include_data("articles", "author");
//! let resolver = |id: &Identifier| -> Option<Box<dyn Resource>> {
//!     let person = registry
//!         .new_resource(&id.type_name)
//!         .ok()?
//!         .with_id(&id.id)
//!         .with_attr("name", "Bob")
//!         .ok()?;
//!     Some(Box::new(person))
//! };
//!
//! let mut doc = Document::with_resource(article);
//! doc.include_related(&registry, &params, &resolver).unwrap();
//!
//! let value = marshal_value(&doc, &registry, &MarshalOptions::new().params(params)).unwrap();
//! assert_eq!(
//!     value["data"]["relationships"]["author"]["data"],
//!     json!({ "type": "people", "id": "9" })
//! );
//! assert_eq!(value["included"][0]["attributes"], json!({ "name": "Bob" }));
//! ```
//!
//! # Type Descriptions
//!
//! | Role | Members | Meaning |
//! |------|---------|---------|
//! | `id` | `name` | Field holding the resource id, exactly one per type |
//! | `attr` | `name`, `kind`, `nullable` | Attribute of a supported kind |
//! | `rel` | `name`, `type`, `cardinality`, `inverse` | Relationship to `type`, `one` or `many` |
//!
//! Supported attribute kinds: `string`, `int`, `int8`..`int64`, `uint`,
//! `uint8`..`uint64`, `bool` and `time` (RFC 3339).

mod binding;
mod collection;
mod document;
mod error;
mod error_object;
mod loader;
mod marshal;
mod registry;
mod resource;
mod types;
mod unmarshal;
mod validator;

pub use binding::{Binding, Fields, Wrap};
pub use collection::{Collection, Resources, TypedCollection};
pub use document::{Data, Document, IncludedSet, Link};
pub use error::{
    FieldError, LoadError, MarshalError, RegistryError, UnmarshalError, ValidateError, Violation,
};
pub use error_object::{ErrorObject, ErrorSource};
pub use loader::{is_url, load_payload, load_types, load_types_auto, load_types_str};
pub use marshal::{marshal_collection, marshal_document, marshal_resource, marshal_value};
pub use registry::{
    AttrDescriptor, FieldDef, RegistryBuilder, RelDescriptor, Registry, TypeDef, TypeDescriptor,
};
pub use resource::{Identifier, Resolver, Resource, SoftResource};
pub use types::{
    AttrKind, AttrValue, Cardinality, KindMismatch, MarshalOptions, QueryParams,
    UnmarshalOptions, JSONAPI_VERSION,
};
pub use unmarshal::{unmarshal_document, unmarshal_str};
pub use validator::{envelope_schema, validate_document};

#[cfg(feature = "remote")]
pub use loader::load_types_url;
