//! Type registry - the field layout of every resource type.
//!
//! Types are described by a [`TypeDef`], a plain descriptor table that can be
//! written in code or deserialized from JSON:
//!
//! ```json
//! {
//!   "name": "articles",
//!   "fields": [
//!     { "role": "id", "name": "id" },
//!     { "role": "attr", "name": "title", "kind": "string" },
//!     { "role": "rel", "name": "author", "type": "people", "cardinality": "one" }
//!   ]
//! }
//! ```
//!
//! Definitions are validated and compiled into [`TypeDescriptor`]s by a
//! [`RegistryBuilder`]. Once built, a [`Registry`] is read-only and can be
//! shared freely between threads.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, RegistryError};
use crate::resource::{Identifier, Resource, SoftResource};
use crate::types::{AttrKind, Cardinality, RESERVED_MEMBERS};

/// Declared field of a type, as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum FieldDef {
    /// The field holding the resource id.
    Id { name: String },
    /// An attribute. `kind` must name one of the supported [`AttrKind`]s.
    Attr {
        name: String,
        kind: String,
        #[serde(default)]
        nullable: bool,
    },
    /// A relationship to resources of type `target`.
    Rel {
        name: String,
        #[serde(rename = "type", default)]
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cardinality: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inverse: Option<String>,
    },
}

/// Unvalidated description of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef::Id { name: name.into() });
        self
    }

    pub fn attr(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.fields.push(FieldDef::Attr {
            name: name.into(),
            kind: kind.into(),
            nullable: false,
        });
        self
    }

    pub fn nullable_attr(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.fields.push(FieldDef::Attr {
            name: name.into(),
            kind: kind.into(),
            nullable: true,
        });
        self
    }

    pub fn to_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.rel(name, target, "one")
    }

    pub fn to_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.rel(name, target, "many")
    }

    fn rel(mut self, name: impl Into<String>, target: impl Into<String>, cardinality: &str) -> Self {
        self.fields.push(FieldDef::Rel {
            name: name.into(),
            target: target.into(),
            cardinality: Some(cardinality.to_string()),
            inverse: None,
        });
        self
    }

    /// Set the inverse name of the most recently declared relationship.
    pub fn inverse(mut self, inverse: impl Into<String>) -> Self {
        if let Some(FieldDef::Rel { inverse: slot, .. }) = self.fields.last_mut() {
            *slot = Some(inverse.into());
        }
        self
    }
}

/// A validated attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrDescriptor {
    pub name: String,
    pub kind: AttrKind,
    pub nullable: bool,
}

/// A validated relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelDescriptor {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub inverse: Option<String>,
}

impl RelDescriptor {
    pub fn is_to_one(&self) -> bool {
        self.cardinality == Cardinality::One
    }
}

/// Compiled field layout of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    id_field: String,
    attrs: Vec<AttrDescriptor>,
    rels: Vec<RelDescriptor>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the native field that holds the id.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Attributes in declaration order.
    pub fn attrs(&self) -> &[AttrDescriptor] {
        &self.attrs
    }

    /// Relationships in declaration order.
    pub fn rels(&self) -> &[RelDescriptor] {
        &self.rels
    }

    pub fn attr(&self, name: &str) -> Option<&AttrDescriptor> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn rel(&self, name: &str) -> Option<&RelDescriptor> {
        self.rels.iter().find(|r| r.name == name)
    }

    /// Linkage of a to-one relationship as an identifier, `None` when empty.
    pub fn to_one_identifier(
        &self,
        res: &dyn Resource,
        rel: &str,
    ) -> Result<Option<Identifier>, FieldError> {
        let desc = self.expect_rel(rel, Cardinality::One)?;
        let id = res
            .get_to_one(rel)
            .ok_or_else(|| self.unknown_rel(rel))?;
        if id.is_empty() {
            return Ok(None);
        }
        Ok(Some(Identifier::new(&desc.target, id)))
    }

    /// Linkage of a to-many relationship as identifiers.
    pub fn to_many_identifiers(
        &self,
        res: &dyn Resource,
        rel: &str,
    ) -> Result<Vec<Identifier>, FieldError> {
        let desc = self.expect_rel(rel, Cardinality::Many)?;
        let ids = res
            .get_to_many(rel)
            .ok_or_else(|| self.unknown_rel(rel))?;
        Ok(ids
            .into_iter()
            .map(|id| Identifier::new(&desc.target, id))
            .collect())
    }

    /// Look up `rel` and check it has the given cardinality.
    pub(crate) fn expect_rel(
        &self,
        rel: &str,
        cardinality: Cardinality,
    ) -> Result<&RelDescriptor, FieldError> {
        let desc = self.rel(rel).ok_or_else(|| self.unknown_rel(rel))?;
        if desc.cardinality != cardinality {
            return Err(FieldError::CardinalityMismatch {
                type_name: self.name.clone(),
                field: rel.to_string(),
                expected: match desc.cardinality {
                    Cardinality::One => "one",
                    Cardinality::Many => "many",
                },
            });
        }
        Ok(desc)
    }

    fn unknown_rel(&self, rel: &str) -> FieldError {
        FieldError::UnknownRelationship {
            type_name: self.name.clone(),
            field: rel.to_string(),
        }
    }

    /// Validate a definition and compile it.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn compile(def: &TypeDef) -> Result<Self, RegistryError> {
        if def.name.is_empty() {
            return Err(RegistryError::EmptyTypeName);
        }
        let type_name = def.name.clone();

        let id_fields: Vec<&str> = def
            .fields
            .iter()
            .filter_map(|f| match f {
                FieldDef::Id { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        let id_field = match id_fields.as_slice() {
            [] => return Err(RegistryError::MissingIdField { type_name }),
            [one] => one.to_string(),
            _ => return Err(RegistryError::DuplicateIdField { type_name }),
        };

        let mut seen = HashSet::new();
        let mut attrs = Vec::new();
        let mut rels = Vec::new();

        for field in &def.fields {
            let name = match field {
                FieldDef::Id { .. } => continue,
                FieldDef::Attr { name, .. } | FieldDef::Rel { name, .. } => name,
            };
            if RESERVED_MEMBERS.contains(&name.as_str()) {
                return Err(RegistryError::ReservedFieldName {
                    type_name,
                    field: name.clone(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(RegistryError::DuplicateField {
                    type_name,
                    field: name.clone(),
                });
            }

            match field {
                FieldDef::Id { .. } => {}
                FieldDef::Attr {
                    name,
                    kind,
                    nullable,
                } => {
                    let parsed = AttrKind::parse(kind).ok_or_else(|| {
                        RegistryError::UnsupportedAttributeKind {
                            type_name: type_name.clone(),
                            field: name.clone(),
                            kind: kind.clone(),
                        }
                    })?;
                    attrs.push(AttrDescriptor {
                        name: name.clone(),
                        kind: parsed,
                        nullable: *nullable,
                    });
                }
                FieldDef::Rel {
                    name,
                    target,
                    cardinality,
                    inverse,
                } => {
                    let malformed = |reason: &str| RegistryError::MalformedRelationship {
                        type_name: type_name.clone(),
                        field: name.clone(),
                        reason: reason.to_string(),
                    };
                    if target.is_empty() {
                        return Err(malformed("target type is empty"));
                    }
                    let cardinality = match cardinality.as_deref() {
                        None => return Err(malformed("cardinality is missing")),
                        Some(c) => Cardinality::parse(c).ok_or_else(|| {
                            malformed(&format!(
                                "unknown cardinality \"{}\": expected one or many",
                                c
                            ))
                        })?,
                    };
                    rels.push(RelDescriptor {
                        name: name.clone(),
                        target: target.clone(),
                        cardinality,
                        inverse: inverse.clone(),
                    });
                }
            }
        }

        Ok(TypeDescriptor {
            name: type_name,
            id_field,
            attrs,
            rels,
        })
    }
}

/// Collects type definitions before the registry is sealed.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a type.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` describing the first problem with `def`,
    /// or `DuplicateType` if a type of that name was already registered.
    pub fn register(&mut self, def: &TypeDef) -> Result<(), RegistryError> {
        let descriptor = TypeDescriptor::compile(def)?;
        if self.types.contains_key(descriptor.name()) {
            return Err(RegistryError::DuplicateType {
                type_name: descriptor.name().to_string(),
            });
        }
        tracing::debug!(
            type_name = descriptor.name(),
            attrs = descriptor.attrs().len(),
            rels = descriptor.rels().len(),
            "registered type"
        );
        self.types
            .insert(descriptor.name().to_string(), Arc::new(descriptor));
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, def: &TypeDef) -> Result<Self, RegistryError> {
        self.register(def)?;
        Ok(self)
    }

    /// Seal the registry.
    pub fn build(self) -> Registry {
        Registry { types: self.types }
    }
}

/// Read-only set of registered types.
///
/// Relationship targets are not required to be registered here; a
/// relationship pointing at an unknown type fails when a document using it
/// is marshaled or unmarshaled.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register every definition and seal the registry.
    pub fn from_defs<'a>(
        defs: impl IntoIterator<Item = &'a TypeDef>,
    ) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        for def in defs {
            builder.register(def)?;
        }
        Ok(builder.build())
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    /// Like [`lookup`](Self::lookup), but a missing type is an error.
    pub fn get(&self, name: &str) -> Result<&Arc<TypeDescriptor>, RegistryError> {
        self.lookup(name).ok_or_else(|| RegistryError::TypeNotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A zero-valued resource of type `name`.
    pub fn new_resource(&self, name: &str) -> Result<SoftResource, RegistryError> {
        Ok(SoftResource::new(Arc::clone(self.get(name)?)))
    }
}
