//! Resources and resource identifiers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::registry::TypeDescriptor;
use crate::types::{AttrValue, Cardinality};

/// Minimal reference to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

impl Identifier {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name, self.id)
    }
}

/// Field access to a typed resource.
///
/// Relationship linkage is exposed as the ids of the related resources; the
/// related type comes from the [`TypeDescriptor`] of `type_name()`.
///
/// Attribute and relationship getters return `None` for names the type does
/// not declare. An unset to-one relationship is the empty string.
///
/// Resources are `Send + Sync`, so a [`Document`](crate::Document) can move
/// between threads.
pub trait Resource: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn type_name(&self) -> &str;

    fn set_id(&mut self, id: &str);

    fn get(&self, attr: &str) -> Option<AttrValue>;

    /// # Errors
    ///
    /// Fails if the attribute is unknown or `value` does not fit its kind.
    fn set(&mut self, attr: &str, value: AttrValue) -> Result<(), FieldError>;

    fn get_to_one(&self, rel: &str) -> Option<String>;

    fn set_to_one(&mut self, rel: &str, id: &str) -> Result<(), FieldError>;

    fn get_to_many(&self, rel: &str) -> Option<Vec<String>>;

    fn set_to_many(&mut self, rel: &str, ids: Vec<String>) -> Result<(), FieldError>;

    fn identifier(&self) -> Identifier {
        Identifier::new(self.type_name(), self.id())
    }
}

/// Supplies the full resource behind an identifier.
///
/// Returning `None` means the resource cannot be included; its relationship
/// is then emitted as linkage only.
pub trait Resolver {
    fn resolve(&self, id: &Identifier) -> Option<Box<dyn Resource>>;
}

impl<F> Resolver for F
where
    F: Fn(&Identifier) -> Option<Box<dyn Resource>>,
{
    fn resolve(&self, id: &Identifier) -> Option<Box<dyn Resource>> {
        self(id)
    }
}

/// A resource whose fields live in maps, checked against its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftResource {
    id: String,
    descriptor: Arc<TypeDescriptor>,
    attrs: BTreeMap<String, AttrValue>,
    to_one: BTreeMap<String, String>,
    to_many: BTreeMap<String, Vec<String>>,
}

impl SoftResource {
    /// A resource with an empty id and every field at its zero value.
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        let attrs = descriptor
            .attrs()
            .iter()
            .map(|a| {
                let zero = if a.nullable {
                    AttrValue::Null
                } else {
                    a.kind.zero()
                };
                (a.name.clone(), zero)
            })
            .collect();

        let mut to_one = BTreeMap::new();
        let mut to_many = BTreeMap::new();
        for rel in descriptor.rels() {
            match rel.cardinality {
                Cardinality::One => {
                    to_one.insert(rel.name.clone(), String::new());
                }
                Cardinality::Many => {
                    to_many.insert(rel.name.clone(), Vec::new());
                }
            }
        }

        Self {
            id: String::new(),
            descriptor,
            attrs,
            to_one,
            to_many,
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Builder-style id setter.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder-style attribute setter.
    pub fn with_attr(
        mut self,
        attr: &str,
        value: impl Into<AttrValue>,
    ) -> Result<Self, FieldError> {
        self.set(attr, value.into())?;
        Ok(self)
    }

    /// Builder-style to-one setter.
    pub fn with_to_one(mut self, rel: &str, id: &str) -> Result<Self, FieldError> {
        self.set_to_one(rel, id)?;
        Ok(self)
    }

    /// Builder-style to-many setter.
    pub fn with_to_many<I, S>(mut self, rel: &str, ids: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_to_many(rel, ids.into_iter().map(Into::into).collect())?;
        Ok(self)
    }
}

impl Resource for SoftResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn get(&self, attr: &str) -> Option<AttrValue> {
        self.attrs.get(attr).cloned()
    }

    fn set(&mut self, attr: &str, value: AttrValue) -> Result<(), FieldError> {
        let desc = self
            .descriptor
            .attr(attr)
            .ok_or_else(|| FieldError::UnknownAttribute {
                type_name: self.descriptor.name().to_string(),
                field: attr.to_string(),
            })?;
        let value = desc
            .kind
            .coerce(value, desc.nullable)
            .map_err(|mismatch| FieldError::KindMismatch {
                type_name: self.descriptor.name().to_string(),
                field: attr.to_string(),
                expected: desc.kind.to_string(),
                mismatch,
            })?;
        self.attrs.insert(attr.to_string(), value);
        Ok(())
    }

    fn get_to_one(&self, rel: &str) -> Option<String> {
        self.to_one.get(rel).cloned()
    }

    fn set_to_one(&mut self, rel: &str, id: &str) -> Result<(), FieldError> {
        self.descriptor.expect_rel(rel, Cardinality::One)?;
        self.to_one.insert(rel.to_string(), id.to_string());
        Ok(())
    }

    fn get_to_many(&self, rel: &str) -> Option<Vec<String>> {
        self.to_many.get(rel).cloned()
    }

    fn set_to_many(&mut self, rel: &str, ids: Vec<String>) -> Result<(), FieldError> {
        self.descriptor.expect_rel(rel, Cardinality::Many)?;
        self.to_many.insert(rel.to_string(), ids);
        Ok(())
    }
}
