//! Statically typed resources.
//!
//! A [`Fields`] table maps the native fields of a struct onto the members of
//! a registered type with plain function pointers. Binding it against the
//! registry checks the table against the type's descriptor once; the
//! resulting [`Binding`] then wraps values of the struct as resources.
//!
//! ```
//! use jsonapi_doc::{Fields, Registry, Resource, TypeDef};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: String,
//!     name: String,
//! }
//!
//! let registry =
//!     Registry::from_defs(&[TypeDef::new("people").id("id").attr("name", "string")]).unwrap();
//! let people = Fields::<Person>::new(|p| p.id.as_str(), |p, id| p.id = id.to_string())
//!     .attr("name", |p| p.name.as_str().into(), |p, v| {
//!         p.name = v.try_into()?;
//!         Ok(())
//!     })
//!     .bind(&registry, "people")
//!     .unwrap();
//!
//! let bob = people.wrap(Person { id: "9".into(), name: "Bob".into() });
//! assert_eq!(bob.identifier().to_string(), "people 9");
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::collection::{Collection, TypedCollection};
use crate::error::{FieldError, RegistryError};
use crate::registry::{Registry, TypeDescriptor};
use crate::resource::Resource;
use crate::types::{AttrValue, Cardinality, KindMismatch};

type AttrGetter<T> = fn(&T) -> AttrValue;
type AttrSetter<T> = fn(&mut T, AttrValue) -> Result<(), KindMismatch>;

struct AttrAccess<T> {
    name: String,
    get: AttrGetter<T>,
    set: AttrSetter<T>,
}

enum RelAccess<T> {
    One {
        get: fn(&T) -> String,
        set: fn(&mut T, String),
    },
    Many {
        get: fn(&T) -> Vec<String>,
        set: fn(&mut T, Vec<String>),
    },
}

impl<T> RelAccess<T> {
    fn cardinality(&self) -> Cardinality {
        match self {
            RelAccess::One { .. } => Cardinality::One,
            RelAccess::Many { .. } => Cardinality::Many,
        }
    }
}

/// Accessors for the fields of `T`, keyed by member name.
///
/// Attribute setters receive values already checked against the declared
/// kind; converting with `try_into()` is enough.
pub struct Fields<T> {
    get_id: fn(&T) -> &str,
    set_id: fn(&mut T, &str),
    attrs: Vec<AttrAccess<T>>,
    rels: Vec<(String, RelAccess<T>)>,
}

impl<T> Fields<T> {
    pub fn new(get_id: fn(&T) -> &str, set_id: fn(&mut T, &str)) -> Self {
        Self {
            get_id,
            set_id,
            attrs: Vec::new(),
            rels: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, get: AttrGetter<T>, set: AttrSetter<T>) -> Self {
        self.attrs.push(AttrAccess {
            name: name.into(),
            get,
            set,
        });
        self
    }

    /// A to-one relationship; the empty string means no linkage.
    pub fn to_one(
        mut self,
        name: impl Into<String>,
        get: fn(&T) -> String,
        set: fn(&mut T, String),
    ) -> Self {
        self.rels.push((name.into(), RelAccess::One { get, set }));
        self
    }

    pub fn to_many(
        mut self,
        name: impl Into<String>,
        get: fn(&T) -> Vec<String>,
        set: fn(&mut T, Vec<String>),
    ) -> Self {
        self.rels.push((name.into(), RelAccess::Many { get, set }));
        self
    }

    /// Check the table against registered type `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `TypeNotFound` for an unregistered type, `MissingAccessor`
    /// when a declared field has no accessor, and `AccessorMismatch` when an
    /// accessor names an undeclared field, has the wrong cardinality or is
    /// given twice.
    pub fn bind(self, registry: &Registry, type_name: &str) -> Result<Binding<T>, RegistryError> {
        let descriptor = Arc::clone(registry.get(type_name)?);
        let mismatch = |field: &str, reason: &str| RegistryError::AccessorMismatch {
            type_name: type_name.to_string(),
            field: field.to_string(),
            reason: reason.to_string(),
        };

        let mut seen = HashSet::new();
        for access in &self.attrs {
            if !seen.insert(access.name.as_str()) {
                return Err(mismatch(&access.name, "bound twice"));
            }
            if descriptor.attr(&access.name).is_none() {
                return Err(mismatch(&access.name, "not a declared attribute"));
            }
        }
        for (name, access) in &self.rels {
            if !seen.insert(name.as_str()) {
                return Err(mismatch(name, "bound twice"));
            }
            match descriptor.rel(name) {
                None => return Err(mismatch(name, "not a declared relationship")),
                Some(rel) if rel.cardinality != access.cardinality() => {
                    let reason = match rel.cardinality {
                        Cardinality::One => "declared to-one",
                        Cardinality::Many => "declared to-many",
                    };
                    return Err(mismatch(name, reason));
                }
                Some(_) => {}
            }
        }

        let declared = descriptor
            .attrs()
            .iter()
            .map(|a| a.name.as_str())
            .chain(descriptor.rels().iter().map(|r| r.name.as_str()));
        for field in declared {
            if !seen.contains(field) {
                return Err(RegistryError::MissingAccessor {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                });
            }
        }

        tracing::debug!(type_name, "bound native fields");
        Ok(Binding {
            inner: Arc::new(BindingInner {
                descriptor,
                fields: self,
            }),
        })
    }
}

struct BindingInner<T> {
    descriptor: Arc<TypeDescriptor>,
    fields: Fields<T>,
}

/// A [`Fields`] table checked against its registered type.
///
/// Cloning is cheap; every wrapped value shares the table.
pub struct Binding<T> {
    inner: Arc<BindingInner<T>>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("type", &self.inner.descriptor.name())
            .finish_non_exhaustive()
    }
}

impl<T> Binding<T> {
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.inner.descriptor
    }

    pub fn wrap(&self, value: T) -> Wrap<T> {
        Wrap {
            value,
            binding: self.clone(),
        }
    }
}

impl<T> Binding<T>
where
    T: fmt::Debug + Send + Sync + 'static,
{
    /// A typed collection holding every value of `values`, wrapped.
    pub fn collection(&self, values: impl IntoIterator<Item = T>) -> TypedCollection {
        let mut col = TypedCollection::new(Arc::clone(&self.inner.descriptor));
        for value in values {
            col.add(Box::new(self.wrap(value)));
        }
        col
    }
}

impl<T> Binding<T>
where
    T: fmt::Debug + Default + Send + Sync,
{
    /// Copy any resource of the bound type into a new `T`.
    ///
    /// # Errors
    ///
    /// Fails if `res` lacks a bound field or holds a value that does not
    /// fit it.
    pub fn extract(&self, res: &dyn Resource) -> Result<T, FieldError> {
        let mut out = self.wrap(T::default());
        out.set_id(res.id());

        let type_name = self.descriptor().name();
        let missing_attr = |field: &str| FieldError::UnknownAttribute {
            type_name: type_name.to_string(),
            field: field.to_string(),
        };
        let missing_rel = |field: &str| FieldError::UnknownRelationship {
            type_name: type_name.to_string(),
            field: field.to_string(),
        };

        for access in &self.inner.fields.attrs {
            let value = res.get(&access.name).ok_or_else(|| missing_attr(&access.name))?;
            out.set(&access.name, value)?;
        }
        for (name, access) in &self.inner.fields.rels {
            match access {
                RelAccess::One { .. } => {
                    let id = res.get_to_one(name).ok_or_else(|| missing_rel(name))?;
                    out.set_to_one(name, &id)?;
                }
                RelAccess::Many { .. } => {
                    let ids = res.get_to_many(name).ok_or_else(|| missing_rel(name))?;
                    out.set_to_many(name, ids)?;
                }
            }
        }
        Ok(out.into_inner())
    }
}

/// A native value exposed as a [`Resource`] through its [`Binding`].
pub struct Wrap<T> {
    value: T,
    binding: Binding<T>,
}

impl<T> Wrap<T> {
    pub fn get_ref(&self) -> &T {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    fn fields(&self) -> &Fields<T> {
        &self.binding.inner.fields
    }

    fn rel_access(&self, rel: &str) -> Option<&RelAccess<T>> {
        self.fields()
            .rels
            .iter()
            .find(|(name, _)| name == rel)
            .map(|(_, access)| access)
    }

    fn unknown_rel(&self, rel: &str) -> FieldError {
        FieldError::UnknownRelationship {
            type_name: self.binding.descriptor().name().to_string(),
            field: rel.to_string(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Wrap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrap")
            .field("type", &self.binding.descriptor().name())
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Resource for Wrap<T>
where
    T: fmt::Debug + Send + Sync,
{
    fn id(&self) -> &str {
        (self.fields().get_id)(&self.value)
    }

    fn type_name(&self) -> &str {
        self.binding.descriptor().name()
    }

    fn set_id(&mut self, id: &str) {
        (self.binding.inner.fields.set_id)(&mut self.value, id)
    }

    fn get(&self, attr: &str) -> Option<AttrValue> {
        self.fields()
            .attrs
            .iter()
            .find(|a| a.name == attr)
            .map(|a| (a.get)(&self.value))
    }

    fn set(&mut self, attr: &str, value: AttrValue) -> Result<(), FieldError> {
        let descriptor = Arc::clone(&self.binding.inner.descriptor);
        let unknown = || FieldError::UnknownAttribute {
            type_name: descriptor.name().to_string(),
            field: attr.to_string(),
        };
        let desc = descriptor.attr(attr).ok_or_else(unknown)?;
        let mismatch = |mismatch: KindMismatch| FieldError::KindMismatch {
            type_name: descriptor.name().to_string(),
            field: attr.to_string(),
            expected: desc.kind.to_string(),
            mismatch,
        };
        let value = desc.kind.coerce(value, desc.nullable).map_err(mismatch)?;

        let set = self
            .fields()
            .attrs
            .iter()
            .find(|a| a.name == attr)
            .map(|a| a.set)
            .ok_or_else(unknown)?;
        set(&mut self.value, value).map_err(mismatch)
    }

    fn get_to_one(&self, rel: &str) -> Option<String> {
        match self.rel_access(rel)? {
            RelAccess::One { get, .. } => Some(get(&self.value)),
            RelAccess::Many { .. } => None,
        }
    }

    fn set_to_one(&mut self, rel: &str, id: &str) -> Result<(), FieldError> {
        self.binding.descriptor().expect_rel(rel, Cardinality::One)?;
        let set = match self.rel_access(rel) {
            Some(RelAccess::One { set, .. }) => *set,
            _ => return Err(self.unknown_rel(rel)),
        };
        set(&mut self.value, id.to_string());
        Ok(())
    }

    fn get_to_many(&self, rel: &str) -> Option<Vec<String>> {
        match self.rel_access(rel)? {
            RelAccess::Many { get, .. } => Some(get(&self.value)),
            RelAccess::One { .. } => None,
        }
    }

    fn set_to_many(&mut self, rel: &str, ids: Vec<String>) -> Result<(), FieldError> {
        self.binding.descriptor().expect_rel(rel, Cardinality::Many)?;
        let set = match self.rel_access(rel) {
            Some(RelAccess::Many { set, .. }) => *set,
            _ => return Err(self.unknown_rel(rel)),
        };
        set(&mut self.value, ids);
        Ok(())
    }
}
