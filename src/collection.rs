//! Ordered collections of resources.

use std::fmt;
use std::sync::Arc;

use crate::registry::TypeDescriptor;
use crate::resource::{Resource, SoftResource};

/// An ordered set of resources.
///
/// Collections are nominally of a single type, but generic code must not
/// rely on it: [`Resources`] may hold anything.
pub trait Collection: fmt::Debug + Send + Sync {
    /// Name of the resources' type, empty if the collection is not typed.
    fn type_name(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The resource at `index`, `None` when out of range.
    fn at(&self, index: usize) -> Option<&dyn Resource>;

    fn add(&mut self, res: Box<dyn Resource>);

    /// An empty resource of the collection's type, even if the collection
    /// is empty. `None` when the collection is not typed.
    fn sample(&self) -> Option<SoftResource>;

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Resource> + '_> {
        Box::new((0..self.len()).filter_map(move |i| self.at(i)))
    }
}

/// Resources that do not necessarily share a type.
#[derive(Debug, Default)]
pub struct Resources(Vec<Box<dyn Resource>>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<Box<dyn Resource>> {
        self.0
    }
}

impl From<Vec<Box<dyn Resource>>> for Resources {
    fn from(items: Vec<Box<dyn Resource>>) -> Self {
        Self(items)
    }
}

impl Collection for Resources {
    fn type_name(&self) -> &str {
        ""
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn at(&self, index: usize) -> Option<&dyn Resource> {
        self.0.get(index).map(|r| r.as_ref())
    }

    fn add(&mut self, res: Box<dyn Resource>) {
        self.0.push(res);
    }

    fn sample(&self) -> Option<SoftResource> {
        None
    }
}

/// Resources of one declared type.
#[derive(Debug)]
pub struct TypedCollection {
    descriptor: Arc<TypeDescriptor>,
    items: Vec<Box<dyn Resource>>,
}

impl TypedCollection {
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            descriptor,
            items: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn into_inner(self) -> Vec<Box<dyn Resource>> {
        self.items
    }
}

impl Collection for TypedCollection {
    fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn at(&self, index: usize) -> Option<&dyn Resource> {
        self.items.get(index).map(|r| r.as_ref())
    }

    fn add(&mut self, res: Box<dyn Resource>) {
        if res.type_name() != self.descriptor.name() {
            tracing::warn!(
                collection = self.descriptor.name(),
                resource = res.type_name(),
                "adding resource of another type to a typed collection"
            );
        }
        self.items.push(res);
    }

    fn sample(&self) -> Option<SoftResource> {
        Some(SoftResource::new(Arc::clone(&self.descriptor)))
    }
}
