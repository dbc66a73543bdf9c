//! The top-level document and its inclusion set.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection::Collection;
use crate::error::MarshalError;
use crate::error_object::ErrorObject;
use crate::registry::Registry;
use crate::resource::{Identifier, Resource, Resolver};
use crate::types::{Cardinality, QueryParams};

/// What a document carries as primary data.
///
/// Errors are a variant of their own, so a document can never hold both
/// errors and data.
#[derive(Debug, Default)]
pub enum Data {
    #[default]
    Null,
    Resource(Box<dyn Resource>),
    Collection(Box<dyn Collection>),
    Identifier(Identifier),
    Identifiers(Vec<Identifier>),
    Errors(Vec<ErrorObject>),
}

impl Data {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Resource(_) => "resource",
            Data::Collection(_) => "collection",
            Data::Identifier(_) => "identifier",
            Data::Identifiers(_) => "identifiers",
            Data::Errors(_) => "errors",
        }
    }

    pub fn as_resource(&self) -> Option<&dyn Resource> {
        match self {
            Data::Resource(res) => Some(res.as_ref()),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&dyn Collection> {
        match self {
            Data::Collection(col) => Some(col.as_ref()),
            _ => None,
        }
    }

    pub fn is_errors(&self) -> bool {
        matches!(self, Data::Errors(errors) if !errors.is_empty())
    }

    /// Primary resources, whatever the variant.
    pub fn resources(&self) -> Vec<&dyn Resource> {
        match self {
            Data::Resource(res) => vec![res.as_ref()],
            Data::Collection(col) => col.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if the resource `(type_name, id)` is primary data.
    pub fn contains(&self, type_name: &str, id: &str) -> bool {
        match self {
            Data::Resource(res) => res.type_name() == type_name && res.id() == id,
            Data::Collection(col) => col
                .iter()
                .any(|res| res.type_name() == type_name && res.id() == id),
            _ => false,
        }
    }
}

/// A link, either a bare URL or an object with meta information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    Href(String),
    Object {
        href: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        meta: Map<String, Value>,
    },
}

impl Link {
    pub fn href(&self) -> &str {
        match self {
            Link::Href(href) | Link::Object { href, .. } => href,
        }
    }
}

impl From<&str> for Link {
    fn from(href: &str) -> Self {
        Link::Href(href.to_string())
    }
}

impl From<String> for Link {
    fn from(href: String) -> Self {
        Link::Href(href)
    }
}

/// Resources side-loaded next to the primary data.
///
/// Keyed by `(type, id)`; inserting a resource whose identifier is already
/// present does nothing. Iteration order of the underlying map is not
/// meaningful, use [`sorted`](Self::sorted).
#[derive(Debug, Default)]
pub struct IncludedSet {
    entries: HashMap<Identifier, Box<dyn Resource>>,
}

impl IncludedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `res` unless a resource with the same type and id is present.
    ///
    /// Returns true if the resource was added.
    pub fn insert(&mut self, res: Box<dyn Resource>) -> bool {
        let key = res.identifier();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, res);
        true
    }

    pub fn contains(&self, type_name: &str, id: &str) -> bool {
        self.entries.contains_key(&Identifier::new(type_name, id))
    }

    pub fn get(&self, type_name: &str, id: &str) -> Option<&dyn Resource> {
        self.entries
            .get(&Identifier::new(type_name, id))
            .map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Included resources sorted by id, then by type.
    pub fn sorted(&self) -> Vec<&dyn Resource> {
        let mut resources: Vec<&dyn Resource> =
            self.entries.values().map(|r| r.as_ref()).collect();
        resources.sort_by(|a, b| inclusion_order(*a, *b));
        resources
    }

    /// Consume the set, sorted like [`sorted`](Self::sorted).
    pub fn into_sorted(self) -> Vec<Box<dyn Resource>> {
        let mut resources: Vec<Box<dyn Resource>> = self.entries.into_values().collect();
        resources.sort_by(|a, b| inclusion_order(a.as_ref(), b.as_ref()));
        resources
    }
}

fn inclusion_order(a: &dyn Resource, b: &dyn Resource) -> Ordering {
    a.id()
        .cmp(b.id())
        .then_with(|| a.type_name().cmp(b.type_name()))
}

/// A JSON:API document.
#[derive(Debug, Default)]
pub struct Document {
    pub data: Data,
    pub included: IncludedSet,
    pub links: BTreeMap<String, Link>,
    pub meta: Map<String, Value>,
}

impl Document {
    pub fn new(data: Data) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn with_resource(res: impl Resource + 'static) -> Self {
        Self::new(Data::Resource(Box::new(res)))
    }

    pub fn with_collection(col: impl Collection + 'static) -> Self {
        Self::new(Data::Collection(Box::new(col)))
    }

    pub fn with_identifier(id: Identifier) -> Self {
        Self::new(Data::Identifier(id))
    }

    pub fn with_identifiers(ids: Vec<Identifier>) -> Self {
        Self::new(Data::Identifiers(ids))
    }

    pub fn with_errors(errors: Vec<ErrorObject>) -> Self {
        Self::new(Data::Errors(errors))
    }

    /// Side-load `res`.
    ///
    /// Resources that are primary data or already included are skipped.
    /// Returns true if the resource was added.
    pub fn include(&mut self, res: Box<dyn Resource>) -> bool {
        if self.data.contains(res.type_name(), res.id()) {
            return false;
        }
        self.included.insert(res)
    }

    /// Side-load the targets of every relationship selected by
    /// `params.relationship_data` on the primary resources.
    ///
    /// Targets are fetched from `resolver`; targets it cannot supply stay
    /// linkage-only. Returns the number of resources added.
    ///
    /// # Errors
    ///
    /// Returns `MarshalError::UnknownType` if a primary resource, or the
    /// target of a selected relationship, has an unregistered type. Nothing
    /// is included in that case.
    pub fn include_related(
        &mut self,
        registry: &Registry,
        params: &QueryParams,
        resolver: &dyn Resolver,
    ) -> Result<usize, MarshalError> {
        let mut targets = Vec::new();
        for res in self.data.resources() {
            collect_targets(res, registry, params, &mut targets)?;
        }

        let mut added = 0;
        for target in targets {
            if self.data.contains(&target.type_name, &target.id)
                || self.included.contains(&target.type_name, &target.id)
            {
                continue;
            }
            match resolver.resolve(&target) {
                Some(res) => {
                    if self.include(res) {
                        added += 1;
                    }
                }
                None => {
                    tracing::debug!(related = %target, "related resource not resolved, linkage only")
                }
            }
        }
        tracing::debug!(added, total = self.included.len(), "included related resources");
        Ok(added)
    }
}

/// Identifiers of the related resources whose data `params` asks for.
fn collect_targets(
    res: &dyn Resource,
    registry: &Registry,
    params: &QueryParams,
    targets: &mut Vec<Identifier>,
) -> Result<(), MarshalError> {
    let desc = registry
        .lookup(res.type_name())
        .ok_or_else(|| MarshalError::UnknownType {
            type_name: res.type_name().to_string(),
        })?;

    for rel in desc.rels() {
        if !params.wants_data(desc.name(), &rel.name) {
            continue;
        }
        if !registry.contains(&rel.target) {
            return Err(MarshalError::UnknownType {
                type_name: rel.target.clone(),
            });
        }
        match rel.cardinality {
            Cardinality::One => {
                if let Some(id) = desc.to_one_identifier(res, &rel.name)? {
                    targets.push(id);
                }
            }
            Cardinality::Many => targets.extend(desc.to_many_identifiers(res, &rel.name)?),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::collection::{Resources, TypedCollection};
    use crate::registry::TypeDef;
    use crate::resource::SoftResource;

    fn registry() -> Registry {
        Registry::from_defs(&[
            TypeDef::new("articles")
                .id("id")
                .attr("title", "string")
                .to_one("author", "people")
                .to_many("comments", "comments"),
            TypeDef::new("people").id("id").attr("name", "string"),
            TypeDef::new("comments").id("id").attr("body", "string"),
        ])
        .unwrap()
    }

    fn resource(registry: &Registry, type_name: &str, id: &str) -> Box<dyn Resource> {
        Box::new(registry.new_resource(type_name).unwrap().with_id(id))
    }

    #[test]
    fn include_is_idempotent() {
        let registry = registry();
        let mut doc = Document::default();

        assert!(doc.include(resource(&registry, "people", "9")));
        for _ in 0..3 {
            assert!(!doc.include(resource(&registry, "people", "9")));
        }
        assert_eq!(doc.included.len(), 1);

        // Same id, different type, is another resource.
        assert!(doc.include(resource(&registry, "comments", "9")));
        assert_eq!(doc.included.len(), 2);
    }

    #[test]
    fn include_skips_primary_data() {
        let registry = registry();
        let mut doc = Document::new(Data::Resource(resource(&registry, "articles", "1")));
        assert!(!doc.include(resource(&registry, "articles", "1")));
        assert!(doc.included.is_empty());

        let mut col = TypedCollection::new(registry.get("people").unwrap().clone());
        col.add(resource(&registry, "people", "1"));
        col.add(resource(&registry, "people", "2"));
        let mut doc = Document::with_collection(col);
        assert!(!doc.include(resource(&registry, "people", "2")));
        assert!(doc.include(resource(&registry, "people", "3")));
    }

    #[test]
    fn sorted_is_independent_of_insertion_order() {
        let registry = registry();
        let keys = [("people", "b"), ("comments", "a"), ("people", "a"), ("people", "c")];

        let mut forward = IncludedSet::new();
        for (t, id) in keys {
            forward.insert(resource(&registry, t, id));
        }
        let mut backward = IncludedSet::new();
        for (t, id) in keys.iter().rev() {
            backward.insert(resource(&registry, t, id));
        }

        let order = |set: &IncludedSet| -> Vec<String> {
            set.sorted().iter().map(|r| r.identifier().to_string()).collect()
        };
        assert_eq!(order(&forward), ["comments a", "people a", "people b", "people c"]);
        assert_eq!(order(&forward), order(&backward));
    }

    #[test]
    fn include_related_resolves_selected_relationships() {
        let registry = registry();
        let article = registry
            .new_resource("articles")
            .unwrap()
            .with_id("1")
            .with_to_one("author", "9")
            .unwrap()
            .with_to_many("comments", ["c1", "c2"])
            .unwrap();
        let mut doc = Document::with_resource(article);

        let params = QueryParams::new().include_data("articles", "author");
        let resolver = |id: &Identifier| -> Option<Box<dyn Resource>> {
            let res: SoftResource = registry.new_resource(&id.type_name).ok()?.with_id(&id.id);
            Some(Box::new(res))
        };

        let added = doc.include_related(&registry, &params, &resolver).unwrap();
        assert_eq!(added, 1);
        assert!(doc.included.contains("people", "9"));
        assert!(!doc.included.contains("comments", "c1"));

        let params = params.include_data("articles", "comments");
        let added = doc.include_related(&registry, &params, &resolver).unwrap();
        assert_eq!(added, 2);
        assert_eq!(doc.included.len(), 3);
    }

    #[test]
    fn include_related_over_collection() {
        let registry = registry();
        let article = |id: &str, author: &str| -> Box<dyn Resource> {
            Box::new(
                registry
                    .new_resource("articles")
                    .unwrap()
                    .with_id(id)
                    .with_to_one("author", author)
                    .unwrap(),
            )
        };
        let calls = RefCell::new(Vec::new());
        let resolver = |id: &Identifier| -> Option<Box<dyn Resource>> {
            calls.borrow_mut().push(id.clone());
            Some(resource(&registry, &id.type_name, &id.id))
        };
        let params = QueryParams::new().include_data("articles", "author");

        // Two articles sharing an author resolve it once.
        let mut col = TypedCollection::new(registry.get("articles").unwrap().clone());
        col.add(article("1", "9"));
        col.add(article("2", "9"));
        let mut doc = Document::with_collection(col);
        assert_eq!(doc.include_related(&registry, &params, &resolver).unwrap(), 1);
        assert_eq!(*calls.borrow(), [Identifier::new("people", "9")]);
        assert!(doc.included.contains("people", "9"));

        // A target that is itself primary data is never resolved or included.
        calls.borrow_mut().clear();
        let mut col = Resources::new();
        col.add(article("1", "9"));
        col.add(article("2", "9"));
        col.add(article("3", "5"));
        col.add(resource(&registry, "people", "5"));
        let mut doc = Document::with_collection(col);
        assert_eq!(doc.include_related(&registry, &params, &resolver).unwrap(), 1);
        assert_eq!(*calls.borrow(), [Identifier::new("people", "9")]);
        assert_eq!(doc.included.len(), 1);
        assert!(!doc.included.contains("people", "5"));
    }

    #[test]
    fn included_keys_do_not_collide() {
        let registry = Registry::from_defs(&[
            TypeDef::new("a").id("id"),
            TypeDef::new("a b").id("id"),
        ])
        .unwrap();
        let mut doc = Document::default();
        assert!(doc.include(resource(&registry, "a", "b c")));
        assert!(doc.include(resource(&registry, "a b", "c")));
        assert_eq!(doc.included.len(), 2);
        assert_eq!(doc.included.get("a b", "c").map(|r| r.type_name()), Some("a b"));
        assert!(!doc.included.contains("a", "b"));
    }

    #[test]
    fn include_related_leaves_unresolved_targets_out() {
        let registry = registry();
        let article = registry
            .new_resource("articles")
            .unwrap()
            .with_id("1")
            .with_to_one("author", "9")
            .unwrap();
        let mut doc = Document::with_resource(article);
        let params = QueryParams::new().include_data("articles", "author");
        let resolver = |_: &Identifier| -> Option<Box<dyn Resource>> { None };

        assert_eq!(doc.include_related(&registry, &params, &resolver).unwrap(), 0);
        assert!(doc.included.is_empty());
    }

    #[test]
    fn include_related_rejects_unregistered_target() {
        let registry = Registry::from_defs(&[TypeDef::new("articles")
            .id("id")
            .to_one("author", "people")])
        .unwrap();
        let article = registry
            .new_resource("articles")
            .unwrap()
            .with_id("1")
            .with_to_one("author", "9")
            .unwrap();
        let mut doc = Document::with_resource(article);
        let params = QueryParams::new().include_data("articles", "author");
        let resolver = |_: &Identifier| -> Option<Box<dyn Resource>> { None };

        let result = doc.include_related(&registry, &params, &resolver);
        assert!(matches!(
            result,
            Err(MarshalError::UnknownType { type_name }) if type_name == "people"
        ));
    }

    #[test]
    fn link_forms() {
        let plain: Link = serde_json::from_str(r#""https://example.org""#).unwrap();
        assert_eq!(plain, Link::from("https://example.org"));

        let object: Link =
            serde_json::from_str(r#"{"href":"https://example.org","meta":{"count":2}}"#).unwrap();
        assert_eq!(object.href(), "https://example.org");
        assert!(matches!(object, Link::Object { .. }));
    }

    #[test]
    fn empty_errors_are_not_errors() {
        assert!(!Data::Errors(Vec::new()).is_errors());
        assert!(Data::Errors(vec![ErrorObject::not_found()]).is_errors());
    }
}
