//! Integration tests for the marshal and unmarshal pipelines.

use std::sync::Arc;
use std::thread;

use jsonapi_doc::{
    marshal_document, marshal_value, unmarshal_document, unmarshal_str, AttrValue, Binding,
    Data, Document, ErrorObject, Fields, Identifier, IncludedSet, MarshalOptions, QueryParams,
    Registry, Resource, TypeDef, UnmarshalError, UnmarshalOptions,
};
use serde_json::{json, Value};

fn registry() -> Registry {
    Registry::from_defs(&[
        TypeDef::new("articles")
            .id("id")
            .attr("title", "string")
            .attr("value", "int")
            .to_one("author", "people")
            .to_many("comments", "comments"),
        TypeDef::new("people").id("id").attr("name", "string"),
        TypeDef::new("comments").id("id").attr("body", "string"),
    ])
    .unwrap()
}

fn person(registry: &Registry, id: &str, name: &str) -> Box<dyn Resource> {
    Box::new(
        registry
            .new_resource("people")
            .unwrap()
            .with_id(id)
            .with_attr("name", name)
            .unwrap(),
    )
}

/// A statically typed resource.
#[derive(Debug, Clone, Default, PartialEq)]
struct Article {
    id: String,
    title: String,
    value: i64,
    author: String,
    comments: Vec<String>,
}

fn articles(registry: &Registry) -> Binding<Article> {
    Fields::<Article>::new(|a| a.id.as_str(), |a, id| a.id = id.to_string())
        .attr("title", |a| a.title.as_str().into(), |a, v| {
            a.title = v.try_into()?;
            Ok(())
        })
        .attr("value", |a| a.value.into(), |a, v| {
            a.value = v.try_into()?;
            Ok(())
        })
        .to_one("author", |a| a.author.clone(), |a, id| a.author = id)
        .to_many("comments", |a| a.comments.clone(), |a, ids| a.comments = ids)
        .bind(registry, "articles")
        .unwrap()
}

fn article() -> Article {
    Article {
        id: "1".into(),
        title: "A".into(),
        value: 7,
        author: "9".into(),
        comments: vec!["c2".into(), "c1".into()],
    }
}

#[test]
fn articles_people_example() {
    let registry = registry();
    let params = QueryParams::new().include_data("articles", "author");
    let resolver = |id: &Identifier| -> Option<Box<dyn Resource>> {
        (id.type_name == "people").then(|| person(&registry, &id.id, "Bob"))
    };

    let mut doc = Document::with_resource(articles(&registry).wrap(article()));
    doc.include_related(&registry, &params, &resolver).unwrap();

    let value = marshal_value(&doc, &registry, &MarshalOptions::new().params(params)).unwrap();
    assert_eq!(
        value["data"]["relationships"]["author"]["data"],
        json!({ "type": "people", "id": "9" })
    );
    assert_eq!(
        value["included"],
        json!([{
            "type": "people",
            "id": "9",
            "attributes": { "name": "Bob" },
            "links": { "self": "/people/9" }
        }])
    );
}

#[test]
fn idempotent_inclusion() {
    let registry = registry();
    let mut doc = Document::with_resource(articles(&registry).wrap(article()));
    for _ in 0..5 {
        doc.include(person(&registry, "9", "Bob"));
    }
    assert_eq!(doc.included.len(), 1);

    let value = marshal_value(&doc, &registry, &MarshalOptions::new()).unwrap();
    assert_eq!(value["included"].as_array().unwrap().len(), 1);
}

#[test]
fn deterministic_included_order() {
    let registry = registry();
    let resources = [("people", "b"), ("comments", "a"), ("people", "a"), ("comments", "c")];

    let marshal_in = |order: &[(&str, &str)]| -> Vec<u8> {
        let mut doc = Document::with_resource(articles(&registry).wrap(article()));
        for (type_name, id) in order {
            let res = registry.new_resource(type_name).unwrap().with_id(*id);
            doc.include(Box::new(res));
        }
        let value = marshal_value(&doc, &registry, &MarshalOptions::new()).unwrap();
        serde_json::to_vec(&value["included"]).unwrap()
    };

    let forward = marshal_in(&resources);
    let mut reversed = resources;
    reversed.reverse();
    assert_eq!(forward, marshal_in(&reversed));

    let included: Value = serde_json::from_slice(&forward).unwrap();
    let keys: Vec<String> = included
        .as_array()
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r["type"].as_str().unwrap(), r["id"].as_str().unwrap()))
        .collect();
    assert_eq!(keys, ["comments a", "people a", "people b", "comments c"]);
}

#[test]
fn sparse_fieldset_on_typed_resource() {
    let registry = registry();
    let doc = Document::with_resource(articles(&registry).wrap(article()));
    let options = MarshalOptions::new().params(QueryParams::new().fields("articles", ["title"]));

    let value = marshal_value(&doc, &registry, &options).unwrap();
    assert_eq!(value["data"]["attributes"], json!({ "title": "A" }));
    assert!(value["data"].get("relationships").is_none());
}

#[test]
fn mutual_exclusivity() {
    let registry = registry();
    let doc = Document::with_errors(vec![ErrorObject::not_found()]);
    let value = marshal_value(&doc, &registry, &MarshalOptions::new()).unwrap();
    assert!(value.get("data").is_none());
    assert!(value.get("errors").is_some());

    let doc = Document::with_resource(articles(&registry).wrap(article()));
    let value = marshal_value(&doc, &registry, &MarshalOptions::new()).unwrap();
    assert!(value.get("data").is_some());
    assert!(value.get("errors").is_none());
}

#[test]
fn missing_data_rejection() {
    let result = unmarshal_str(r#"{"jsonapi": {"version": "1.0"}}"#, &registry(), &UnmarshalOptions::new());
    let err = result.unwrap_err();
    assert!(matches!(err, UnmarshalError::MissingPrimaryData));
    assert_eq!(ErrorObject::from(&err), ErrorObject::missing_data_member());
}

#[test]
fn typed_resource_round_trip() {
    let registry = registry();
    let original = article();
    let options = MarshalOptions::new().params(
        QueryParams::new()
            .include_data("articles", "author")
            .include_data("articles", "comments"),
    );
    let bytes = marshal_document(
        &Document::with_resource(articles(&registry).wrap(original.clone())),
        &registry,
        &options,
    )
    .unwrap();

    let doc = unmarshal_document(&bytes, &registry, &UnmarshalOptions::new().strict(true)).unwrap();
    let decoded = doc.data.as_resource().unwrap();
    assert_eq!(articles(&registry).extract(decoded).unwrap(), original);
}

#[test]
fn collection_round_trip_with_included() {
    let registry = registry();
    let col = articles(&registry).collection([
        article(),
        Article {
            id: "2".into(),
            ..article()
        },
    ]);
    let mut doc = Document::with_collection(col);
    doc.include(person(&registry, "9", "Bob"));
    doc.meta.insert("total".into(), json!(2));

    let options = MarshalOptions::new().params(QueryParams::new().include_data("articles", "author"));
    let bytes = marshal_document(&doc, &registry, &options).unwrap();
    let decoded = unmarshal_document(&bytes, &registry, &UnmarshalOptions::new()).unwrap();

    let col = decoded.data.as_collection().unwrap();
    assert_eq!(col.type_name(), "articles");
    let ids: Vec<&str> = col.iter().map(|r| r.id()).collect();
    assert_eq!(ids, ["1", "2"]);
    assert_eq!(col.at(1).unwrap().get_to_one("author").as_deref(), Some("9"));
    assert_eq!(
        decoded.included.get("people", "9").unwrap().get("name"),
        Some(AttrValue::from("Bob"))
    );
    assert_eq!(decoded.meta["total"], json!(2));
}

#[test]
fn identifier_documents_marshal() {
    let registry = registry();
    let doc = Document::with_identifier(Identifier::new("people", "9"));
    let value = marshal_value(&doc, &registry, &MarshalOptions::new()).unwrap();
    assert_eq!(value["data"], json!({ "type": "people", "id": "9" }));
}

#[test]
fn unmarshal_then_remarshal_is_stable() {
    let registry = registry();
    let payload = json!({
        "data": {
            "type": "articles",
            "id": "1",
            "attributes": { "title": "A", "value": 7 },
            "relationships": {
                "author": { "data": { "type": "people", "id": "9" } },
                "comments": { "data": [] }
            }
        },
        "included": [{ "type": "people", "id": "9", "attributes": { "name": "Bob" } }]
    });
    let options = MarshalOptions::new().params(
        QueryParams::new()
            .include_data("articles", "author")
            .include_data("articles", "comments"),
    );

    let doc = unmarshal_str(&payload.to_string(), &registry, &UnmarshalOptions::new()).unwrap();
    let first = marshal_document(&doc, &registry, &options).unwrap();
    let doc = unmarshal_document(&first, &registry, &UnmarshalOptions::new()).unwrap();
    let second = marshal_document(&doc, &registry, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn included_set_sorted_view() {
    let registry = registry();
    let mut set = IncludedSet::new();
    set.insert(person(&registry, "2", "Bob"));
    set.insert(person(&registry, "1", "Ann"));
    assert!(!set.insert(person(&registry, "2", "Other")));

    let names: Vec<AttrValue> = set
        .into_sorted()
        .iter()
        .filter_map(|r| r.get("name"))
        .collect();
    assert_eq!(names, [AttrValue::from("Ann"), AttrValue::from("Bob")]);
}

#[test]
fn registry_shared_between_threads() {
    let registry = Arc::new(registry());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let payload = format!(
                    r#"{{"data": {{"type": "people", "id": "{}", "attributes": {{"name": "P{}"}}}}}}"#,
                    i, i
                );
                let doc = unmarshal_str(&payload, &registry, &UnmarshalOptions::new()).unwrap();
                let bytes = marshal_document(&doc, &registry, &MarshalOptions::new()).unwrap();
                let value: Value = serde_json::from_slice(&bytes).unwrap();
                value["data"]["attributes"]["name"].as_str().unwrap().to_string()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("P{}", i));
    }
}

#[test]
fn null_primary_data_round_trip() {
    let registry = registry();
    let bytes = marshal_document(&Document::new(Data::Null), &registry, &MarshalOptions::new())
        .unwrap();
    assert_eq!(bytes, br#"{"data":null,"jsonapi":{"version":"1.0"}}"#);

    let doc = unmarshal_document(&bytes, &registry, &UnmarshalOptions::new()).unwrap();
    assert!(matches!(doc.data, Data::Null));
}

#[test]
fn document_moves_between_threads() {
    let registry = Arc::new(registry());
    let mut doc = Document::with_resource(articles(&registry).wrap(article()));
    doc.include(person(&registry, "9", "Bob"));

    let shared = Arc::clone(&registry);
    let value = thread::spawn(move || marshal_value(&doc, &shared, &MarshalOptions::new()))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(value["data"]["id"], "1");
    assert_eq!(value["included"][0]["id"], "9");
}
