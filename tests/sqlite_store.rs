//! SQLite backend and router assembly against a real database file.

use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use split_catalog::catalog;
use split_catalog::config::{load_config, Config};
use split_catalog::db;
use split_catalog::sqlite_store::{ensure_schema, SqliteStoreFactory};
use split_catalog_core::filter::Filter;
use split_catalog_core::models::Metacard;
use split_catalog_core::operations::{
    CreateRequest, DeleteRequest, QueryRequest, UpdateRequest,
};
use split_catalog_core::store::StoreFactory;

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("catalog.toml");
    fs::write(
        &config_path,
        format!(
            r#"[db]
path = "{}/data/catalog.sqlite"

[[rules]]
collection = "history"
tag = "revision"

[[rules]]
collection = "workspace"
metacard_type = "workspace"
"#,
            tmp.path().display()
        ),
    )
    .unwrap();
    let config = load_config(&config_path).unwrap();
    (tmp, config)
}

async fn factory(config: &Config) -> SqliteStoreFactory {
    let pool = db::connect(config).await.unwrap();
    ensure_schema(&pool).await.unwrap();
    SqliteStoreFactory::new(pool, "catalog")
}

#[tokio::test]
async fn test_provision_registers_collection_and_alias_unions() {
    let (_tmp, config) = setup();
    let factory = factory(&config).await;

    let a = factory.provision("alpha").await.unwrap();
    let b = factory.provision("beta").await.unwrap();
    // idempotent
    factory.provision("alpha").await.unwrap();
    assert_eq!(factory.discover().await.unwrap(), vec!["alpha", "beta"]);

    a.create(&CreateRequest::new(vec![Metacard::new("1").with_title("harbor")]))
        .await
        .unwrap();
    b.create(&CreateRequest::new(vec![
        Metacard::new("2").with_title("harbor survey").with_type("workspace"),
    ]))
    .await
    .unwrap();

    let alias = factory.alias("catalog").await.unwrap();
    let resp = alias
        .query(&QueryRequest::new(Filter::Text("harbor survey".into())))
        .await
        .unwrap();
    assert_eq!(resp.hits, 2);
    assert_eq!(resp.results[0].metacard.id, "2");

    let types = alias.content_types().await.unwrap();
    assert!(types.contains("workspace"));
    assert!(types.contains("resource"));

    assert!(alias
        .create(&CreateRequest::new(vec![Metacard::new("3")]))
        .await
        .is_err());
}

#[tokio::test]
async fn test_store_create_update_delete() {
    let (_tmp, config) = setup();
    let factory = factory(&config).await;
    let store = factory.provision("alpha").await.unwrap();

    let created = store
        .create(&CreateRequest::new(vec![
            Metacard::new("a").with_title("first"),
            Metacard::new("").with_attribute("media.format", json!("jpeg")),
        ]))
        .await
        .unwrap();
    assert_eq!(created.created.len(), 2);
    assert!(!created.created[1].id.is_empty());

    let updated = store
        .update(&UpdateRequest::new(vec![
            ("a".into(), Metacard::new("a").with_title("second")),
            ("missing".into(), Metacard::new("missing")),
        ]))
        .await
        .unwrap();
    assert_eq!(updated.updated.len(), 1);
    assert_eq!(updated.updated[0].old.title.as_deref(), Some("first"));
    assert_eq!(updated.processing_errors.len(), 1);

    let got = store
        .query(&QueryRequest::realtime_get(vec!["a".into()]))
        .await
        .unwrap();
    assert_eq!(got.results[0].metacard.title.as_deref(), Some("second"));

    let deleted = store
        .delete(&DeleteRequest::new(vec!["a".into(), "nope".into()]))
        .await
        .unwrap();
    assert_eq!(deleted.deleted.len(), 1);
    assert_eq!(deleted.deleted[0].id, "a");

    let rest = store.query(&QueryRequest::new(Filter::Any)).await.unwrap();
    assert_eq!(rest.hits, 1);
    assert!(store.is_available().await);
}

#[tokio::test]
async fn test_realtime_get_with_thousands_of_ids() {
    let (_tmp, config) = setup();
    let factory = factory(&config).await;
    let store = factory.provision("alpha").await.unwrap();
    store
        .create(&CreateRequest::new(vec![
            Metacard::new("keep-1"),
            Metacard::new("keep-2"),
            Metacard::new("keep-3"),
        ]))
        .await
        .unwrap();

    let mut ids: Vec<String> = (0..1500).map(|i| format!("absent-{i}")).collect();
    ids.insert(700, "keep-2".into());
    ids.push("keep-1".into());
    ids.push("keep-3".into());
    ids.push("keep-1".into());
    ids.extend((0..100).map(|i| format!("absent-{i}")));

    let got = store
        .query(&QueryRequest::realtime_get(ids.clone()))
        .await
        .unwrap();
    assert_eq!(got.hits, 3);
    let found: std::collections::BTreeSet<String> =
        got.results.iter().map(|r| r.metacard.id.clone()).collect();
    assert!(found.contains("keep-1") && found.contains("keep-2") && found.contains("keep-3"));

    let alias = factory.alias("catalog").await.unwrap();
    let through_alias = alias
        .query(&QueryRequest::realtime_get(ids))
        .await
        .unwrap();
    assert_eq!(through_alias.hits, 3);
}

#[tokio::test]
async fn test_routed_catalog_over_sqlite() {
    let (_tmp, config) = setup();
    let cat = catalog::open(&config).await.unwrap();

    cat.router
        .create(&CreateRequest::new(vec![
            Metacard::new("rev").with_tag("revision"),
            Metacard::new("ws").with_type("workspace"),
            Metacard::new("plain"),
        ]))
        .await
        .unwrap();

    let names: Vec<String> = cat
        .router
        .registry()
        .collections()
        .into_iter()
        .map(|h| h.name)
        .collect();
    assert_eq!(names, vec!["default", "history", "workspace"]);

    let all = cat
        .router
        .query(&QueryRequest::new(Filter::Any))
        .await
        .unwrap();
    assert_eq!(all.hits, 3);

    let rtg = cat
        .router
        .query(&QueryRequest::realtime_get(vec!["ws".into(), "rev".into()]))
        .await
        .unwrap();
    assert_eq!(rtg.hits, 2);

    let del = cat
        .router
        .delete(&DeleteRequest::new(vec!["plain".into()]))
        .await
        .unwrap();
    assert_eq!(del.deleted.len(), 1);
    assert_eq!(del.outcomes.len(), 3);
    cat.close().await;

    // A fresh router finds the collections created above.
    let reopened = catalog::open(&config).await.unwrap();
    assert_eq!(reopened.router.registry().len(), 3);
    let all = reopened
        .router
        .query(&QueryRequest::new(Filter::Any))
        .await
        .unwrap();
    assert_eq!(all.hits, 2);
    reopened.close().await;
}

#[tokio::test]
async fn test_concurrent_provisioning_through_registry() {
    use split_catalog_core::registry::CollectionRegistry;

    let (_tmp, config) = setup();
    let registry = Arc::new(CollectionRegistry::new(Arc::new(factory(&config).await)));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.get_or_provision("shared").await.unwrap()
        }));
    }
    let mut handles = Vec::new();
    for t in tasks {
        handles.push(t.await.unwrap());
    }
    for h in &handles[1..] {
        assert!(Arc::ptr_eq(&handles[0].store, &h.store));
    }
    assert_eq!(registry.len(), 1);
}
