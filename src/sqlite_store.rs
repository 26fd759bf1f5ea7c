//! SQLite-backed collections.
//!
//! Each collection is its own table, `mc_<name>`, registered in the
//! `collections` table. The alias is a SQL view, `alias_<name>`, that unions
//! every registered table; it is rebuilt whenever a collection is
//! provisioned. Collection names are restricted to `[A-Za-z0-9_]`, which is
//! what makes interpolating them into identifiers safe.
//!
//! SQLite makes every committed statement visible at once, so
//! [`CatalogStore::commit`] has nothing to do and real-time gets can read
//! through the alias as well as through the tables.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use split_catalog_core::filter::{rank, Filter};
use split_catalog_core::models::{Metacard, ProcessingError, ScoredMetacard};
use split_catalog_core::operations::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, QueryRequest, SourceResponse,
    Update, UpdateRequest, UpdateResponse,
};
use split_catalog_core::store::{CatalogStore, StoreFactory};

pub fn table_name(collection: &str) -> String {
    format!("mc_{}", collection)
}

pub fn view_name(alias: &str) -> String {
    format!("alias_{}", alias)
}

/// Create the registry table. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_collection_table(tx: &mut Transaction<'_, Sqlite>, collection: &str) -> Result<()> {
    let table = table_name(collection);
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id TEXT PRIMARY KEY,
            metacard_type TEXT NOT NULL,
            title TEXT,
            created_at INTEGER,
            modified_at INTEGER,
            metacard_json TEXT NOT NULL
        )
        "#
    ))
    .execute(&mut **tx)
    .await?;

    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS "idx_{table}_type" ON "{table}"(metacard_type)"#
    ))
    .execute(&mut **tx)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
        .bind(collection)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Drop and recreate the alias view over every registered collection.
pub async fn rebuild_alias_view(tx: &mut Transaction<'_, Sqlite>, alias: &str) -> Result<()> {
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
        .fetch_all(&mut **tx)
        .await?;

    let body = if names.is_empty() {
        "SELECT NULL AS collection, NULL AS id, NULL AS metacard_type, NULL AS metacard_json WHERE 0"
            .to_string()
    } else {
        names
            .iter()
            .map(|n| {
                format!(
                    r#"SELECT '{n}' AS collection, id, metacard_type, metacard_json FROM "{}""#,
                    table_name(n)
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ALL ")
    };

    let view = view_name(alias);
    sqlx::query(&format!(r#"DROP VIEW IF EXISTS "{view}""#))
        .execute(&mut **tx)
        .await?;
    sqlx::query(&format!(r#"CREATE VIEW "{view}" AS {body}"#))
        .execute(&mut **tx)
        .await?;

    tracing::debug!(alias, collections = names.len(), "rebuilt alias view");
    Ok(())
}

fn decode(row: &SqliteRow) -> Result<Metacard> {
    let json: String = row.try_get("metacard_json")?;
    serde_json::from_str(&json).context("corrupt metacard_json")
}

/// Bound parameters per id lookup, well under SQLite's variable limit.
const IDS_PER_STATEMENT: usize = 500;

/// Load rows from `relation`, narrowing by id in SQL when the filter is an
/// id lookup, then evaluate the filter in process. Duplicate ids are looked
/// up once.
async fn load_matching(
    pool: &SqlitePool,
    relation: &str,
    filter: &Filter,
) -> Result<Vec<ScoredMetacard>> {
    let rows = match filter {
        Filter::Ids(ids) => {
            let ids: Vec<&String> = ids.iter().collect::<BTreeSet<_>>().into_iter().collect();
            let mut rows = Vec::new();
            for chunk in ids.chunks(IDS_PER_STATEMENT) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    r#"SELECT metacard_json FROM "{relation}" WHERE id IN ({placeholders})"#
                );
                let mut q = sqlx::query(&sql);
                for id in chunk {
                    q = q.bind(*id);
                }
                rows.extend(q.fetch_all(pool).await?);
            }
            rows
        }
        _ => {
            sqlx::query(&format!(r#"SELECT metacard_json FROM "{relation}""#))
                .fetch_all(pool)
                .await?
        }
    };

    let mut hits = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(hit) = filter.evaluate(&decode(row)?) {
            hits.push(hit);
        }
    }
    Ok(hits)
}

async fn distinct_types(pool: &SqlitePool, relation: &str) -> Result<BTreeSet<String>> {
    let types: Vec<String> = sqlx::query_scalar(&format!(
        r#"SELECT DISTINCT metacard_type FROM "{relation}" WHERE metacard_type IS NOT NULL"#
    ))
    .fetch_all(pool)
    .await?;
    Ok(types.into_iter().collect())
}

async fn page(pool: &SqlitePool, relation: &str, request: &QueryRequest) -> Result<SourceResponse> {
    let hits = load_matching(pool, relation, &request.filter).await?;
    let (results, hits) = rank(hits, request.start, request.page_size);
    Ok(SourceResponse {
        results,
        hits,
        properties: request.properties.clone(),
        processing_errors: BTreeSet::new(),
    })
}

/// One collection table.
pub struct SqliteStore {
    name: String,
    table: String,
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: table_name(&name),
            name,
            pool,
        }
    }

    async fn write(&self, tx: &mut Transaction<'_, Sqlite>, mc: &Metacard) -> Result<()> {
        let json = serde_json::to_string(mc)?;
        sqlx::query(&format!(
            r#"
            INSERT INTO "{}" (id, metacard_type, title, created_at, modified_at, metacard_json)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                metacard_type = excluded.metacard_type,
                title = excluded.title,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at,
                metacard_json = excluded.metacard_json
            "#,
            self.table
        ))
        .bind(&mc.id)
        .bind(&mc.metacard_type)
        .bind(&mc.title)
        .bind(mc.created.map(|t| t.timestamp()))
        .bind(mc.modified.map(|t| t.timestamp()))
        .bind(&json)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, request: &CreateRequest) -> Result<CreateResponse> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(request.metacards.len());
        for mc in &request.metacards {
            let mut mc = mc.clone();
            if mc.id.is_empty() {
                mc.id = Uuid::new_v4().simple().to_string();
            }
            self.write(&mut tx, &mc).await?;
            created.push(mc);
        }
        tx.commit().await?;

        Ok(CreateResponse {
            created,
            properties: request.properties.clone(),
            processing_errors: BTreeSet::new(),
        })
    }

    async fn update(&self, request: &UpdateRequest) -> Result<UpdateResponse> {
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::new();
        let mut processing_errors = BTreeSet::new();

        for (id, mc) in &request.updates {
            let existing = sqlx::query(&format!(
                r#"SELECT metacard_json FROM "{}" WHERE id = ?"#,
                self.table
            ))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            match existing {
                Some(row) => {
                    let old = decode(&row)?;
                    let mut new = mc.clone();
                    new.id = id.clone();
                    self.write(&mut tx, &new).await?;
                    updated.push(Update { old, new });
                }
                None => {
                    processing_errors.insert(ProcessingError::new(
                        Some(self.name.as_str()),
                        format!("metacard not found: {}", id),
                    ));
                }
            }
        }
        tx.commit().await?;

        Ok(UpdateResponse {
            updated,
            properties: request.properties.clone(),
            processing_errors,
        })
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = Vec::new();
        for id in &request.ids {
            let rows = sqlx::query(&format!(
                r#"DELETE FROM "{}" WHERE id = ? RETURNING metacard_json"#,
                self.table
            ))
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
            for row in &rows {
                deleted.push(decode(row)?);
            }
        }
        tx.commit().await?;

        Ok(DeleteResponse {
            deleted,
            properties: request.properties.clone(),
            ..Default::default()
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<SourceResponse> {
        page(&self.pool, &self.table, request).await
    }

    async fn content_types(&self) -> Result<BTreeSet<String>> {
        distinct_types(&self.pool, &self.table).await
    }

    async fn is_available(&self) -> bool {
        sqlx::query(&format!(r#"SELECT 1 FROM "{}" LIMIT 1"#, self.table))
            .fetch_optional(&self.pool)
            .await
            .is_ok()
    }
}

/// Read-only store over the alias view.
pub struct SqliteAliasStore {
    name: String,
    view: String,
    pool: SqlitePool,
}

#[async_trait]
impl CatalogStore for SqliteAliasStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, _request: &CreateRequest) -> Result<CreateResponse> {
        bail!("alias '{}' is read-only", self.name)
    }

    async fn update(&self, _request: &UpdateRequest) -> Result<UpdateResponse> {
        bail!("alias '{}' is read-only", self.name)
    }

    async fn delete(&self, _request: &DeleteRequest) -> Result<DeleteResponse> {
        bail!("alias '{}' is read-only", self.name)
    }

    async fn query(&self, request: &QueryRequest) -> Result<SourceResponse> {
        page(&self.pool, &self.view, request).await
    }

    async fn content_types(&self) -> Result<BTreeSet<String>> {
        distinct_types(&self.pool, &self.view).await
    }

    async fn is_available(&self) -> bool {
        sqlx::query(&format!(r#"SELECT 1 FROM "{}" LIMIT 1"#, self.view))
            .fetch_optional(&self.pool)
            .await
            .is_ok()
    }
}

/// Provisions collection tables and keeps the alias view current.
pub struct SqliteStoreFactory {
    pool: SqlitePool,
    alias: String,
}

impl SqliteStoreFactory {
    pub fn new(pool: SqlitePool, alias: impl Into<String>) -> Self {
        Self {
            pool,
            alias: alias.into(),
        }
    }
}

#[async_trait]
impl StoreFactory for SqliteStoreFactory {
    async fn provision(&self, collection: &str) -> Result<Arc<dyn CatalogStore>> {
        let mut tx = self.pool.begin().await?;
        create_collection_table(&mut tx, collection).await?;
        rebuild_alias_view(&mut tx, &self.alias).await?;
        tx.commit().await?;

        tracing::debug!(collection, "provisioned sqlite collection");
        Ok(Arc::new(SqliteStore::new(self.pool.clone(), collection)))
    }

    async fn alias(&self, alias: &str) -> Result<Arc<dyn CatalogStore>> {
        let mut tx = self.pool.begin().await?;
        rebuild_alias_view(&mut tx, alias).await?;
        tx.commit().await?;

        Ok(Arc::new(SqliteAliasStore {
            name: alias.to_string(),
            view: view_name(alias),
            pool: self.pool.clone(),
        }))
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}
