use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use turfbook_kernel::{settings::DatabaseSettings, Migration, SchemaChange};
use uuid::Uuid;

use crate::{error::DbError, filter::Filter};

const ID_FIELD: &str = "id";

/// Tables every database carries before any module migration runs.
const BOOTSTRAP: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        UNIQUE (collection, id)
    )",
    "CREATE TABLE IF NOT EXISTS collections (name TEXT PRIMARY KEY)",
    "CREATE TABLE IF NOT EXISTS required_fields (
        collection TEXT NOT NULL,
        field TEXT NOT NULL,
        PRIMARY KEY (collection, field)
    )",
    "CREATE TABLE IF NOT EXISTS applied_migrations (
        module TEXT NOT NULL,
        id TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )",
];

/// Cheaply cloneable handle to a SQLite-backed document database.
///
/// Documents are JSON objects stored per collection in insertion order.
/// Unique indexes declared by migrations are SQLite expression indexes, so
/// an insert that would break one is refused by the engine itself.
#[derive(Clone)]
pub struct Database {
    name: Arc<str>,
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `settings.url`.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(&settings.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        tracing::info!(database = %settings.name, url = %settings.url, "database connected");
        Self::bootstrap(&settings.name, pool).await
    }

    /// A private database living as long as the handle.
    ///
    /// Each `:memory:` connection is a separate database, so the pool holds
    /// exactly one connection and never recycles it.
    pub async fn in_memory(name: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::bootstrap(name, pool).await
    }

    async fn bootstrap(name: &str, pool: SqlitePool) -> Result<Self, DbError> {
        for statement in BOOTSTRAP {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self {
            name: Arc::from(name),
            pool,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Apply a module migration once. Returns `false` when it was already applied.
    pub async fn apply_migration(
        &self,
        module: &str,
        migration: &Migration,
    ) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        let applied: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM applied_migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(&mut *tx)
                .await?;
        if applied.is_some() {
            return Ok(false);
        }

        for change in &migration.up {
            match change {
                SchemaChange::Collection { name } => {
                    check_name(name)?;
                    sqlx::query("INSERT OR IGNORE INTO collections (name) VALUES (?)")
                        .bind(*name)
                        .execute(&mut *tx)
                        .await?;
                }
                SchemaChange::RequiredFields { collection, fields } => {
                    check_name(collection)?;
                    sqlx::query("INSERT OR IGNORE INTO collections (name) VALUES (?)")
                        .bind(*collection)
                        .execute(&mut *tx)
                        .await?;
                    for field in fields.iter() {
                        check_name(field)?;
                        sqlx::query(
                            "INSERT OR IGNORE INTO required_fields (collection, field) VALUES (?, ?)",
                        )
                        .bind(*collection)
                        .bind(*field)
                        .execute(&mut *tx)
                        .await?;
                    }
                }
                SchemaChange::UniqueIndex {
                    name,
                    collection,
                    fields,
                } => {
                    check_name(name)?;
                    check_name(collection)?;
                    let mut columns = Vec::with_capacity(fields.len());
                    for field in fields.iter() {
                        check_name(field)?;
                        columns.push(format!("json_extract(body, '$.\"{}\"')", field));
                    }
                    let ddl = format!(
                        "CREATE UNIQUE INDEX IF NOT EXISTS \"{}\" ON documents ({}) WHERE collection = '{}'",
                        name,
                        columns.join(", "),
                        collection
                    );
                    sqlx::query(&ddl)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| DbError::from_write(collection, e))?;
                }
            }
        }

        sqlx::query("INSERT INTO applied_migrations (module, id) VALUES (?, ?)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            database = %self.name,
            module,
            migration = migration.id,
            "migration applied"
        );
        Ok(true)
    }

    /// Insert a document, assigning an `id` when it carries none.
    ///
    /// Required fields are checked first; uniqueness of the id and of every
    /// index is left to the single `INSERT`, which SQLite applies atomically.
    pub async fn insert<N, T>(&self, collection: &str, doc: &N) -> Result<T, DbError>
    where
        N: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        check_name(collection)?;
        let mut object = match to_value(collection, doc)? {
            Value::Object(object) => object,
            _ => {
                return Err(DbError::NotAnObject {
                    collection: collection.to_string(),
                })
            }
        };

        let id = match object.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => {
                let id = Uuid::now_v7().to_string();
                object.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let required: Vec<String> = sqlx::query_scalar(
            "SELECT field FROM required_fields WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        for field in required {
            if !is_present(object.get(&field)) {
                return Err(DbError::MissingField {
                    collection: collection.to_string(),
                    field,
                });
            }
        }

        let value = Value::Object(object);
        let body = value.to_string();
        let stored = from_value(collection, value)?;

        sqlx::query("INSERT OR IGNORE INTO collections (name) VALUES (?)")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from_write(collection, e))?;

        Ok(stored)
    }

    /// All documents matching `filter`, in insertion order.
    pub async fn find<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<T>, DbError> {
        let mut qb = filtered("SELECT body FROM documents", collection, filter);
        qb.push(" ORDER BY seq");

        let bodies = qb.build_query_scalar::<String>().fetch_all(&self.pool).await?;
        bodies
            .iter()
            .map(|body| parse(collection, body))
            .collect()
    }

    /// First document matching `filter`.
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<T>, DbError> {
        let mut qb = filtered("SELECT body FROM documents", collection, filter);
        qb.push(" ORDER BY seq LIMIT 1");

        let body = qb.build_query_scalar::<String>().fetch_optional(&self.pool).await?;
        body.map(|body| parse(collection, &body)).transpose()
    }

    pub async fn find_by_id<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, DbError> {
        self.find_one(collection, &Filter::eq(ID_FIELD, id)).await
    }

    pub async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, DbError> {
        let mut qb = filtered("SELECT COUNT(*) FROM documents", collection, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Names of all known collections, sorted.
    pub async fn collections(&self) -> Result<Vec<String>, DbError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

fn filtered(head: &str, collection: &str, filter: &Filter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE collection = ")
        .push_bind(collection.to_string())
        .push(" AND ");
    filter.push_sql(&mut qb);
    qb
}

/// Names end up inside DDL, so only plain identifiers are accepted.
fn check_name(name: &str) -> Result<(), DbError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DbError::InvalidName(name.to_string()))
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn to_value<N: Serialize + ?Sized>(collection: &str, doc: &N) -> Result<Value, DbError> {
    serde_json::to_value(doc).map_err(|source| DbError::Serialization {
        collection: collection.to_string(),
        source,
    })
}

fn from_value<T: DeserializeOwned>(collection: &str, value: Value) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|source| DbError::Serialization {
        collection: collection.to_string(),
        source,
    })
}

fn parse<T: DeserializeOwned>(collection: &str, body: &str) -> Result<T, DbError> {
    serde_json::from_str(body).map_err(|source| DbError::Serialization {
        collection: collection.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::path::PathBuf;

    #[derive(Debug, Deserialize)]
    struct Slot {
        id: String,
        court: String,
        hour: String,
    }

    fn schema() -> Migration {
        Migration {
            id: "001_init",
            up: vec![
                SchemaChange::Collection { name: "slot" },
                SchemaChange::RequiredFields {
                    collection: "slot",
                    fields: &["court", "hour"],
                },
                SchemaChange::UniqueIndex {
                    name: "slot_court_hour_unique",
                    collection: "slot",
                    fields: &["court", "hour"],
                },
            ],
        }
    }

    async fn database() -> Database {
        let db = Database::in_memory("test").await.unwrap();
        db.apply_migration("slots", &schema()).await.unwrap();
        db
    }

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "turfbook-store-{}-{}.db",
            name,
            std::process::id()
        ));
        remove_database_files(&path);
        path
    }

    fn remove_database_files(path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            std::fs::remove_file(format!("{}{}", path.display(), suffix)).ok();
        }
    }

    fn file_settings(path: &std::path::Path) -> DatabaseSettings {
        DatabaseSettings {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseSettings::default()
        }
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let db = database().await;
        let a: Slot = db
            .insert("slot", &json!({"court": "A", "hour": "9AM"}))
            .await
            .unwrap();
        let b: Slot = db
            .insert("slot", &json!({"court": "A", "hour": "10AM"}))
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
        assert_eq!(b.court, "A");
        assert_eq!(b.hour, "10AM");
        assert_eq!(db.count("slot", &Filter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_keeps_caller_supplied_id() {
        let db = database().await;
        let _: Value = db
            .insert("slot", &json!({"id": "fixed", "court": "A", "hour": "9AM"}))
            .await
            .unwrap();

        let found: Option<Slot> = db.find_by_id("slot", "fixed").await.unwrap();
        assert_eq!(found.unwrap().hour, "9AM");

        let err = db
            .insert::<_, Value>("slot", &json!({"id": "fixed", "court": "B", "hour": "9AM"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { ref index, .. } if index == "id"));
    }

    #[tokio::test]
    async fn unique_index_rejects_second_insert() {
        let db = database().await;
        let _: Value = db
            .insert("slot", &json!({"court": "A", "hour": "9AM"}))
            .await
            .unwrap();
        let err = db
            .insert::<_, Value>("slot", &json!({"court": "A", "hour": "9AM"}))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::DuplicateKey { ref index, .. } if index == "slot_court_hour_unique"
        ));
        assert_eq!(db.count("slot", &Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unique_index_is_scoped_to_its_collection() {
        let db = database().await;
        for collection in ["slot", "archive"] {
            let _: Value = db
                .insert(collection, &json!({"court": "A", "hour": "9AM"}))
                .await
                .unwrap();
        }
        assert_eq!(db.count("archive", &Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn required_fields_reject_blank_and_missing_values() {
        let db = database().await;
        let missing = db
            .insert::<_, Value>("slot", &json!({"court": "A"}))
            .await
            .unwrap_err();
        assert!(missing.is_schema_violation());

        let blank = db
            .insert::<_, Value>("slot", &json!({"court": "  ", "hour": "9AM"}))
            .await
            .unwrap_err();
        assert!(matches!(blank, DbError::MissingField { ref field, .. } if field == "court"));
        assert_eq!(db.count("slot", &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn non_object_documents_are_rejected() {
        let db = database().await;
        let err = db
            .insert::<_, Value>("slot", &json!(["9AM"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotAnObject { .. }));
    }

    #[tokio::test]
    async fn odd_collection_names_are_refused() {
        let db = database().await;
        let err = db
            .insert::<_, Value>("slot'; DROP TABLE documents; --", &json!({"court": "A"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidName(_)));
    }

    #[tokio::test]
    async fn find_preserves_insertion_order() {
        let db = database().await;
        for hour in ["9AM", "10AM", "11AM"] {
            let _: Value = db
                .insert("slot", &json!({"court": "A", "hour": hour}))
                .await
                .unwrap();
        }
        let _: Value = db
            .insert("slot", &json!({"court": "B", "hour": "9AM"}))
            .await
            .unwrap();

        let court_a: Vec<Slot> = db.find("slot", &Filter::eq("court", "A")).await.unwrap();
        let hours: Vec<&str> = court_a.iter().map(|s| s.hour.as_str()).collect();
        assert_eq!(hours, vec!["9AM", "10AM", "11AM"]);

        let unknown: Vec<Slot> = db.find("nothing", &Filter::All).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::in_memory("test").await.unwrap();
        assert!(db.apply_migration("slots", &schema()).await.unwrap());
        assert!(!db.apply_migration("slots", &schema()).await.unwrap());
        assert_eq!(db.collections().await.unwrap(), vec!["slot".to_string()]);
    }

    #[tokio::test]
    async fn index_over_existing_duplicates_fails() {
        let db = Database::in_memory("test").await.unwrap();
        for _ in 0..2 {
            let _: Value = db
                .insert("slot", &json!({"court": "A", "hour": "9AM"}))
                .await
                .unwrap();
        }
        let err = db.apply_migration("slots", &schema()).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));

        // The failed migration left nothing behind and can be retried later.
        assert_eq!(db.count("slot", &Filter::All).await.unwrap(), 2);
        let err = db.apply_migration("slots", &schema()).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn concurrent_inserts_on_one_key_admit_exactly_one() {
        let db = database().await;
        let mut tasks = Vec::new();
        for n in 0..32 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                db.insert::<_, Value>("slot", &json!({"court": "A", "hour": "9AM", "n": n}))
                    .await
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(db.count("slot", &Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reopened_file_keeps_documents_migrations_and_indexes() {
        let path = scratch_file("reopen");
        let settings = file_settings(&path);

        let db = Database::connect(&settings).await.unwrap();
        assert!(db.apply_migration("slots", &schema()).await.unwrap());
        let first: Slot = db
            .insert("slot", &json!({"court": "A", "hour": "9AM"}))
            .await
            .unwrap();
        db.close().await;

        let db = Database::connect(&settings).await.unwrap();
        assert!(!db.apply_migration("slots", &schema()).await.unwrap());

        let found: Option<Slot> = db.find_by_id("slot", &first.id).await.unwrap();
        assert_eq!(found.unwrap().court, "A");

        let err = db
            .insert::<_, Value>("slot", &json!({"court": "A", "hour": "9AM"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));

        let missing = db
            .insert::<_, Value>("slot", &json!({"court": "B"}))
            .await
            .unwrap_err();
        assert!(missing.is_schema_violation());

        db.close().await;
        remove_database_files(&path);
    }

    #[tokio::test]
    async fn file_database_admits_one_of_many_concurrent_writers() {
        let path = scratch_file("writers");
        let db = Database::connect(&file_settings(&path)).await.unwrap();
        db.apply_migration("slots", &schema()).await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..16 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                db.insert::<_, Value>("slot", &json!({"court": "C", "hour": "7PM", "n": n}))
                    .await
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(err) => assert!(matches!(err, DbError::DuplicateKey { .. }), "{err}"),
            }
        }
        assert_eq!(admitted, 1);

        db.close().await;
        remove_database_files(&path);
    }
}
