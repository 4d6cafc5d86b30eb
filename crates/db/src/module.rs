use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use turfbook_kernel::{InitCtx, Module};

use crate::{filter::Filter, store::Database};

/// Core module owning the document store lifecycle.
///
/// Seed data is loaded on `start`, after every module migration has been
/// applied, so seeded documents go through the same schema rules as writes
/// made by request handlers.
pub struct DbModule {
    db: Database,
}

impl DbModule {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            database = self.db.name(),
            seed = ?ctx.settings.database.seed_path,
            "document store initialized"
        );
        Ok(())
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if let Some(path) = &ctx.settings.database.seed_path {
            let loaded = load_seed(&self.db, path).await?;
            tracing::info!(module = self.name(), documents = loaded, "seed data loaded");
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        for collection in self.db.collections().await? {
            let documents = self.db.count(&collection, &Filter::All).await?;
            tracing::info!(module = self.name(), %collection, documents, "collection size at shutdown");
        }
        self.db.close().await;
        tracing::info!(module = self.name(), database = self.db.name(), "database closed");
        Ok(())
    }
}

/// Load a seed file mapping collection names to arrays of documents.
///
/// Collections that already hold documents are left untouched.
pub async fn load_seed(db: &Database, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed: Map<String, Value> = serde_json::from_str(&raw)
        .with_context(|| format!("seed file {} must be a JSON object", path.display()))?;

    let mut loaded = 0;
    for (collection, documents) in seed {
        let Value::Array(documents) = documents else {
            anyhow::bail!("seed entry '{}' must be an array of documents", collection);
        };

        if db.count(&collection, &Filter::All).await? > 0 {
            tracing::debug!(%collection, "collection already populated, skipping seed");
            continue;
        }

        for document in &documents {
            let _: Value = db
                .insert(&collection, document)
                .await
                .with_context(|| format!("failed to seed collection '{}'", collection))?;
            loaded += 1;
        }
    }

    Ok(loaded)
}

/// Create the core database module
pub fn create_module(db: Database) -> Arc<dyn Module> {
    Arc::new(DbModule::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use turfbook_kernel::settings::Settings;

    fn seed_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "turfbook-seed-{}-{}.json",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn start_loads_seed_into_empty_collections() {
        let path = seed_file(
            "start",
            r#"{"turf": [
                {"id": "arena", "name": "Arena", "location": "Pune", "time": ["9AM"]},
                {"name": "Dome", "location": "Mumbai", "time": ["6PM"]}
            ]}"#,
        );
        let db = Database::in_memory("seeded").await.unwrap();
        let mut settings = Settings::default();
        settings.database.seed_path = Some(path.clone());
        let ctx = InitCtx {
            settings: &settings,
        };

        let module = DbModule::new(db.clone());
        module.init(&ctx).await.unwrap();
        module.start(&ctx).await.unwrap();

        assert_eq!(db.count("turf", &Filter::All).await.unwrap(), 2);
        let arena: Option<Value> = db.find_by_id("turf", "arena").await.unwrap();
        assert_eq!(arena.unwrap()["name"], "Arena");

        // A second load does not duplicate anything.
        assert_eq!(load_seed(&db, &path).await.unwrap(), 0);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn seed_entries_must_be_arrays() {
        let path = seed_file("shape", r#"{"turf": {"name": "Arena"}}"#);
        let db = Database::in_memory("seeded").await.unwrap();
        let err = load_seed(&db, &path).await.unwrap_err();
        assert!(err.to_string().contains("must be an array"));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn missing_seed_file_is_an_error() {
        let db = Database::in_memory("seeded").await.unwrap();
        let err = load_seed(&db, Path::new("/nonexistent/turfbook-seed.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read seed file"));
    }
}
