use async_trait::async_trait;
use axum::Router;

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// A single schema change applied to the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// Declare a collection so it exists even before the first insert.
    Collection { name: &'static str },
    /// Fields that must be present, non-null and, for strings, non-empty.
    RequiredFields {
        collection: &'static str,
        fields: &'static [&'static str],
    },
    /// At most one document may carry a given combination of `fields`.
    UniqueIndex {
        name: &'static str,
        collection: &'static str,
        fields: &'static [&'static str],
    },
}

/// A named set of schema changes owned by one module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: Vec<SchemaChange>,
}

/// Core module trait that all turfbook modules must implement
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Called during startup, before migrations run
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes
    /// Routes of every module are merged under `server.api_prefix`
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` and `components.schemas`) for this module
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema migrations, applied once each, ordered by id within the module
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Called after migrations are applied
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called during shutdown, after the server has drained
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
