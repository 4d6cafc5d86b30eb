//! Turfbook application library
//!
//! Wires the feature modules (turfs, bookings, contacts) and the document store
//! into the module registry and drives the application lifecycle.

pub mod modules;

use anyhow::Context;
use turfbook_db::Database;
use turfbook_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use modules::register_all;

/// Registry holding the core database module and every feature module.
pub fn build_registry(db: &Database) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register_core(turfbook_db::create_module(db.clone()));
    modules::register_all(&mut registry, db);
    registry
}

/// Apply every migration contributed by the registered modules.
pub async fn apply_migrations(registry: &ModuleRegistry, db: &Database) -> anyhow::Result<usize> {
    let mut applied = 0;
    for (module, migration) in registry.collect_migrations() {
        if db
            .apply_migration(&module, &migration)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?
        {
            applied += 1;
        }
    }
    Ok(applied)
}

/// Run the application until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let db = Database::connect(&settings.database)
        .await
        .context("failed to open the database")?;
    let registry = build_registry(&db);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_core_modules(&ctx).await?;
    registry.init_custom_modules(&ctx).await?;

    let applied = apply_migrations(&registry, &db).await?;
    tracing::info!(applied, "migrations complete");

    registry.start_core_modules(&ctx).await?;
    registry.start_custom_modules(&ctx).await?;

    let served = turfbook_http::start_server(&registry, &settings).await;

    registry.stop_custom_modules().await?;
    registry.stop_core_modules().await?;

    served
}
