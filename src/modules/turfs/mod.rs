pub mod directory;
pub mod models;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde_json::json;
use turfbook_db::Database;
use turfbook_http::AppError;
use turfbook_kernel::{InitCtx, Migration, Module, SchemaChange};

use directory::TurfDirectory;
use models::{LocationQuery, SearchQuery, Turf, TurfList};

/// Turf listing and search
pub struct TurfsModule {
    directory: TurfDirectory,
}

impl TurfsModule {
    pub fn new(db: Database) -> Self {
        Self {
            directory: TurfDirectory::new(db),
        }
    }
}

#[async_trait]
impl Module for TurfsModule {
    fn name(&self) -> &'static str {
        "turfs"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "turfs module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/turfs", get(turfs_by_location))
            .route("/getallturfs", get(all_turfs))
            .route("/searchTurfs", get(search_turfs))
            .with_state(self.directory.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let not_found = json!({
            "description": "No turfs matched",
            "content": {
                "application/json": {
                    "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                }
            }
        });
        let listing = json!({
            "description": "Matching turfs",
            "content": {
                "application/json": {
                    "schema": {"$ref": "#/components/schemas/TurfList"}
                }
            }
        });

        Some(json!({
            "paths": {
                "/turfs": {
                    "get": {
                        "summary": "List turfs by location",
                        "tags": ["Turfs"],
                        "parameters": [{
                            "name": "location",
                            "in": "query",
                            "required": true,
                            "schema": {"type": "string"}
                        }],
                        "responses": {
                            "200": listing.clone(),
                            "400": {
                                "description": "Location missing",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            },
                            "404": not_found.clone()
                        }
                    }
                },
                "/getallturfs": {
                    "get": {
                        "summary": "List every turf",
                        "tags": ["Turfs"],
                        "responses": {
                            "200": listing.clone(),
                            "404": not_found.clone()
                        }
                    }
                },
                "/searchTurfs": {
                    "get": {
                        "summary": "Search turfs by name or location",
                        "tags": ["Turfs"],
                        "parameters": [
                            {"name": "name", "in": "query", "required": false, "schema": {"type": "string"}},
                            {"name": "location", "in": "query", "required": false, "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": listing.clone(),
                            "404": not_found.clone()
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Turf": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "name": {"type": "string"},
                            "location": {"type": "string"},
                            "time": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "Bookable slot labels"
                            }
                        },
                        "required": ["id", "name", "location", "time"]
                    },
                    "TurfList": {
                        "type": "object",
                        "properties": {
                            "message": {"type": "string"},
                            "turfs": {
                                "type": "array",
                                "items": {"$ref": "#/components/schemas/Turf"}
                            }
                        },
                        "required": ["turfs"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: vec![
                SchemaChange::Collection {
                    name: models::COLLECTION,
                },
                SchemaChange::RequiredFields {
                    collection: models::COLLECTION,
                    fields: &["name", "location", "time"],
                },
            ],
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let turfs = self.directory.count().await?;
        tracing::info!(
            module = self.name(),
            turfs = turfs,
            "turfs module started"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "turfs module stopped");
        Ok(())
    }
}

fn non_empty(turfs: Vec<Turf>, message: &str) -> Result<Vec<Turf>, AppError> {
    if turfs.is_empty() {
        Err(AppError::not_found(message))
    } else {
        Ok(turfs)
    }
}

/// `GET /turfs?location=`
async fn turfs_by_location(
    State(directory): State<TurfDirectory>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<TurfList>, AppError> {
    let location = query
        .location
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Location required"))?;

    let turfs = directory
        .by_location(location.trim())
        .await
        .context("failed to fetch turfs by location")?;

    Ok(Json(TurfList {
        message: None,
        turfs: non_empty(turfs, "No turfs found in this location")?,
    }))
}

/// `GET /getallturfs`
async fn all_turfs(State(directory): State<TurfDirectory>) -> Result<Json<TurfList>, AppError> {
    let turfs = directory.all().await.context("failed to fetch turfs")?;

    Ok(Json(TurfList {
        message: Some("Turfs fetched successfully"),
        turfs: non_empty(turfs, "No turfs found")?,
    }))
}

/// `GET /searchTurfs?name=&location=`
async fn search_turfs(
    State(directory): State<TurfDirectory>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<TurfList>, AppError> {
    if query.name.is_none() && query.location.is_none() {
        return Err(AppError::bad_request(
            "Provide a name or a location to search for",
        ));
    }

    let turfs = directory
        .search(query.name.as_deref(), query.location.as_deref())
        .await
        .context("failed to search turfs")?;

    Ok(Json(TurfList {
        message: None,
        turfs: non_empty(turfs, "No turfs found")?,
    }))
}

/// Create a new instance of the turfs module
pub fn create_module(db: Database) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(TurfsModule::new(db))
}
