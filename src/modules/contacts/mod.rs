pub mod models;

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Map, Value};
use turfbook_db::{Database, DbError};
use turfbook_http::{AppError, AppJson};
use turfbook_kernel::{InitCtx, Migration, Module, SchemaChange};

use models::ContactCreated;

/// Contact form submissions
pub struct ContactsModule {
    db: Database,
}

impl ContactsModule {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module for ContactsModule {
    fn name(&self) -> &'static str {
        "contacts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "contacts module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/contact", post(add_contact))
            .with_state(self.db.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/contact": {
                    "post": {
                        "summary": "Send a contact message",
                        "tags": ["Contact"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Contact"}
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Message stored",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "message": {"type": "string"},
                                                "contact": {"$ref": "#/components/schemas/Contact"}
                                            }
                                        }
                                    }
                                }
                            },
                            "400": {
                                "description": "Message rejected by the contact schema",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Contact": {
                        "type": "object",
                        "description": "Free-form message; extra fields are stored as sent",
                        "properties": {
                            "name": {"type": "string"},
                            "email": {"type": "string", "format": "email"},
                            "message": {"type": "string"}
                        },
                        "required": ["name", "email", "message"],
                        "additionalProperties": true
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
                    fields: models::REQUIRED_FIELDS,
                },
            ],
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "contacts module stopped");
        Ok(())
    }
}

/// `POST /contact`
async fn add_contact(
    State(db): State<Database>,
    AppJson(mut payload): AppJson<Map<String, Value>>,
) -> Result<Json<ContactCreated>, AppError> {
    // Identity belongs to the store.
    payload.remove("id");

    let contact: Value = db
        .insert(models::COLLECTION, &payload)
        .await
        .map_err(|e| match e {
            DbError::MissingField { field, .. } => AppError::validation(
                vec![json!({"field": field, "error": "required"})],
                "Failed to send message",
            ),
            e @ DbError::DuplicateKey { .. } => {
                AppError::validation(vec![json!({"error": e.to_string()})], "Failed to send message")
            }
            e if e.is_schema_violation() => {
                AppError::validation(vec![json!({"error": e.to_string()})], "Failed to send message")
            }
            e => AppError::Internal(e.into()),
        })?;

    tracing::info!(contact_id = %contact["id"], "contact message stored");

    Ok(Json(ContactCreated {
        message: "Message sent successfully!",
        contact,
    }))
}

/// Create a new instance of the contacts module
pub fn create_module(db: Database) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(ContactsModule::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    async fn module() -> ContactsModule {
        let db = Database::in_memory("contacts-test").await.unwrap();
        let module = ContactsModule::new(db.clone());
        for migration in module.migrations() {
            db.apply_migration(module.name(), &migration).await.unwrap();
        }
        module
    }

    async fn post(module: &ContactsModule, body: Value) -> (StatusCode, Value) {
        let response = module
            .routes()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/contact")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn stores_payload_verbatim_with_an_id() {
        let module = module().await;
        let (status, body) = post(
            &module,
            json!({
                "name": "Asha",
                "email": "asha@example.com",
                "message": "Do you host corporate leagues?",
                "phone": "9876543210",
                "preferredTurf": "Arena"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Message sent successfully!");
        assert_eq!(body["contact"]["preferredTurf"], "Arena");
        assert!(body["contact"]["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(module.db.count(models::COLLECTION, &turfbook_db::Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected() {
        let module = module().await;
        let (status, body) = post(&module, json!({"name": "Asha", "email": "asha@example.com"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0]["field"], "message");
        assert_eq!(module.db.count(models::COLLECTION, &turfbook_db::Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn non_object_body_is_rejected() {
        let module = module().await;
        let (status, _) = post(&module, json!(["hello"])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn client_supplied_id_is_replaced() {
        let module = module().await;
        let payload = json!({
            "id": "mine",
            "name": "Asha",
            "email": "asha@example.com",
            "message": "Hello"
        });

        let (first_status, first) = post(&module, payload.clone()).await;
        let (second_status, second) = post(&module, payload).await;

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_ne!(first["contact"]["id"], "mine");
        assert_ne!(second["contact"]["id"], "mine");
        assert_ne!(first["contact"]["id"], second["contact"]["id"]);
        assert_eq!(module.db.count(models::COLLECTION, &turfbook_db::Filter::All).await.unwrap(), 2);
    }
}
