pub mod allocator;
pub mod models;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use turfbook_db::Database;
use turfbook_http::{AppError, AppJson};
use turfbook_kernel::{InitCtx, Migration, Module, SchemaChange};

use allocator::{Allocator, BookingError};
use models::{Availability, AvailabilityQuery, BookingCreated, CreateBooking};

/// Slot booking
pub struct BookingsModule {
    allocator: Allocator,
}

impl BookingsModule {
    pub fn new(db: Database) -> Self {
        Self {
            allocator: Allocator::new(db),
        }
    }
}

#[async_trait]
impl Module for BookingsModule {
    fn name(&self) -> &'static str {
        "bookings"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "bookings module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/booking", post(create_booking))
            .route("/availability", get(availability))
            .with_state(self.allocator.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "application/json": {
                "schema": {"$ref": "#/components/schemas/ErrorResponse"}
            }
        });

        Some(json!({
            "paths": {
                "/booking": {
                    "post": {
                        "summary": "Book a turf slot",
                        "tags": ["Bookings"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/CreateBooking"}
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Booking created",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/BookingCreated"}
                                    }
                                }
                            },
                            "400": {
                                "description": "Invalid request, slot not offered, or slot already booked (details carry available_slots)",
                                "content": error.clone()
                            },
                            "404": {
                                "description": "Turf not found",
                                "content": error.clone()
                            }
                        }
                    }
                },
                "/availability": {
                    "get": {
                        "summary": "Free slots of a turf on a day",
                        "tags": ["Bookings"],
                        "parameters": [
                            {"name": "turfId", "in": "query", "required": true, "schema": {"type": "string"}},
                            {"name": "date", "in": "query", "required": true, "schema": {"type": "string", "format": "date"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "Available slots in catalog order",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Availability"}
                                    }
                                }
                            },
                            "400": {
                                "description": "Missing or malformed parameters",
                                "content": error.clone()
                            },
                            "404": {
                                "description": "Turf not found",
                                "content": error
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "CreateBooking": {
                        "type": "object",
                        "properties": {
                            "turfId": {"type": "string"},
                            "userPhone": {"type": "string"},
                            "userEmail": {"type": "string", "format": "email"},
                            "slot": {"type": "string", "description": "One of the turf's slot labels"},
                            "date": {"type": "string", "format": "date"}
                        },
                        "required": ["turfId", "userPhone", "userEmail", "slot", "date"]
                    },
                    "Booking": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "turfId": {"type": "string"},
                            "userPhone": {"type": "string"},
                            "userEmail": {"type": "string"},
                            "slot": {"type": "string"},
                            "date": {"type": "string", "format": "date"},
                            "createdAt": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "turfId", "userPhone", "userEmail", "slot", "date", "createdAt"]
                    },
                    "BookingCreated": {
                        "type": "object",
                        "properties": {
                            "message": {"type": "string"},
                            "booking": {"$ref": "#/components/schemas/Booking"}
                        },
                        "required": ["message", "booking"]
                    },
                    "Availability": {
                        "type": "object",
                        "properties": {
                            "turfId": {"type": "string"},
                            "date": {"type": "string", "format": "date"},
                            "availableSlots": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["turfId", "date", "availableSlots"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![
            Migration {
                id: "001_init",
                up: vec![
                    SchemaChange::Collection {
                        name: models::COLLECTION,
                    },
                    SchemaChange::RequiredFields {
                        collection: models::COLLECTION,
                        fields: &["turfId", "userPhone", "userEmail", "slot", "date"],
                    },
                ],
            },
            Migration {
                id: "002_unique_slot",
                up: vec![SchemaChange::UniqueIndex {
                    name: models::SLOT_INDEX,
                    collection: models::COLLECTION,
                    fields: &["turfId", "date", "slot"],
                }],
            },
        ]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookings module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "bookings module stopped");
        Ok(())
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        let details = |slots: &[String]| vec![json!({ "available_slots": slots })];

        match error {
            BookingError::TurfNotFound(_) => AppError::not_found("Turf not found"),
            BookingError::InvalidSlot { .. } => {
                AppError::bad_request("Selected slot is not available.").with_code("invalid_slot")
            }
            BookingError::AlreadyBookedBySameUser { available_slots } => AppError::conflict(
                "already_booked",
                details(&available_slots),
                "You have already booked this turf for the selected date and time.",
            ),
            BookingError::SlotTaken { available_slots } => AppError::conflict(
                "slot_taken",
                details(&available_slots),
                "Selected slot is already booked.",
            ),
            BookingError::NoSlotsRemaining => AppError::conflict(
                "no_slots_remaining",
                details(&[]),
                "No available turfs for this day.",
            ),
            BookingError::Storage(e) => AppError::Internal(e.into()),
        }
    }
}

/// `POST /booking`
async fn create_booking(
    State(allocator): State<Allocator>,
    AppJson(body): AppJson<CreateBooking>,
) -> Result<(StatusCode, Json<BookingCreated>), AppError> {
    let request = body
        .validate()
        .map_err(|details| AppError::validation(details, "Booking request is not valid"))?;

    let booking = allocator.attempt(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreated {
            message: "Booking successful. We will contact you soon.",
            booking,
        }),
    ))
}

/// `GET /availability?turfId=&date=`
async fn availability(
    State(allocator): State<Allocator>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let turf_id = query.turf_id.unwrap_or_default().trim().to_string();
    let date = query.date.unwrap_or_default().trim().to_string();

    let mut details = Vec::new();
    if turf_id.is_empty() {
        details.push(json!({"field": "turfId", "error": "required"}));
    }
    if models::parse_day(&date).is_none() {
        details.push(json!({"field": "date", "error": "expected YYYY-MM-DD"}));
    }
    if !details.is_empty() {
        return Err(AppError::validation(details, "Availability query is not valid"));
    }

    let available_slots = allocator.availability(&turf_id, &date).await?;

    Ok(Json(Availability {
        turf_id,
        date,
        available_slots,
    }))
}

/// Create a new instance of the bookings module
pub fn create_module(db: Database) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BookingsModule::new(db))
}
