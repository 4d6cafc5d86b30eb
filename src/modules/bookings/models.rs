use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{macros::format_description, Date, OffsetDateTime};

/// Collection holding confirmed bookings.
pub const COLLECTION: &str = "booking";

/// Unique index guaranteeing one booking per turf, date and slot.
pub const SLOT_INDEX: &str = "booking_turf_date_slot_unique";

/// A confirmed booking as stored and returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub turf_id: String,
    pub user_phone: String,
    pub user_email: String,
    pub slot: String,
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Booking {
    /// Whether this booking belongs to the user identified in `request`.
    pub fn held_by(&self, request: &BookingRequest) -> bool {
        self.user_phone == request.user_phone && self.user_email == request.user_email
    }
}

/// Document written for a new booking; the store assigns the id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking<'a> {
    pub turf_id: &'a str,
    pub user_phone: &'a str,
    pub user_email: &'a str,
    pub slot: &'a str,
    pub date: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'a> NewBooking<'a> {
    pub fn from_request(request: &'a BookingRequest, created_at: OffsetDateTime) -> Self {
        Self {
            turf_id: &request.turf_id,
            user_phone: &request.user_phone,
            user_email: &request.user_email,
            slot: &request.slot,
            date: &request.date,
            created_at,
        }
    }
}

/// Body of `POST /booking` as sent by clients.
///
/// Every field defaults to empty so that validation can report all missing
/// fields at once instead of stopping at the first one. Validation trims
/// surrounding whitespace from every field, so `" 9AM"` books `"9AM"` and
/// the stored phone and email are the trimmed values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    #[serde(default)]
    pub turf_id: String,
    #[serde(default)]
    pub user_phone: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub date: String,
}

/// A booking attempt that passed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub turf_id: String,
    pub user_phone: String,
    pub user_email: String,
    pub slot: String,
    pub date: String,
}

impl CreateBooking {
    /// Trim and check every field, collecting one detail entry per problem.
    ///
    /// Phone and email are opaque user identifiers: they must be present but
    /// are never format-checked.
    pub fn validate(self) -> Result<BookingRequest, Vec<Value>> {
        let request = BookingRequest {
            turf_id: self.turf_id.trim().to_string(),
            user_phone: self.user_phone.trim().to_string(),
            user_email: self.user_email.trim().to_string(),
            slot: self.slot.trim().to_string(),
            date: self.date.trim().to_string(),
        };

        let mut details = Vec::new();
        for (field, value) in [
            ("turfId", &request.turf_id),
            ("userPhone", &request.user_phone),
            ("userEmail", &request.user_email),
            ("slot", &request.slot),
            ("date", &request.date),
        ] {
            if value.is_empty() {
                details.push(json!({"field": field, "error": "required"}));
            }
        }

        if !request.date.is_empty() && parse_day(&request.date).is_none() {
            details.push(json!({"field": "date", "error": "expected YYYY-MM-DD"}));
        }

        if details.is_empty() {
            Ok(request)
        } else {
            Err(details)
        }
    }
}

/// Query string of `GET /availability`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub turf_id: Option<String>,
    pub date: Option<String>,
}

/// Response of `GET /availability`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub turf_id: String,
    pub date: String,
    pub available_slots: Vec<String>,
}

/// Response of a successful `POST /booking`.
#[derive(Debug, Serialize)]
pub struct BookingCreated {
    pub message: &'static str,
    pub booking: Booking,
}

pub fn parse_day(date: &str) -> Option<Date> {
    Date::parse(date, format_description!("[year]-[month]-[day]")).ok()
}
