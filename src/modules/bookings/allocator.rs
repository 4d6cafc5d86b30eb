//! Slot allocation for turf bookings.
//!
//! Availability is always computed per turf and date. The final write relies on
//! the `(turfId, date, slot)` unique index of the booking collection, so two
//! requests racing for the same slot cannot both be stored: the loser is
//! classified against the winning booking exactly like a sequential attempt.

use thiserror::Error;
use time::OffsetDateTime;
use turfbook_db::{Database, DbError, Filter};

use super::models::{Booking, BookingRequest, NewBooking, COLLECTION};
use crate::modules::turfs::models::{Turf, COLLECTION as TURFS};

/// Outcome of a rejected booking attempt.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("turf '{0}' not found")]
    TurfNotFound(String),

    #[error("slot '{slot}' is not offered by turf '{turf_id}'")]
    InvalidSlot { turf_id: String, slot: String },

    #[error("slot already booked by the same user")]
    AlreadyBookedBySameUser { available_slots: Vec<String> },

    #[error("slot already booked")]
    SlotTaken { available_slots: Vec<String> },

    #[error("no slots remaining for the requested day")]
    NoSlotsRemaining,

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl BookingError {
    /// Alternatives offered with a conflict, `None` for other errors.
    pub fn available_slots(&self) -> Option<&[String]> {
        match self {
            BookingError::AlreadyBookedBySameUser { available_slots }
            | BookingError::SlotTaken { available_slots } => Some(available_slots),
            BookingError::NoSlotsRemaining => Some(&[]),
            _ => None,
        }
    }

    /// Whether the attempt collided with an existing booking.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BookingError::AlreadyBookedBySameUser { .. }
                | BookingError::SlotTaken { .. }
                | BookingError::NoSlotsRemaining
        )
    }
}

/// Decides whether a booking attempt is admissible and records it.
#[derive(Clone)]
pub struct Allocator {
    db: Database,
}

impl Allocator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Attempt to book `request.slot` on `request.date` at `request.turf_id`.
    ///
    /// Exactly one booking is stored on success and none on failure.
    pub async fn attempt(&self, request: &BookingRequest) -> Result<Booking, BookingError> {
        let turf = self.turf(&request.turf_id).await?;

        if !turf.offers(&request.slot) {
            return Err(BookingError::InvalidSlot {
                turf_id: turf.id,
                slot: request.slot.clone(),
            });
        }

        if let Some(holder) = self.holder(request).await? {
            return Err(self.reject(&turf, request, &holder).await?);
        }

        let new_booking = NewBooking::from_request(request, OffsetDateTime::now_utc());
        match self.db.insert::<_, Booking>(COLLECTION, &new_booking).await {
            Ok(booking) => {
                tracing::info!(
                    booking_id = %booking.id,
                    turf_id = %booking.turf_id,
                    slot = %booking.slot,
                    date = %booking.date,
                    "booking created"
                );
                Ok(booking)
            }
            Err(DbError::DuplicateKey { .. }) => {
                tracing::debug!(
                    turf_id = %request.turf_id,
                    slot = %request.slot,
                    date = %request.date,
                    "slot claimed by a concurrent booking"
                );
                match self.holder(request).await? {
                    Some(holder) => Err(self.reject(&turf, request, &holder).await?),
                    None => Err(BookingError::SlotTaken {
                        available_slots: self.available_slots(&turf, &request.date).await?,
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Slots of the turf's catalog still free on `date`, in catalog order.
    pub async fn availability(
        &self,
        turf_id: &str,
        date: &str,
    ) -> Result<Vec<String>, BookingError> {
        let turf = self.turf(turf_id).await?;
        Ok(self.available_slots(&turf, date).await?)
    }

    async fn turf(&self, turf_id: &str) -> Result<Turf, BookingError> {
        self.db
            .find_by_id::<Turf>(TURFS, turf_id)
            .await?
            .ok_or_else(|| BookingError::TurfNotFound(turf_id.to_string()))
    }

    /// The booking currently occupying the requested turf, date and slot.
    async fn holder(&self, request: &BookingRequest) -> Result<Option<Booking>, DbError> {
        self.db
            .find_one(
                COLLECTION,
                &Filter::and([
                    Filter::eq("turfId", request.turf_id.as_str()),
                    Filter::eq("date", request.date.as_str()),
                    Filter::eq("slot", request.slot.as_str()),
                ]),
            )
            .await
    }

    async fn available_slots(&self, turf: &Turf, date: &str) -> Result<Vec<String>, DbError> {
        let booked: Vec<Booking> = self
            .db
            .find(
                COLLECTION,
                &Filter::and([
                    Filter::eq("turfId", turf.id.as_str()),
                    Filter::eq("date", date),
                ]),
            )
            .await?;

        Ok(turf
            .slots
            .iter()
            .filter(|slot| !booked.iter().any(|b| &b.slot == *slot))
            .cloned()
            .collect())
    }

    /// Classify an attempt for a slot that `holder` already occupies.
    async fn reject(
        &self,
        turf: &Turf,
        request: &BookingRequest,
        holder: &Booking,
    ) -> Result<BookingError, DbError> {
        let available_slots = self.available_slots(turf, &request.date).await?;

        Ok(if holder.held_by(request) {
            BookingError::AlreadyBookedBySameUser { available_slots }
        } else if available_slots.is_empty() {
            BookingError::NoSlotsRemaining
        } else {
            BookingError::SlotTaken { available_slots }
        })
    }
}
