use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Turnaround allowance either side of a reserved window.
pub const AVAILABILITY_BUFFER_HOURS: i64 = 24;

fn buffer() -> Duration {
    Duration::hours(AVAILABILITY_BUFFER_HOURS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CabFeature {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "NON/AC")]
    NonAc,
}

/// Informational only; the booking ledger is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEntryStatus {
    Upcoming,
    Past,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEntry {
    pub order_id: ObjectId,
    pub departure_date: DateTime<Utc>,
    #[serde(default)]
    pub drop_off_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accepted: bool,
    pub status: BookingEntryStatus,
}

impl BookingEntry {
    pub fn window_end(&self) -> DateTime<Utc> {
        self.drop_off_date
            .unwrap_or(self.departure_date)
            .max(self.departure_date)
    }

    /// Buffered overlap against `[start, end]`. The lower edge is inclusive
    /// and the upper edge exclusive, as in [`Cab::is_free_around`].
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.departure_date < end + buffer() && start - buffer() <= self.window_end()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("cab already reserved for order {conflicting} in an overlapping window")]
    Overlap { conflicting: ObjectId },

    #[error("booking for order {0} is not on this cab's ledger")]
    UnknownBooking(ObjectId),
}

// Database model for the cabs collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cab {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub model_name: String,
    pub capacity: u32,
    #[serde(default)]
    pub feature: Option<CabFeature>,
    pub cab_number: String,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub is_ready: bool,
    pub availability: Availability,
    pub belongs_to: ObjectId,
    #[serde(default)]
    pub upcoming_bookings: Vec<BookingEntry>,
    #[serde(default)]
    pub past_bookings: Vec<BookingEntry>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

impl Cab {
    /// Moves every upcoming entry whose departure has passed into history.
    /// Returns whether anything moved.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> bool {
        let (expired, upcoming): (Vec<_>, Vec<_>) = std::mem::take(&mut self.upcoming_bookings)
            .into_iter()
            .partition(|entry| entry.departure_date <= now);

        self.upcoming_bookings = upcoming;
        let moved = !expired.is_empty();
        self.past_bookings.extend(expired.into_iter().map(|mut entry| {
            entry.status = BookingEntryStatus::Past;
            entry
        }));
        self.refresh_availability();
        moved
    }

    fn active_entries(&self) -> impl Iterator<Item = &BookingEntry> {
        self.upcoming_bookings
            .iter()
            .filter(|entry| entry.status == BookingEntryStatus::Upcoming)
    }

    /// No upcoming departure within the buffer either side of `date`.
    pub fn is_free_around(&self, date: DateTime<Utc>) -> bool {
        let from = date - buffer();
        let until = date + buffer();
        !self
            .active_entries()
            .any(|entry| entry.departure_date >= from && entry.departure_date < until)
    }

    /// Earliest reservation still ahead of the cab.
    pub fn next_booking(&self) -> Option<&BookingEntry> {
        self.active_entries().min_by_key(|entry| entry.departure_date)
    }

    fn first_overlap(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<&BookingEntry> {
        self.active_entries().find(|entry| entry.overlaps(start, end))
    }

    pub fn reserve(
        &mut self,
        order_id: ObjectId,
        departure_date: DateTime<Utc>,
        drop_off_date: Option<DateTime<Utc>>,
    ) -> Result<(), LedgerError> {
        let entry = BookingEntry {
            order_id,
            departure_date,
            drop_off_date,
            accepted: false,
            status: BookingEntryStatus::Upcoming,
        };
        if let Some(existing) = self.first_overlap(entry.departure_date, entry.window_end()) {
            return Err(LedgerError::Overlap {
                conflicting: existing.order_id,
            });
        }

        self.upcoming_bookings.push(entry);
        self.upcoming_bookings
            .sort_by(|a, b| a.departure_date.cmp(&b.departure_date));
        self.refresh_availability();
        Ok(())
    }

    /// Drops every entry for `order_id`, whatever its status. Releasing an
    /// unknown order is a no-op. Returns whether anything was removed.
    pub fn release(&mut self, order_id: &ObjectId) -> bool {
        let before = self.upcoming_bookings.len() + self.past_bookings.len();
        self.upcoming_bookings.retain(|entry| &entry.order_id != order_id);
        self.past_bookings.retain(|entry| &entry.order_id != order_id);
        self.refresh_availability();
        before != self.upcoming_bookings.len() + self.past_bookings.len()
    }

    pub fn accept(&mut self, order_id: &ObjectId) -> Result<(), LedgerError> {
        let entry = self
            .upcoming_bookings
            .iter_mut()
            .find(|entry| &entry.order_id == order_id)
            .ok_or(LedgerError::UnknownBooking(*order_id))?;
        entry.accepted = true;
        Ok(())
    }

    /// Frees the interval and keeps it in history as a past booking.
    pub fn archive(&mut self, order_id: &ObjectId) {
        if let Some(pos) = self
            .upcoming_bookings
            .iter()
            .position(|entry| &entry.order_id == order_id)
        {
            let mut entry = self.upcoming_bookings.remove(pos);
            entry.status = BookingEntryStatus::Past;
            self.past_bookings.push(entry);
        }
        self.refresh_availability();
    }

    pub fn booking_for(&self, order_id: &ObjectId) -> Option<&BookingEntry> {
        self.upcoming_bookings
            .iter()
            .chain(self.past_bookings.iter())
            .find(|entry| &entry.order_id == order_id)
    }

    /// A rate of 1 is the "not yet priced" placeholder.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        self.is_ready = rate != 1.0;
    }

    fn refresh_availability(&mut self) {
        self.availability = if self.active_entries().next().is_some() {
            Availability::Booked
        } else {
            Availability::Available
        };
    }
}

// Model for cab response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CabResponse {
    pub cab_id: String,
    pub model_name: String,
    pub capacity: u32,
    pub feature: Option<CabFeature>,
    pub cab_number: String,
    pub rate: f64,
    pub is_ready: bool,
    pub availability: Availability,
    pub belongs_to: String,
    pub upcoming_bookings: Vec<BookingEntry>,
}

impl From<Cab> for CabResponse {
    fn from(cab: Cab) -> Self {
        CabResponse {
            cab_id: cab.id.to_hex(),
            model_name: cab.model_name,
            capacity: cab.capacity,
            feature: cab.feature,
            cab_number: cab.cab_number,
            rate: cab.rate,
            is_ready: cab.is_ready,
            availability: cab.availability,
            belongs_to: cab.belongs_to.to_hex(),
            upcoming_bookings: cab.upcoming_bookings,
        }
    }
}
