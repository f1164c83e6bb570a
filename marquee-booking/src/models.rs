use crate::error::BookingError;
use crate::reference::BookingReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity owning holds and bookings. For authenticated customers
/// this is the account subject; for guests it is the checkout session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId(pub String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is buying. Guest checkout is a first-class flow: it carries name and
/// contact in lieu of an account identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Customer {
    Account {
        holder: HolderId,
    },
    Guest {
        session: HolderId,
        name: String,
        email: String,
    },
}

impl Customer {
    /// The identity that owns holds and may cancel the booking.
    pub fn holder(&self) -> &HolderId {
        match self {
            Customer::Account { holder } => holder,
            Customer::Guest { session, .. } => session,
        }
    }

    /// Guest-supplied name, if any. Account display names come from the
    /// profile service at view time.
    pub fn guest_name(&self) -> Option<&str> {
        match self {
            Customer::Account { .. } => None,
            Customer::Guest { name, .. } => Some(name),
        }
    }

    pub fn contact_email(&self) -> Option<&str> {
        match self {
            Customer::Account { .. } => None,
            Customer::Guest { email, .. } => Some(email),
        }
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        match self {
            Customer::Account { holder } => {
                if holder.as_str().trim().is_empty() {
                    return Err(BookingError::NotAuthenticated);
                }
            }
            Customer::Guest {
                session,
                name,
                email,
            } => {
                if session.as_str().trim().is_empty() {
                    return Err(BookingError::validation("guest_session"));
                }
                if name.trim().is_empty() {
                    return Err(BookingError::validation("guest_name"));
                }
                if email.trim().is_empty() || !email.contains('@') {
                    return Err(BookingError::validation("guest_email"));
                }
            }
        }
        Ok(())
    }
}

/// A time-limited soft claim on one seat during checkout. A lease, not a
/// lock: once `expires_at` passes, every reader stops counting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub showing_id: Uuid,
    pub seat_id: Uuid,
    pub holder: HolderId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Reserved for payment-in-flight scenarios; finalize lands straight on
    /// Confirmed since payment confirmation is external.
    Pending,
    Confirmed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Refunded)
    }
}

/// One seat line item within a booking, priced at finalize time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSeat {
    pub seat_id: Uuid,
    pub price_cents: i32,
}

/// A finalized purchase. Created only by the booking engine's atomic
/// finalize; mutated only by cancellation; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub reference: BookingReference,
    pub showing_id: Uuid,
    pub customer: Customer,
    pub seats: Vec<BookingSeat>,
    pub total_cents: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_cents: Option<i32>,
    pub idempotency_key: Option<String>,
}

impl Booking {
    pub fn seat_ids(&self) -> Vec<Uuid> {
        self.seats.iter().map(|s| s.seat_id).collect()
    }

    /// Seats still counted against availability.
    pub fn claims_seats(&self) -> bool {
        !self.status.is_cancelled()
    }
}

/// Input to the atomic finalize operation. The total is always computed
/// server-side from the catalog, never taken from the request.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub showing_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub customer: Customer,
    pub idempotency_key: Option<String>,
}

/// Successful finalize result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedBooking {
    pub booking_id: Uuid,
    pub reference: BookingReference,
    pub showing_id: Uuid,
    pub seats: Vec<BookingSeat>,
    pub total_cents: i32,
    pub created_at: DateTime<Utc>,
}

/// Result of a hold acquisition. All-or-nothing: on rejection no holds are
/// created and the conflicting seats are listed for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldOutcome {
    pub accepted: bool,
    pub conflicting_seats: Vec<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl HoldOutcome {
    pub fn accepted(expires_at: DateTime<Utc>) -> Self {
        Self {
            accepted: true,
            conflicting_seats: Vec::new(),
            expires_at: Some(expires_at),
        }
    }

    pub fn rejected(conflicting_seats: Vec<Uuid>) -> Self {
        Self {
            accepted: false,
            conflicting_seats,
            expires_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub booking_id: Uuid,
    pub showing_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub refund_cents: i32,
}

/// One seat on the availability map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatStatus {
    pub seat_id: Uuid,
    pub row: String,
    pub number: i32,
    pub category: marquee_catalog::SeatCategory,
    pub price_cents: i32,
    pub available: bool,
}

/// Current availability for a showing: every seat of the screen, taken iff
/// referenced by a non-cancelled booking or a non-expired hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatAvailability {
    pub showing_id: Uuid,
    pub seats: Vec<SeatStatus>,
}

impl SeatAvailability {
    pub fn is_available(&self, seat_id: &Uuid) -> bool {
        self.seats
            .iter()
            .any(|s| s.seat_id == *seat_id && s.available)
    }

    pub fn available_count(&self) -> usize {
        self.seats.iter().filter(|s| s.available).count()
    }
}
