use crate::error::BookingError;
use crate::lookup::BookingView;
use crate::models::{
    CancelOutcome, ConfirmedBooking, FinalizeRequest, HoldOutcome, HolderId, SeatAvailability,
};
use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

/// The seat-state operations shared by the in-memory engine and the
/// Postgres-backed store. Every implementation must run each operation's
/// read-check-write sequence as one atomic unit per showing.
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Current seat map for a showing: taken iff claimed by a non-cancelled
    /// booking or a non-expired hold.
    async fn availability(&self, showing_id: Uuid) -> Result<SeatAvailability, BookingError>;

    /// All-or-nothing soft reservation. Releases the holder's prior holds
    /// for the showing first, so restarting checkout never self-conflicts.
    /// `ttl` of `None` uses the configured default.
    async fn acquire_holds(
        &self,
        showing_id: Uuid,
        seat_ids: Vec<Uuid>,
        holder: HolderId,
        ttl: Option<Duration>,
    ) -> Result<HoldOutcome, BookingError>;

    /// Idempotent release of the holder's holds on a showing.
    async fn release_holds(&self, showing_id: Uuid, holder: HolderId)
        -> Result<(), BookingError>;

    /// Atomically convert a seat selection into a confirmed booking, or
    /// fail with `SeatsUnavailable` listing the seats another party won.
    async fn finalize(&self, request: FinalizeRequest) -> Result<ConfirmedBooking, BookingError>;

    /// Cancel a booking owned by `requester` (admins may cancel any) and
    /// compute the refund at this instant.
    async fn cancel(
        &self,
        booking_id: Uuid,
        requester: HolderId,
        is_admin: bool,
    ) -> Result<CancelOutcome, BookingError>;

    /// Case-insensitive reference lookup. The reference is the capability:
    /// anyone holding the code may view the booking.
    async fn find_by_reference(&self, code: &str) -> Result<BookingView, BookingError>;

    /// The holder's bookings, newest first.
    async fn bookings_for_holder(
        &self,
        holder: HolderId,
    ) -> Result<Vec<BookingView>, BookingError>;
}
