use crate::models::{Booking, BookingSeat, BookingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only projection returned by lookup. Carries the guest-supplied name
/// and contact when present; account display names are resolved by the
/// caller from the profile service, falling back to nothing.
///
/// The booking reference is the capability here: anyone holding the code
/// sees this view, including guest contact details. That trust model is
/// deliberate and documented, not an oversight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    pub booking_id: Uuid,
    pub reference: String,
    pub showing_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub seats: Vec<BookingSeat>,
    pub total_cents: i32,
    pub status: BookingStatus,
    pub customer_name: Option<String>,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_cents: Option<i32>,
}

impl BookingView {
    pub fn project(booking: &Booking, starts_at: DateTime<Utc>) -> Self {
        Self {
            booking_id: booking.id,
            reference: booking.reference.as_str().to_string(),
            showing_id: booking.showing_id,
            starts_at,
            seats: booking.seats.clone(),
            total_cents: booking.total_cents,
            status: booking.status,
            customer_name: booking.customer.guest_name().map(str::to_string),
            contact_email: booking.customer.contact_email().map(str::to_string),
            created_at: booking.created_at,
            cancelled_at: booking.cancelled_at,
            refund_cents: booking.refund_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, HolderId};
    use crate::reference::BookingReference;

    #[test]
    fn test_projection_uses_guest_name() {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            reference: BookingReference::normalize("MQ20250314-ABC123"),
            showing_id: Uuid::new_v4(),
            customer: Customer::Guest {
                session: HolderId::new("sess-9"),
                name: "Grace".into(),
                email: "grace@example.com".into(),
            },
            seats: vec![BookingSeat {
                seat_id: Uuid::new_v4(),
                price_cents: 1200,
            }],
            total_cents: 1200,
            status: BookingStatus::Confirmed,
            created_at: now,
            cancelled_at: None,
            refund_cents: None,
            idempotency_key: None,
        };

        let view = BookingView::project(&booking, now + chrono::Duration::hours(3));
        assert_eq!(view.customer_name.as_deref(), Some("Grace"));
        assert_eq!(view.contact_email.as_deref(), Some("grace@example.com"));
        assert_eq!(view.reference, "MQ20250314-ABC123");
    }
}
