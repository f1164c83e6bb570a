use uuid::Uuid;

/// Fan-out payload for live seat-map subscribers. One stream per showing
/// carries every transition that flips seat availability.
#[derive(Debug, serde::Serialize, Clone)]
#[serde(untagged)]
pub enum SeatMapEvent {
    SeatsHeld(SeatsHeldEvent),
    BookingConfirmed(BookingConfirmedEvent),
    BookingCancelled(BookingCancelledEvent),
}

impl SeatMapEvent {
    pub fn showing_id(&self) -> Uuid {
        match self {
            SeatMapEvent::SeatsHeld(e) => e.showing_id,
            SeatMapEvent::BookingConfirmed(e) => e.showing_id,
            SeatMapEvent::BookingCancelled(e) => e.showing_id,
        }
    }

    /// SSE event name subscribers dispatch on.
    pub fn name(&self) -> &'static str {
        match self {
            SeatMapEvent::SeatsHeld(_) => "seats_held",
            SeatMapEvent::BookingConfirmed(_) => "booking_confirmed",
            SeatMapEvent::BookingCancelled(_) => "booking_cancelled",
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatsHeldEvent {
    pub showing_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub holder: String,
    pub expires_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub showing_id: Uuid,
    pub reference: String,
    pub seat_ids: Vec<Uuid>,
    pub total_cents: i32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub showing_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub refund_cents: i32,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_map_event_dispatch() {
        let showing_id = Uuid::new_v4();
        let held = SeatMapEvent::SeatsHeld(SeatsHeldEvent {
            showing_id,
            seat_ids: vec![Uuid::new_v4()],
            holder: "sess-1".into(),
            expires_at: 0,
        });
        assert_eq!(held.showing_id(), showing_id);
        assert_eq!(held.name(), "seats_held");

        let confirmed = SeatMapEvent::BookingConfirmed(BookingConfirmedEvent {
            booking_id: Uuid::new_v4(),
            showing_id,
            reference: "MQ20250314-ABC123".into(),
            seat_ids: vec![],
            total_cents: 1000,
            timestamp: 0,
        });
        assert_eq!(confirmed.name(), "booking_confirmed");

        let cancelled = SeatMapEvent::BookingCancelled(BookingCancelledEvent {
            booking_id: Uuid::new_v4(),
            showing_id,
            seat_ids: vec![],
            refund_cents: 500,
            timestamp: 0,
        });
        assert_eq!(cancelled.name(), "booking_cancelled");
        assert_eq!(cancelled.showing_id(), showing_id);
    }
}
