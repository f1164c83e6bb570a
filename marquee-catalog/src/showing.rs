use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled screening of a movie on a specific screen.
///
/// Owned by the catalog/scheduling service; the booking core only reads it.
/// Immutable once created except for the activation flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showing {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub screen_id: Uuid,
    pub starts_at: DateTime<Utc>,
    /// Base ticket price in cents; seat multipliers apply on top.
    pub base_price_cents: i32,
    pub is_active: bool,
}

impl Showing {
    pub fn new(
        movie_id: Uuid,
        screen_id: Uuid,
        starts_at: DateTime<Utc>,
        base_price_cents: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_id,
            screen_id,
            starts_at,
            base_price_cents,
            is_active: true,
        }
    }

    /// Fractional hours until this showing starts. Negative once it has
    /// started or passed.
    pub fn hours_until(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (self.starts_at - now).num_milliseconds() as f64 / 1000.0;
        seconds / 3600.0
    }
}

/// Catalog-related errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Showing not found: {0}")]
    ShowingNotFound(String),

    #[error("Seat not found: {0}")]
    SeatNotFound(String),

    #[error("Seat {seat_id} does not belong to screen {screen_id}")]
    SeatScreenMismatch { seat_id: Uuid, screen_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_hours_until_showing() {
        let now = Utc::now();
        let showing = Showing::new(Uuid::new_v4(), Uuid::new_v4(), now + Duration::hours(24), 1500);

        let hours = showing.hours_until(now);
        assert!((hours - 24.0).abs() < 0.001);

        // Showing already started: negative hours are valid
        let past = showing.hours_until(now + Duration::hours(25));
        assert!(past < 0.0);
    }
}
