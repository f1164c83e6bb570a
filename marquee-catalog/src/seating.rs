use crate::showing::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Seat categories with their default price multipliers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatCategory {
    Regular,
    Premium,
    Vip,
}

impl SeatCategory {
    /// Default multiplier applied to the showing's base price.
    pub fn default_multiplier(&self) -> f64 {
        match self {
            SeatCategory::Regular => 1.0,
            SeatCategory::Premium => 1.25,
            SeatCategory::Vip => 1.5,
        }
    }
}

/// A physical seat on a screen. Immutable; identity is the seat id —
/// row/number are display attributes only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub screen_id: Uuid,
    pub row: String,
    pub number: i32,
    pub category: SeatCategory,
    pub price_multiplier: f64,
}

impl Seat {
    pub fn new(screen_id: Uuid, row: &str, number: i32, category: SeatCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            screen_id,
            row: row.to_string(),
            number,
            category,
            price_multiplier: category.default_multiplier(),
        }
    }

    /// Effective price for this seat given the showing's base price.
    pub fn effective_price_cents(&self, base_price_cents: i32) -> i32 {
        (base_price_cents as f64 * self.price_multiplier).round() as i32
    }
}

/// The full seat layout of a screen, keyed by seat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatingPlan {
    pub screen_id: Uuid,
    seats: HashMap<Uuid, Seat>,
}

impl SeatingPlan {
    pub fn new(screen_id: Uuid, seats: Vec<Seat>) -> Self {
        let seats = seats.into_iter().map(|s| (s.id, s)).collect();
        Self { screen_id, seats }
    }

    /// Build a rectangular layout: rows labelled A, B, C... with
    /// `seats_per_row` seats each, all in the given category.
    pub fn grid(screen_id: Uuid, rows: u8, seats_per_row: i32, category: SeatCategory) -> Self {
        let mut seats = Vec::new();
        for r in 0..rows {
            let label = ((b'A' + r) as char).to_string();
            for n in 1..=seats_per_row {
                seats.push(Seat::new(screen_id, &label, n, category));
            }
        }
        Self::new(screen_id, seats)
    }

    pub fn seat(&self, seat_id: &Uuid) -> Option<&Seat> {
        self.seats.get(seat_id)
    }

    pub fn require_seat(&self, seat_id: &Uuid) -> Result<&Seat, CatalogError> {
        self.seats
            .get(seat_id)
            .ok_or_else(|| CatalogError::SeatNotFound(seat_id.to_string()))
    }

    pub fn contains(&self, seat_id: &Uuid) -> bool {
        self.seats.contains_key(seat_id)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Seats ordered by row then number, for stable seat-map rendering.
    pub fn seats_ordered(&self) -> Vec<&Seat> {
        let mut all: Vec<&Seat> = self.seats.values().collect();
        all.sort_by(|a, b| a.row.cmp(&b.row).then(a.number.cmp(&b.number)));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_price() {
        let screen_id = Uuid::new_v4();
        let regular = Seat::new(screen_id, "A", 1, SeatCategory::Regular);
        let premium = Seat::new(screen_id, "B", 1, SeatCategory::Premium);
        let vip = Seat::new(screen_id, "C", 1, SeatCategory::Vip);

        assert_eq!(regular.effective_price_cents(1000), 1000);
        assert_eq!(premium.effective_price_cents(1000), 1250);
        assert_eq!(vip.effective_price_cents(1000), 1500);
    }

    #[test]
    fn test_grid_layout() {
        let plan = SeatingPlan::grid(Uuid::new_v4(), 3, 4, SeatCategory::Regular);
        assert_eq!(plan.len(), 12);

        let ordered = plan.seats_ordered();
        assert_eq!(ordered[0].row, "A");
        assert_eq!(ordered[0].number, 1);
        assert_eq!(ordered[11].row, "C");
        assert_eq!(ordered[11].number, 4);
    }

    #[test]
    fn test_require_seat_missing() {
        let plan = SeatingPlan::grid(Uuid::new_v4(), 1, 1, SeatCategory::Regular);
        let result = plan.require_seat(&Uuid::new_v4());
        assert!(result.is_err());
    }
}
