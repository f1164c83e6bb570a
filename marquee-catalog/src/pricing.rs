use crate::seating::SeatingPlan;
use crate::showing::{CatalogError, Showing};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One priced seat within a quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteLine {
    pub seat_id: Uuid,
    pub price_cents: i32,
}

/// Server-side price for a seat selection. Totals are always computed from
/// the catalog, never trusted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub showing_id: Uuid,
    pub lines: Vec<QuoteLine>,
    pub total_cents: i32,
}

impl Quote {
    /// Price the requested seats against the showing and its seating plan.
    /// Fails if any seat is unknown or belongs to a different screen.
    pub fn for_seats(
        showing: &Showing,
        plan: &SeatingPlan,
        seat_ids: &[Uuid],
    ) -> Result<Self, CatalogError> {
        let mut lines = Vec::with_capacity(seat_ids.len());
        let mut total_cents = 0;

        for seat_id in seat_ids {
            let seat = plan.require_seat(seat_id)?;
            if seat.screen_id != showing.screen_id {
                return Err(CatalogError::SeatScreenMismatch {
                    seat_id: *seat_id,
                    screen_id: showing.screen_id,
                });
            }
            let price_cents = seat.effective_price_cents(showing.base_price_cents);
            total_cents += price_cents;
            lines.push(QuoteLine {
                seat_id: *seat_id,
                price_cents,
            });
        }

        Ok(Self {
            showing_id: showing.id,
            lines,
            total_cents,
        })
    }
}
