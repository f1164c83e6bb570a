pub mod pricing;
pub mod seating;
pub mod showing;

pub use pricing::{Quote, QuoteLine};
pub use seating::{Seat, SeatCategory, SeatingPlan};
pub use showing::{CatalogError, Showing};
