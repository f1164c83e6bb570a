pub mod clock;
pub mod engine;
pub mod error;
pub mod holds;
pub mod lookup;
pub mod models;
pub mod reference;
pub mod refund;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::BookingEngine;
pub use error::BookingError;
pub use lookup::BookingView;
pub use models::{
    Booking, BookingSeat, BookingStatus, CancelOutcome, ConfirmedBooking, Customer,
    FinalizeRequest, HoldOutcome, HolderId, SeatAvailability, SeatStatus,
};
pub use reference::BookingReference;
pub use refund::RefundPolicy;
pub use service::BookingService;
