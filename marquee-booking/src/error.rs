use uuid::Uuid;

/// Errors surfaced by the booking core.
///
/// Callers rely on the split between recoverable conditions (another party
/// won the race, bad input, missing identity) and fatal ones (storage
/// failures) to decide whether to prompt the user or show a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Seats unavailable: {0:?}")]
    SeatsUnavailable(Vec<Uuid>),

    #[error("No seats selected")]
    NoSeatsSelected,

    #[error("Validation failed for field: {field}")]
    Validation { field: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Showing not found: {0}")]
    ShowingNotFound(Uuid),

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Booking already cancelled")]
    AlreadyCancelled,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    /// Stable wire code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::SeatsUnavailable(_) => "seats_unavailable",
            BookingError::NoSeatsSelected => "no_seats_selected",
            BookingError::Validation { .. } => "validation_error",
            BookingError::NotAuthenticated => "not_authenticated",
            BookingError::ShowingNotFound(_) => "showing_not_found",
            BookingError::BookingNotFound => "booking_not_found",
            BookingError::AlreadyCancelled => "already_cancelled",
            BookingError::Storage(_) => "storage_error",
        }
    }

    /// Conflict, validation and authorization errors are recoverable by the
    /// caller (re-query, fix input, re-authenticate). Storage errors are not
    /// and must not be retried blindly.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BookingError::Storage(_))
    }

    pub fn validation(field: &str) -> Self {
        BookingError::Validation {
            field: field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BookingError::SeatsUnavailable(vec![]).code(),
            "seats_unavailable"
        );
        assert_eq!(BookingError::AlreadyCancelled.code(), "already_cancelled");
        assert_eq!(BookingError::validation("guest_email").code(), "validation_error");
    }

    #[test]
    fn test_recoverability_split() {
        assert!(BookingError::SeatsUnavailable(vec![Uuid::new_v4()]).is_recoverable());
        assert!(BookingError::NotAuthenticated.is_recoverable());
        assert!(!BookingError::Storage("connection reset".into()).is_recoverable());
    }
}
