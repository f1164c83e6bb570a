use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_booking::BookingError;
use serde_json::json;

/// HTTP-facing error. Domain errors keep their stable wire code; everything
/// else collapses to a 500 with the detail kept server-side.
#[derive(Debug)]
pub enum AppError {
    Domain(BookingError),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    TooManyRequests,
    Internal(anyhow::Error),
}

impl AppError {
    fn status_for(err: &BookingError) -> StatusCode {
        match err {
            BookingError::SeatsUnavailable(_) | BookingError::AlreadyCancelled => {
                StatusCode::CONFLICT
            }
            BookingError::NoSeatsSelected | BookingError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            BookingError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            BookingError::ShowingNotFound(_) | BookingError::BookingNotFound => {
                StatusCode::NOT_FOUND
            }
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, detail) = match self {
            AppError::Domain(err) => {
                let status = Self::status_for(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                    (
                        status,
                        err.code(),
                        "Internal Server Error".to_string(),
                        None,
                    )
                } else {
                    let detail = match &err {
                        BookingError::SeatsUnavailable(seats) => {
                            Some(json!({ "conflicting_seats": seats }))
                        }
                        _ => None,
                    };
                    (status, err.code(), err.to_string(), detail)
                }
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "not_authenticated", msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg, None),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
                None,
            ),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "Internal Server Error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(detail) = detail {
            body["detail"] = detail;
        }

        (status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Domain(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_domain_errors_map_to_expected_status() {
        let cases = [
            (
                BookingError::SeatsUnavailable(vec![Uuid::new_v4()]),
                StatusCode::CONFLICT,
            ),
            (BookingError::AlreadyCancelled, StatusCode::CONFLICT),
            (BookingError::NoSeatsSelected, StatusCode::BAD_REQUEST),
            (
                BookingError::validation("guest_email"),
                StatusCode::BAD_REQUEST,
            ),
            (BookingError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (BookingError::BookingNotFound, StatusCode::NOT_FOUND),
            (
                BookingError::Storage("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::status_for(&err), expected, "{}", err.code());
        }
    }
}
