use crate::{
    auth::require_identity,
    error::AppError,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use marquee_booking::{
    BookingView, ConfirmedBooking, Customer, FinalizeRequest,
};
use marquee_shared::events::{BookingCancelledEvent, BookingConfirmedEvent, SeatMapEvent};
use marquee_shared::Masked;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    showing_id: Uuid,
    seat_ids: Vec<Uuid>,
    /// Required for guest tokens; ignored for account tokens.
    guest_name: Option<String>,
    guest_email: Option<Masked<String>>,
    idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CancelBookingResponse {
    booking_id: Uuid,
    refund_cents: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{booking_id}/cancel", post(cancel_booking))
        .route("/v1/bookings/lookup/{reference}", get(lookup_booking))
}

/// Atomically convert the caller's seat selection into a confirmed booking.
/// Pricing is always server-side; the request never carries amounts.
async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<ConfirmedBooking>, AppError> {
    let identity = require_identity(&headers, &state.auth.secret)?;

    let customer = if identity.is_guest {
        let name = req
            .guest_name
            .ok_or_else(|| AppError::BadRequest("guest_name is required".to_string()))?;
        let email = req
            .guest_email
            .ok_or_else(|| AppError::BadRequest("guest_email is required".to_string()))?;
        Customer::Guest {
            session: identity.holder,
            name,
            email: email.into_inner(),
        }
    } else {
        Customer::Account {
            holder: identity.holder,
        }
    };

    let confirmed = state
        .service
        .finalize(FinalizeRequest {
            showing_id: req.showing_id,
            seat_ids: req.seat_ids,
            customer,
            idempotency_key: req.idempotency_key,
        })
        .await?;

    let event = BookingConfirmedEvent {
        booking_id: confirmed.booking_id,
        showing_id: confirmed.showing_id,
        reference: confirmed.reference.as_str().to_string(),
        seat_ids: confirmed.seats.iter().map(|s| s.seat_id).collect(),
        total_cents: confirmed.total_cents,
        timestamp: confirmed.created_at.timestamp(),
    };
    if let Some(kafka) = &state.kafka {
        kafka.publish_booking_confirmed(&event).await;
    }
    // Seat-map subscribers grey the seats out without re-polling
    let _ = state.sse_tx.send(SeatMapEvent::BookingConfirmed(event));

    info!(booking_id = %confirmed.booking_id, reference = %confirmed.reference.as_str(), "booking created");
    Ok(Json(confirmed))
}

/// Cancel a booking the caller owns (admins may cancel any). The refund is
/// computed once, at this instant, against the showing start time.
async fn cancel_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelBookingResponse>, AppError> {
    let identity = require_identity(&headers, &state.auth.secret)?;

    let outcome = state
        .service
        .cancel(booking_id, identity.holder, identity.is_admin)
        .await?;

    let event = BookingCancelledEvent {
        booking_id: outcome.booking_id,
        showing_id: outcome.showing_id,
        seat_ids: outcome.seat_ids.clone(),
        refund_cents: outcome.refund_cents,
        timestamp: chrono::Utc::now().timestamp(),
    };
    if let Some(kafka) = &state.kafka {
        kafka.publish_booking_cancelled(&event).await;
    }
    // Cancelled seats return to the pool on live seat maps
    let _ = state.sse_tx.send(SeatMapEvent::BookingCancelled(event));

    Ok(Json(CancelBookingResponse {
        booking_id: outcome.booking_id,
        refund_cents: outcome.refund_cents,
    }))
}

/// Reference lookup needs no token: the booking code is the capability.
/// Lookups are case-insensitive on the reference.
async fn lookup_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let view = state.service.find_by_reference(&reference).await?;
    Ok(Json(view))
}

/// The caller's bookings, newest first.
async fn list_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let identity = require_identity(&headers, &state.auth.secret)?;
    let views = state.service.bookings_for_holder(identity.holder).await?;
    Ok(Json(views))
}
