use crate::{error::AppError, state::AppState};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use marquee_booking::SeatAvailability;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/showings/{showing_id}/availability", get(get_availability))
        .route("/v1/showings/{showing_id}/stream", get(stream_seat_events))
}

/// Point-in-time seat map. Advisory only: a seat shown available here may
/// be gone by the time the caller tries to hold it.
async fn get_availability(
    State(state): State<AppState>,
    Path(showing_id): Path<Uuid>,
) -> Result<Json<SeatAvailability>, AppError> {
    let availability = state.service.availability(showing_id).await?;
    Ok(Json(availability))
}

/// Live hold notifications for one showing, so seat maps can grey out seats
/// without polling. Each subscriber gets the broadcast feed filtered to the
/// showing it asked about.
async fn stream_seat_events(
    State(state): State<AppState>,
    Path(showing_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.showing_id() == showing_id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event(event.name()).data(data)))
            }
            // Wrong showing, or the subscriber lagged behind the channel
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
