use crate::{
    auth::require_identity,
    error::AppError,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use marquee_shared::events::{SeatMapEvent, SeatsHeldEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct AcquireHoldsRequest {
    showing_id: Uuid,
    seat_ids: Vec<Uuid>,
    /// Optional override, capped at the configured default.
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AcquireHoldsResponse {
    accepted: bool,
    conflicting_seats: Vec<Uuid>,
    expires_at: Option<DateTime<Utc>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(acquire_holds))
        .route("/v1/showings/{showing_id}/holds", delete(release_holds))
}

/// All-or-nothing soft reservation of a seat selection. A rejected request
/// still returns 200: the conflict list is the payload the seat map needs.
async fn acquire_holds(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AcquireHoldsRequest>,
) -> Result<Json<AcquireHoldsResponse>, AppError> {
    let identity = require_identity(&headers, &state.auth.secret)?;

    let default_ttl = state.business_rules.hold_ttl();
    let ttl = req
        .ttl_seconds
        .map(|s| chrono::Duration::seconds(s as i64).min(default_ttl));

    // Published events must mirror what was actually held, so duplicates in
    // the request are collapsed here, not just inside the service
    let mut seen = HashSet::new();
    let seat_ids: Vec<Uuid> = req
        .seat_ids
        .into_iter()
        .filter(|s| seen.insert(*s))
        .collect();

    let outcome = state
        .service
        .acquire_holds(req.showing_id, seat_ids.clone(), identity.holder.clone(), ttl)
        .await?;

    if outcome.accepted {
        let event = SeatsHeldEvent {
            showing_id: req.showing_id,
            seat_ids,
            holder: identity.holder.to_string(),
            expires_at: outcome.expires_at.map(|t| t.timestamp()).unwrap_or_default(),
        };

        if let Some(kafka) = &state.kafka {
            kafka.publish_seats_held(&event).await;
        }
        // No subscribers is fine
        let _ = state.sse_tx.send(SeatMapEvent::SeatsHeld(event));
    } else {
        debug!(showing_id = %req.showing_id, "hold request rejected");
    }

    Ok(Json(AcquireHoldsResponse {
        accepted: outcome.accepted,
        conflicting_seats: outcome.conflicting_seats,
        expires_at: outcome.expires_at,
    }))
}

/// Idempotent release of the caller's holds on a showing, for when the
/// customer abandons checkout explicitly instead of letting the TTL lapse.
async fn release_holds(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(showing_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = require_identity(&headers, &state.auth.secret)?;
    state
        .service
        .release_holds(showing_id, identity.holder)
        .await?;
    Ok(Json(serde_json::json!({ "released": true })))
}
