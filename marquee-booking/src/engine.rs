use crate::clock::Clock;
use crate::error::BookingError;
use crate::holds::HoldLedger;
use crate::lookup::BookingView;
use crate::models::{
    Booking, BookingSeat, BookingStatus, CancelOutcome, ConfirmedBooking, FinalizeRequest,
    HoldOutcome, HolderId, SeatAvailability, SeatStatus,
};
use crate::reference::BookingReference;
use crate::refund::RefundPolicy;
use crate::service::BookingService;
use async_trait::async_trait;
use chrono::Duration;
use marquee_catalog::{Quote, SeatingPlan, Showing};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

const REFERENCE_RETRY_LIMIT: usize = 32;

struct ShowingRecord {
    showing: Showing,
    plan: SeatingPlan,
}

#[derive(Default)]
struct EngineState {
    showings: HashMap<Uuid, ShowingRecord>,
    holds: HoldLedger,
    bookings: HashMap<Uuid, Booking>,
    by_reference: HashMap<String, Uuid>,
    by_idempotency: HashMap<String, Uuid>,
}

/// In-memory booking engine: the reference implementation of the seat-state
/// machine (hold → booked → cancelled).
///
/// Concurrent operations on the same showing are serialized by a per-showing
/// async mutex so a finalize's availability check and its write form one
/// atomic unit; at most one caller can observe a seat as free and claim it.
/// The serialization point is never held across external I/O.
pub struct BookingEngine {
    clock: Arc<dyn Clock>,
    refund_policy: RefundPolicy,
    reference_prefix: String,
    default_hold_ttl: Duration,
    state: Mutex<EngineState>,
    showing_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl BookingEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            refund_policy: RefundPolicy::default(),
            reference_prefix: "MQ".to_string(),
            default_hold_ttl: Duration::minutes(10),
            state: Mutex::new(EngineState::default()),
            showing_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refund_policy(mut self, policy: RefundPolicy) -> Self {
        self.refund_policy = policy;
        self
    }

    pub fn with_reference_prefix(mut self, prefix: &str) -> Self {
        self.reference_prefix = prefix.to_uppercase();
        self
    }

    pub fn with_hold_ttl(mut self, ttl: Duration) -> Self {
        self.default_hold_ttl = ttl;
        self
    }

    /// Register a showing and its seat layout from the catalog service.
    pub fn register_showing(&self, showing: Showing, plan: SeatingPlan) {
        let mut state = self.state.lock().expect("engine state poisoned");
        state
            .showings
            .insert(showing.id, ShowingRecord { showing, plan });
    }

    /// Hygiene sweep of lapsed holds. Not required for correctness.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("engine state poisoned");
        state.holds.sweep_expired(now)
    }

    pub fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        let state = self.state.lock().expect("engine state poisoned");
        state.bookings.get(&booking_id).cloned()
    }

    /// Serialization point for one showing. Concurrent finalize/acquire
    /// calls for the same showing cannot interleave their read-then-write
    /// steps; cross-showing operations stay independent.
    fn showing_lock(&self, showing_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.showing_locks.lock().expect("lock table poisoned");
        locks
            .entry(showing_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn dedupe(seat_ids: Vec<Uuid>) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        seat_ids.into_iter().filter(|s| seen.insert(*s)).collect()
    }
}

impl EngineState {
    fn showing(&self, showing_id: Uuid) -> Result<&ShowingRecord, BookingError> {
        self.showings
            .get(&showing_id)
            .filter(|r| r.showing.is_active)
            .ok_or(BookingError::ShowingNotFound(showing_id))
    }

    /// Seats of a showing claimed by any non-cancelled booking.
    fn booked_seats(&self, showing_id: Uuid) -> HashSet<Uuid> {
        self.bookings
            .values()
            .filter(|b| b.showing_id == showing_id && b.claims_seats())
            .flat_map(|b| b.seats.iter().map(|s| s.seat_id))
            .collect()
    }

    fn next_reference(
        &self,
        prefix: &str,
        on: chrono::NaiveDate,
    ) -> Result<BookingReference, BookingError> {
        let mut rng = rand::thread_rng();
        for _ in 0..REFERENCE_RETRY_LIMIT {
            let candidate = BookingReference::generate(prefix, on, &mut rng);
            if !self.by_reference.contains_key(candidate.as_str()) {
                return Ok(candidate);
            }
        }
        // Collisions are astronomically rare; exhausting retries means the
        // generator is broken and succeeding silently is worse than failing.
        Err(BookingError::Storage(
            "booking reference space exhausted".to_string(),
        ))
    }
}

#[async_trait]
impl BookingService for BookingEngine {
    async fn availability(&self, showing_id: Uuid) -> Result<SeatAvailability, BookingError> {
        let now = self.clock.now();
        let state = self.state.lock().expect("engine state poisoned");
        let record = state.showing(showing_id)?;

        let booked = state.booked_seats(showing_id);
        let held = state.holds.active_seats(showing_id, now);

        let seats = record
            .plan
            .seats_ordered()
            .into_iter()
            .map(|seat| SeatStatus {
                seat_id: seat.id,
                row: seat.row.clone(),
                number: seat.number,
                category: seat.category,
                price_cents: seat.effective_price_cents(record.showing.base_price_cents),
                available: !booked.contains(&seat.id) && !held.contains(&seat.id),
            })
            .collect();

        Ok(SeatAvailability { showing_id, seats })
    }

    async fn acquire_holds(
        &self,
        showing_id: Uuid,
        seat_ids: Vec<Uuid>,
        holder: HolderId,
        ttl: Option<Duration>,
    ) -> Result<HoldOutcome, BookingError> {
        let seat_ids = Self::dedupe(seat_ids);
        if seat_ids.is_empty() {
            return Err(BookingError::NoSeatsSelected);
        }

        let lock = self.showing_lock(showing_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.default_hold_ttl);

        let mut state = self.state.lock().expect("engine state poisoned");
        {
            let record = state.showing(showing_id)?;
            if seat_ids.iter().any(|s| !record.plan.contains(s)) {
                return Err(BookingError::validation("seat_ids"));
            }
        }

        // Lazy sweep keeps the ledger tidy; correctness rests on the
        // expires_at filter below.
        state.holds.sweep_expired(now);

        // A user restarting checkout replaces their own holds instead of
        // conflicting with them.
        state.holds.release(showing_id, &holder);

        let booked = state.booked_seats(showing_id);
        let mut conflicts: Vec<Uuid> = state
            .holds
            .conflicts(showing_id, &seat_ids, &holder, now);
        conflicts.extend(seat_ids.iter().filter(|s| booked.contains(s)));
        conflicts.sort();
        conflicts.dedup();

        if !conflicts.is_empty() {
            debug!(%showing_id, ?conflicts, "hold acquisition rejected");
            return Ok(HoldOutcome::rejected(conflicts));
        }

        let expires_at = state.holds.insert(showing_id, &seat_ids, &holder, now, ttl);
        debug!(%showing_id, holder = %holder, seats = seat_ids.len(), "holds acquired");
        Ok(HoldOutcome::accepted(expires_at))
    }

    async fn release_holds(
        &self,
        showing_id: Uuid,
        holder: HolderId,
    ) -> Result<(), BookingError> {
        let mut state = self.state.lock().expect("engine state poisoned");
        let released = state.holds.release(showing_id, &holder);
        debug!(%showing_id, holder = %holder, released, "holds released");
        Ok(())
    }

    async fn finalize(&self, request: FinalizeRequest) -> Result<ConfirmedBooking, BookingError> {
        let seat_ids = Self::dedupe(request.seat_ids);
        if seat_ids.is_empty() {
            return Err(BookingError::NoSeatsSelected);
        }
        request.customer.validate()?;

        let lock = self.showing_lock(request.showing_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let mut state = self.state.lock().expect("engine state poisoned");

        // 1. Idempotency replay: a client retrying after a timeout gets the
        //    original booking back, never a second one.
        if let Some(key) = &request.idempotency_key {
            if let Some(existing_id) = state.by_idempotency.get(key) {
                let existing = state
                    .bookings
                    .get(existing_id)
                    .ok_or_else(|| BookingError::Storage("idempotency index desync".into()))?;
                return Ok(ConfirmedBooking {
                    booking_id: existing.id,
                    reference: existing.reference.clone(),
                    showing_id: existing.showing_id,
                    seats: existing.seats.clone(),
                    total_cents: existing.total_cents,
                    created_at: existing.created_at,
                });
            }
        }

        // 2. Price the selection against the catalog.
        let record = state.showing(request.showing_id)?;
        let quote = Quote::for_seats(&record.showing, &record.plan, &seat_ids)
            .map_err(|_| BookingError::validation("seat_ids"))?;

        // 3. Conflict set under the showing lock: seats claimed by any
        //    non-cancelled booking or by an active hold owned by someone else.
        let booked = state.booked_seats(request.showing_id);
        let holder = request.customer.holder().clone();
        let mut conflicts: Vec<Uuid> =
            state
                .holds
                .conflicts(request.showing_id, &seat_ids, &holder, now);
        conflicts.extend(seat_ids.iter().filter(|s| booked.contains(s)));
        conflicts.sort();
        conflicts.dedup();

        if !conflicts.is_empty() {
            debug!(showing_id = %request.showing_id, ?conflicts, "finalize lost the race");
            return Err(BookingError::SeatsUnavailable(conflicts));
        }

        // 4. Reference, then booking header + line items as one unit.
        let reference = state.next_reference(&self.reference_prefix, now.date_naive())?;
        let booking = Booking {
            id: Uuid::new_v4(),
            reference: reference.clone(),
            showing_id: request.showing_id,
            customer: request.customer,
            seats: quote
                .lines
                .iter()
                .map(|l| BookingSeat {
                    seat_id: l.seat_id,
                    price_cents: l.price_cents,
                })
                .collect(),
            total_cents: quote.total_cents,
            status: BookingStatus::Confirmed,
            created_at: now,
            cancelled_at: None,
            refund_cents: None,
            idempotency_key: request.idempotency_key.clone(),
        };

        let booking_id = booking.id;
        state
            .by_reference
            .insert(reference.as_str().to_string(), booking_id);
        if let Some(key) = request.idempotency_key {
            state.by_idempotency.insert(key, booking_id);
        }

        // 5. Holds are superseded by the booking; the uniqueness guarantee
        //    rests on the conflict check above, not on this cleanup.
        state.holds.release(request.showing_id, &holder);

        let confirmed = ConfirmedBooking {
            booking_id,
            reference,
            showing_id: booking.showing_id,
            seats: booking.seats.clone(),
            total_cents: booking.total_cents,
            created_at: booking.created_at,
        };
        state.bookings.insert(booking_id, booking);

        info!(%booking_id, reference = %confirmed.reference, total_cents = confirmed.total_cents, "booking confirmed");
        Ok(confirmed)
    }

    async fn cancel(
        &self,
        booking_id: Uuid,
        requester: HolderId,
        is_admin: bool,
    ) -> Result<CancelOutcome, BookingError> {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("engine state poisoned");

        let starts_at = {
            let booking = state
                .bookings
                .get(&booking_id)
                .ok_or(BookingError::BookingNotFound)?;

            if !is_admin && booking.customer.holder() != &requester {
                return Err(BookingError::NotAuthenticated);
            }
            if booking.status.is_cancelled() {
                return Err(BookingError::AlreadyCancelled);
            }

            state
                .showings
                .get(&booking.showing_id)
                .map(|r| r.showing.starts_at)
                .ok_or(BookingError::ShowingNotFound(booking.showing_id))?
        };

        let hours_until = (starts_at - now).num_milliseconds() as f64 / 3_600_000.0;

        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::BookingNotFound)?;
        let refund_cents = self.refund_policy.compute(booking.total_cents, hours_until);

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        booking.refund_cents = Some(refund_cents);
        let showing_id = booking.showing_id;
        let seat_ids = booking.seat_ids();

        info!(%booking_id, refund_cents, "booking cancelled");
        Ok(CancelOutcome {
            booking_id,
            showing_id,
            seat_ids,
            refund_cents,
        })
    }

    async fn find_by_reference(&self, code: &str) -> Result<BookingView, BookingError> {
        let reference = BookingReference::normalize(code);
        let state = self.state.lock().expect("engine state poisoned");

        let booking_id = state
            .by_reference
            .get(reference.as_str())
            .ok_or(BookingError::BookingNotFound)?;
        let booking = state
            .bookings
            .get(booking_id)
            .ok_or(BookingError::BookingNotFound)?;
        let starts_at = state
            .showings
            .get(&booking.showing_id)
            .map(|r| r.showing.starts_at)
            .ok_or(BookingError::ShowingNotFound(booking.showing_id))?;

        Ok(BookingView::project(booking, starts_at))
    }

    async fn bookings_for_holder(
        &self,
        holder: HolderId,
    ) -> Result<Vec<BookingView>, BookingError> {
        let state = self.state.lock().expect("engine state poisoned");

        let mut bookings: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|b| b.customer.holder() == &holder)
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        bookings
            .into_iter()
            .map(|b| {
                let starts_at = state
                    .showings
                    .get(&b.showing_id)
                    .map(|r| r.showing.starts_at)
                    .ok_or(BookingError::ShowingNotFound(b.showing_id))?;
                Ok(BookingView::project(b, starts_at))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Customer;
    use chrono::Utc;
    use marquee_catalog::SeatCategory;

    fn setup() -> (Arc<ManualClock>, BookingEngine, Showing, Vec<Uuid>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = BookingEngine::new(clock.clone());

        let screen_id = Uuid::new_v4();
        let showing = Showing::new(
            Uuid::new_v4(),
            screen_id,
            clock.now() + Duration::hours(48),
            1200,
        );
        let plan = SeatingPlan::grid(screen_id, 2, 3, SeatCategory::Regular);
        let seat_ids: Vec<Uuid> = plan.seats_ordered().iter().map(|s| s.id).collect();

        engine.register_showing(showing.clone(), plan);
        (clock, engine, showing, seat_ids)
    }

    fn account(id: &str) -> Customer {
        Customer::Account {
            holder: HolderId::new(id),
        }
    }

    #[tokio::test]
    async fn test_availability_reflects_holds_and_bookings() {
        let (_clock, engine, showing, seats) = setup();

        let initial = engine.availability(showing.id).await.unwrap();
        assert_eq!(initial.available_count(), 6);

        engine
            .acquire_holds(showing.id, vec![seats[0]], HolderId::new("u1"), None)
            .await
            .unwrap();

        engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[1]],
                customer: account("u2"),
                idempotency_key: None,
            })
            .await
            .unwrap();

        let after = engine.availability(showing.id).await.unwrap();
        assert!(!after.is_available(&seats[0]));
        assert!(!after.is_available(&seats[1]));
        assert_eq!(after.available_count(), 4);
    }

    #[tokio::test]
    async fn test_hold_blocks_foreign_finalize_until_expiry() {
        let (clock, engine, showing, seats) = setup();

        engine
            .acquire_holds(showing.id, vec![seats[0]], HolderId::new("u1"), None)
            .await
            .unwrap();

        let result = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[0]],
                customer: account("u2"),
                idempotency_key: None,
            })
            .await;
        assert!(
            matches!(result, Err(BookingError::SeatsUnavailable(ref s)) if s == &vec![seats[0]])
        );

        // Once the lease lapses the seat is claimable without any sweep.
        clock.advance(Duration::minutes(10));
        let result = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[0]],
                customer: account("u2"),
                idempotency_key: None,
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_holder_finalizes_through_own_hold() {
        let (_clock, engine, showing, seats) = setup();
        let holder = HolderId::new("u1");

        engine
            .acquire_holds(showing.id, vec![seats[0]], holder.clone(), None)
            .await
            .unwrap();

        let confirmed = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[0]],
                customer: account("u1"),
                idempotency_key: None,
            })
            .await
            .unwrap();
        assert!(confirmed.reference.is_well_formed("MQ"));

        // The hold was retired with the booking
        let state = engine.state.lock().unwrap();
        assert!(state
            .holds
            .active_seats(showing.id, _clock.now())
            .is_empty());
    }

    #[tokio::test]
    async fn test_hold_supersession() {
        let (clock, engine, showing, seats) = setup();
        let alice = HolderId::new("alice");
        let bob = HolderId::new("bob");

        let first = engine
            .acquire_holds(showing.id, vec![seats[0]], alice, None)
            .await
            .unwrap();
        assert!(first.accepted);

        let blocked = engine
            .acquire_holds(showing.id, vec![seats[0]], bob.clone(), None)
            .await
            .unwrap();
        assert!(!blocked.accepted);
        assert_eq!(blocked.conflicting_seats, vec![seats[0]]);

        clock.advance(Duration::minutes(10));
        let after_expiry = engine
            .acquire_holds(showing.id, vec![seats[0]], bob, None)
            .await
            .unwrap();
        assert!(after_expiry.accepted);
    }

    #[tokio::test]
    async fn test_self_reacquire_replaces_prior_hold() {
        let (_clock, engine, showing, seats) = setup();
        let holder = HolderId::new("u1");

        engine
            .acquire_holds(showing.id, vec![seats[0], seats[1]], holder.clone(), None)
            .await
            .unwrap();

        // Same holder re-running acquire must not conflict with itself
        let retry = engine
            .acquire_holds(showing.id, vec![seats[0], seats[2]], holder, None)
            .await
            .unwrap();
        assert!(retry.accepted);

        // The prior hold on seats[1] was released by the re-acquire
        let availability = engine.availability(showing.id).await.unwrap();
        assert!(availability.is_available(&seats[1]));
        assert!(!availability.is_available(&seats[0]));
        assert!(!availability.is_available(&seats[2]));
    }

    #[tokio::test]
    async fn test_all_or_nothing_acquire() {
        let (_clock, engine, showing, seats) = setup();

        engine
            .acquire_holds(showing.id, vec![seats[0]], HolderId::new("u1"), None)
            .await
            .unwrap();

        let outcome = engine
            .acquire_holds(
                showing.id,
                vec![seats[0], seats[1]],
                HolderId::new("u2"),
                None,
            )
            .await
            .unwrap();
        assert!(!outcome.accepted);

        // Partial holds create cleanup burden; none may exist
        let availability = engine.availability(showing.id).await.unwrap();
        assert!(availability.is_available(&seats[1]));
    }

    #[tokio::test]
    async fn test_cancel_computes_refund_once() {
        let (clock, engine, showing, seats) = setup();
        let holder = HolderId::new("u1");

        let confirmed = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[0]],
                customer: account("u1"),
                idempotency_key: None,
            })
            .await
            .unwrap();

        // 48h out under the default 24h window: full refund
        let outcome = engine
            .cancel(confirmed.booking_id, holder.clone(), false)
            .await
            .unwrap();
        assert_eq!(outcome.refund_cents, 1200);

        // Second cancel is a guard, not a recomputation
        clock.advance(Duration::hours(40));
        let again = engine.cancel(confirmed.booking_id, holder, false).await;
        assert!(matches!(again, Err(BookingError::AlreadyCancelled)));

        let booking = engine.booking(confirmed.booking_id).unwrap();
        assert_eq!(booking.refund_cents, Some(1200));

        // Cancelled seats return to the pool
        let availability = engine.availability(showing.id).await.unwrap();
        assert!(availability.is_available(&seats[0]));
    }

    #[tokio::test]
    async fn test_cancel_requires_ownership() {
        let (_clock, engine, showing, seats) = setup();

        let confirmed = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[0]],
                customer: account("u1"),
                idempotency_key: None,
            })
            .await
            .unwrap();

        let stranger = engine
            .cancel(confirmed.booking_id, HolderId::new("u2"), false)
            .await;
        assert!(matches!(stranger, Err(BookingError::NotAuthenticated)));

        // Admin override is allowed
        let admin = engine
            .cancel(confirmed.booking_id, HolderId::new("ops"), true)
            .await;
        assert!(admin.is_ok());
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let (_clock, engine, showing, seats) = setup();

        let confirmed = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![seats[0]],
                customer: Customer::Guest {
                    session: HolderId::new("sess-1"),
                    name: "Grace".into(),
                    email: "grace@example.com".into(),
                },
                idempotency_key: None,
            })
            .await
            .unwrap();

        let code = confirmed.reference.as_str().to_string();
        let lower = engine.find_by_reference(&code.to_lowercase()).await.unwrap();
        let upper = engine.find_by_reference(&code.to_uppercase()).await.unwrap();
        assert_eq!(lower.booking_id, upper.booking_id);
        assert_eq!(lower.customer_name.as_deref(), Some("Grace"));

        let missing = engine.find_by_reference("MQ20990101-ZZZZZZ").await;
        assert!(matches!(missing, Err(BookingError::BookingNotFound)));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (_clock, engine, showing, _seats) = setup();

        let empty = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![],
                customer: account("u1"),
                idempotency_key: None,
            })
            .await;
        assert!(matches!(empty, Err(BookingError::NoSeatsSelected)));

        let unknown_seat = engine
            .finalize(FinalizeRequest {
                showing_id: showing.id,
                seat_ids: vec![Uuid::new_v4()],
                customer: account("u1"),
                idempotency_key: None,
            })
            .await;
        assert!(matches!(
            unknown_seat,
            Err(BookingError::Validation { ref field }) if field == "seat_ids"
        ));

        let no_showing = engine.availability(Uuid::new_v4()).await;
        assert!(matches!(no_showing, Err(BookingError::ShowingNotFound(_))));
    }
}
