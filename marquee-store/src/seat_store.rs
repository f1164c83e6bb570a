use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marquee_booking::{
    Booking, BookingError, BookingReference, BookingSeat, BookingService, BookingStatus,
    BookingView, CancelOutcome, Clock, ConfirmedBooking, Customer, FinalizeRequest, HoldOutcome,
    HolderId, RefundPolicy, SeatAvailability, SeatStatus,
};
use marquee_catalog::SeatCategory;
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const REFERENCE_RETRY_LIMIT: usize = 32;

/// Postgres-backed implementation of the seat-state machine.
///
/// Mirrors the in-memory engine's observable semantics. Serialization per
/// showing uses a transaction-scoped advisory lock, so the lock always
/// releases with commit or rollback and is never held across external I/O.
/// Partial unique indexes on active booking seats and on holds are the
/// last-resort net should the lock ever be bypassed.
pub struct PgSeatStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    refund_policy: RefundPolicy,
    reference_prefix: String,
    default_hold_ttl: Duration,
}

#[derive(sqlx::FromRow)]
struct ShowingRow {
    id: Uuid,
    screen_id: Uuid,
    starts_at: DateTime<Utc>,
    base_price_cents: i32,
    #[allow(dead_code)]
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    row_label: String,
    seat_number: i32,
    category: String,
    price_multiplier: f64,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    reference: String,
    showing_id: Uuid,
    holder: String,
    guest_name: Option<String>,
    guest_email: Option<String>,
    total_cents: i32,
    status: String,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    refund_cents: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct BookingSeatRow {
    seat_id: Uuid,
    price_cents: i32,
}

impl PgSeatStore {
    pub fn new(
        pool: PgPool,
        clock: Arc<dyn Clock>,
        refund_policy: RefundPolicy,
        reference_prefix: &str,
        default_hold_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            clock,
            refund_policy,
            reference_prefix: reference_prefix.to_uppercase(),
            default_hold_ttl,
        }
    }

    /// Stable 64-bit advisory-lock key derived from the showing id.
    fn advisory_key(showing_id: Uuid) -> i64 {
        let bytes = showing_id.as_bytes();
        i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }

    async fn lock_showing(
        tx: &mut Transaction<'_, Postgres>,
        showing_id: Uuid,
    ) -> Result<(), BookingError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::advisory_key(showing_id))
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn fetch_showing(
        tx: &mut Transaction<'_, Postgres>,
        showing_id: Uuid,
    ) -> Result<ShowingRow, BookingError> {
        sqlx::query_as::<_, ShowingRow>(
            "SELECT id, screen_id, starts_at, base_price_cents, is_active
             FROM showings WHERE id = $1 AND is_active",
        )
        .bind(showing_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
        .ok_or(BookingError::ShowingNotFound(showing_id))
    }

    /// Requested seats already claimed by a non-cancelled booking or by an
    /// active hold owned by someone else. Must run under the advisory lock.
    async fn conflicting_seats(
        tx: &mut Transaction<'_, Postgres>,
        showing_id: Uuid,
        seat_ids: &[Uuid],
        holder: &HolderId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, BookingError> {
        let mut conflicts: Vec<Uuid> = sqlx::query_scalar(
            "SELECT seat_id FROM seat_holds
             WHERE showing_id = $1 AND seat_id = ANY($2)
               AND holder <> $3 AND expires_at > $4
             UNION
             SELECT seat_id FROM booking_seats
             WHERE showing_id = $1 AND seat_id = ANY($2)
               AND released_at IS NULL",
        )
        .bind(showing_id)
        .bind(seat_ids)
        .bind(holder.as_str())
        .bind(now)
        .fetch_all(&mut **tx)
        .await
        .map_err(storage)?;

        conflicts.sort();
        Ok(conflicts)
    }

    async fn validate_seats(
        tx: &mut Transaction<'_, Postgres>,
        screen_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<Vec<SeatRow>, BookingError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, row_label, seat_number, category, price_multiplier
             FROM seats WHERE screen_id = $1 AND id = ANY($2)",
        )
        .bind(screen_id)
        .bind(seat_ids)
        .fetch_all(&mut **tx)
        .await
        .map_err(storage)?;

        if rows.len() != seat_ids.len() {
            return Err(BookingError::validation("seat_ids"));
        }
        Ok(rows)
    }

    async fn next_reference(
        tx: &mut Transaction<'_, Postgres>,
        prefix: &str,
        on: chrono::NaiveDate,
    ) -> Result<BookingReference, BookingError> {
        for _ in 0..REFERENCE_RETRY_LIMIT {
            let candidate = {
                let mut rng = rand::thread_rng();
                BookingReference::generate(prefix, on, &mut rng)
            };
            let taken: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE reference = $1)")
                    .bind(candidate.as_str())
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(storage)?;
            if !taken {
                return Ok(candidate);
            }
        }
        Err(BookingError::Storage(
            "booking reference space exhausted".to_string(),
        ))
    }

    async fn booking_row(
        &self,
        row: BookingRow,
    ) -> Result<(Booking, DateTime<Utc>), BookingError> {
        let seats = sqlx::query_as::<_, BookingSeatRow>(
            "SELECT seat_id, price_cents FROM booking_seats WHERE booking_id = $1",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let starts_at: DateTime<Utc> =
            sqlx::query_scalar("SELECT starts_at FROM showings WHERE id = $1")
                .bind(row.showing_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?
                .ok_or(BookingError::ShowingNotFound(row.showing_id))?;

        Ok((assemble_booking(row, seats)?, starts_at))
    }

    /// The committed booking behind an already-used idempotency key,
    /// replayed as a confirmation.
    async fn replay_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<ConfirmedBooking, BookingError> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, reference, showing_id, holder, guest_name, guest_email,
                    total_cents, status, idempotency_key, created_at, cancelled_at,
                    refund_cents
             FROM bookings WHERE idempotency_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or_else(|| BookingError::Storage("idempotency index desync".to_string()))?;

        let (booking, _) = self.booking_row(row).await?;
        Ok(confirmed_view(&booking))
    }

    fn dedupe(seat_ids: Vec<Uuid>) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        seat_ids.into_iter().filter(|s| seen.insert(*s)).collect()
    }
}

fn storage(e: sqlx::Error) -> BookingError {
    BookingError::Storage(e.to_string())
}

fn violated_constraint(e: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db) = e {
        db.constraint().map(str::to_string)
    } else {
        None
    }
}

/// Recoverable unique violations on the bookings insert. A reference taken
/// by a concurrently committed booking gets a fresh code; an idempotency
/// key that lost its race replays the winner's booking. The advisory lock
/// only serializes one showing, so both races are reachable.
#[derive(Debug, PartialEq, Eq)]
enum BookingInsertConflict {
    ReferenceTaken,
    IdempotencyKeyTaken,
}

fn booking_insert_conflict(constraint: &str) -> Option<BookingInsertConflict> {
    match constraint {
        "bookings_reference_key" => Some(BookingInsertConflict::ReferenceTaken),
        "bookings_idempotency_key" => Some(BookingInsertConflict::IdempotencyKeyTaken),
        _ => None,
    }
}

fn confirmed_view(booking: &Booking) -> ConfirmedBooking {
    ConfirmedBooking {
        booking_id: booking.id,
        reference: booking.reference.clone(),
        showing_id: booking.showing_id,
        seats: booking.seats.clone(),
        total_cents: booking.total_cents,
        created_at: booking.created_at,
    }
}

fn parse_category(s: &str) -> SeatCategory {
    match s {
        "PREMIUM" => SeatCategory::Premium,
        "VIP" => SeatCategory::Vip,
        _ => SeatCategory::Regular,
    }
}

fn parse_status(s: &str) -> Result<BookingStatus, BookingError> {
    match s {
        "PENDING" => Ok(BookingStatus::Pending),
        "CONFIRMED" => Ok(BookingStatus::Confirmed),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        "REFUNDED" => Ok(BookingStatus::Refunded),
        other => Err(BookingError::Storage(format!(
            "unknown booking status: {other}"
        ))),
    }
}

fn assemble_booking(row: BookingRow, seats: Vec<BookingSeatRow>) -> Result<Booking, BookingError> {
    let customer = match row.guest_name {
        Some(name) => Customer::Guest {
            session: HolderId::new(row.holder),
            name,
            email: row.guest_email.unwrap_or_default(),
        },
        None => Customer::Account {
            holder: HolderId::new(row.holder),
        },
    };

    Ok(Booking {
        id: row.id,
        reference: BookingReference::normalize(&row.reference),
        showing_id: row.showing_id,
        customer,
        seats: seats
            .into_iter()
            .map(|s| BookingSeat {
                seat_id: s.seat_id,
                price_cents: s.price_cents,
            })
            .collect(),
        total_cents: row.total_cents,
        status: parse_status(&row.status)?,
        created_at: row.created_at,
        cancelled_at: row.cancelled_at,
        refund_cents: row.refund_cents,
        idempotency_key: row.idempotency_key,
    })
}

#[async_trait]
impl BookingService for PgSeatStore {
    async fn availability(&self, showing_id: Uuid) -> Result<SeatAvailability, BookingError> {
        let now = self.clock.now();

        let showing = sqlx::query_as::<_, ShowingRow>(
            "SELECT id, screen_id, starts_at, base_price_cents, is_active
             FROM showings WHERE id = $1 AND is_active",
        )
        .bind(showing_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or(BookingError::ShowingNotFound(showing_id))?;

        let seats = sqlx::query_as::<_, SeatRow>(
            "SELECT id, row_label, seat_number, category, price_multiplier
             FROM seats WHERE screen_id = $1
             ORDER BY row_label, seat_number",
        )
        .bind(showing.screen_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let booked: HashSet<Uuid> = sqlx::query_scalar(
            "SELECT seat_id FROM booking_seats
             WHERE showing_id = $1 AND released_at IS NULL",
        )
        .bind(showing_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?
        .into_iter()
        .collect();

        let held: HashSet<Uuid> = sqlx::query_scalar(
            "SELECT seat_id FROM seat_holds
             WHERE showing_id = $1 AND expires_at > $2",
        )
        .bind(showing_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?
        .into_iter()
        .collect();

        let seats = seats
            .into_iter()
            .map(|seat| SeatStatus {
                seat_id: seat.id,
                row: seat.row_label,
                number: seat.seat_number,
                category: parse_category(&seat.category),
                price_cents: (showing.base_price_cents as f64 * seat.price_multiplier).round()
                    as i32,
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

        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.default_hold_ttl);
        let expires_at = now + ttl;

        let mut tx = self.pool.begin().await.map_err(storage)?;

        // 1. Serialize against other acquire/finalize calls for this showing
        Self::lock_showing(&mut tx, showing_id).await?;
        let showing = Self::fetch_showing(&mut tx, showing_id).await?;
        Self::validate_seats(&mut tx, showing.screen_id, &seat_ids).await?;

        // 2. Lazy sweep of lapsed leases; correctness rests on the
        //    expires_at filter, this just keeps the table tidy
        sqlx::query("DELETE FROM seat_holds WHERE showing_id = $1 AND expires_at <= $2")
            .bind(showing_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        // 3. A holder restarting checkout replaces their own prior holds
        sqlx::query("DELETE FROM seat_holds WHERE showing_id = $1 AND holder = $2")
            .bind(showing_id)
            .bind(holder.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        // 4. All-or-nothing conflict check
        let conflicts =
            Self::conflicting_seats(&mut tx, showing_id, &seat_ids, &holder, now).await?;
        if !conflicts.is_empty() {
            // Rejection still commits: the sweep and the release of this
            // holder's prior holds are part of acquire's contract
            tx.commit().await.map_err(storage)?;
            debug!(%showing_id, ?conflicts, "hold acquisition rejected");
            return Ok(HoldOutcome::rejected(conflicts));
        }

        for seat_id in &seat_ids {
            sqlx::query(
                "INSERT INTO seat_holds (showing_id, seat_id, holder, created_at, expires_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(showing_id)
            .bind(seat_id)
            .bind(holder.as_str())
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        debug!(%showing_id, holder = %holder, seats = seat_ids.len(), "holds acquired");
        Ok(HoldOutcome::accepted(expires_at))
    }

    async fn release_holds(
        &self,
        showing_id: Uuid,
        holder: HolderId,
    ) -> Result<(), BookingError> {
        sqlx::query("DELETE FROM seat_holds WHERE showing_id = $1 AND holder = $2")
            .bind(showing_id)
            .bind(holder.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn finalize(&self, request: FinalizeRequest) -> Result<ConfirmedBooking, BookingError> {
        let seat_ids = Self::dedupe(request.seat_ids);
        if seat_ids.is_empty() {
            return Err(BookingError::NoSeatsSelected);
        }
        request.customer.validate()?;

        let now = self.clock.now();
        let holder = request.customer.holder().clone();

        let mut tx = self.pool.begin().await.map_err(storage)?;

        // 1. Serialization point: concurrent finalize calls for the same
        //    showing cannot interleave their read-then-write steps
        Self::lock_showing(&mut tx, request.showing_id).await?;

        // 2. Idempotency replay inside the lock so a retry storm still
        //    produces exactly one booking
        if let Some(key) = &request.idempotency_key {
            let existing = sqlx::query_as::<_, BookingRow>(
                "SELECT id, reference, showing_id, holder, guest_name, guest_email,
                        total_cents, status, idempotency_key, created_at, cancelled_at,
                        refund_cents
                 FROM bookings WHERE idempotency_key = $1",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;

            if let Some(row) = existing {
                tx.rollback().await.map_err(storage)?;
                let (booking, _) = self.booking_row(row).await?;
                return Ok(confirmed_view(&booking));
            }
        }

        // 3. Price the selection server-side
        let showing = Self::fetch_showing(&mut tx, request.showing_id).await?;
        let seat_rows = Self::validate_seats(&mut tx, showing.screen_id, &seat_ids).await?;
        let priced: Vec<BookingSeat> = seat_rows
            .iter()
            .map(|s| BookingSeat {
                seat_id: s.id,
                price_cents: (showing.base_price_cents as f64 * s.price_multiplier).round() as i32,
            })
            .collect();
        let total_cents: i32 = priced.iter().map(|s| s.price_cents).sum();

        // 4. Conflict check under the lock
        let conflicts =
            Self::conflicting_seats(&mut tx, request.showing_id, &seat_ids, &holder, now).await?;
        if !conflicts.is_empty() {
            debug!(showing_id = %request.showing_id, ?conflicts, "finalize lost the race");
            return Err(BookingError::SeatsUnavailable(conflicts));
        }

        // 5. Header + line items as one unit; rollback on any failure. The
        //    advisory lock only serializes this showing, so a reference used
        //    by a concurrently committed booking or an idempotency key raced
        //    from another showing can still trip the unique indexes here.
        //    Each attempt runs in a savepoint since a violation aborts the
        //    enclosing transaction.
        let booking_id = Uuid::new_v4();
        let mut reference =
            Self::next_reference(&mut tx, &self.reference_prefix, now.date_naive()).await?;
        let mut attempts = 0;
        loop {
            let mut sp = tx.begin().await.map_err(storage)?;
            let inserted = sqlx::query(
                "INSERT INTO bookings (id, reference, showing_id, holder, guest_name, guest_email,
                                       total_cents, status, idempotency_key, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, 'CONFIRMED', $8, $9)",
            )
            .bind(booking_id)
            .bind(reference.as_str())
            .bind(request.showing_id)
            .bind(holder.as_str())
            .bind(request.customer.guest_name())
            .bind(request.customer.contact_email())
            .bind(total_cents)
            .bind(&request.idempotency_key)
            .bind(now)
            .execute(&mut *sp)
            .await;

            match inserted {
                Ok(_) => {
                    sp.commit().await.map_err(storage)?;
                    break;
                }
                Err(e) => {
                    sp.rollback().await.map_err(storage)?;
                    match violated_constraint(&e)
                        .as_deref()
                        .and_then(booking_insert_conflict)
                    {
                        Some(BookingInsertConflict::ReferenceTaken)
                            if attempts < REFERENCE_RETRY_LIMIT =>
                        {
                            attempts += 1;
                            reference = Self::next_reference(
                                &mut tx,
                                &self.reference_prefix,
                                now.date_naive(),
                            )
                            .await?;
                        }
                        Some(BookingInsertConflict::ReferenceTaken) => {
                            return Err(BookingError::Storage(
                                "booking reference space exhausted".to_string(),
                            ));
                        }
                        Some(BookingInsertConflict::IdempotencyKeyTaken) => {
                            // Another request with this key committed first;
                            // hand back its booking instead of a 500
                            tx.rollback().await.map_err(storage)?;
                            let Some(key) = request.idempotency_key.as_deref() else {
                                return Err(storage(e));
                            };
                            return self.replay_by_idempotency_key(key).await;
                        }
                        None => return Err(storage(e)),
                    }
                }
            }
        }

        for seat in &priced {
            let inserted = sqlx::query(
                "INSERT INTO booking_seats (booking_id, showing_id, seat_id, price_cents)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(booking_id)
            .bind(request.showing_id)
            .bind(seat.seat_id)
            .bind(seat.price_cents)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                // The partial unique index caught a claim the lock did not
                // serialize against; surface it as the conflict it is.
                if violated_constraint(&e).as_deref() == Some("booking_seats_active_key") {
                    warn!(showing_id = %request.showing_id, seat_id = %seat.seat_id,
                          "active-seat index rejected insert outside the advisory lock");
                    return Err(BookingError::SeatsUnavailable(vec![seat.seat_id]));
                }
                return Err(storage(e));
            }
        }

        // 6. Holds are superseded by the booking
        sqlx::query("DELETE FROM seat_holds WHERE showing_id = $1 AND holder = $2")
            .bind(request.showing_id)
            .bind(holder.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        info!(%booking_id, reference = %reference, total_cents, "booking confirmed");
        Ok(ConfirmedBooking {
            booking_id,
            reference,
            showing_id: request.showing_id,
            seats: priced,
            total_cents,
            created_at: now,
        })
    }

    async fn cancel(
        &self,
        booking_id: Uuid,
        requester: HolderId,
        is_admin: bool,
    ) -> Result<CancelOutcome, BookingError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, reference, showing_id, holder, guest_name, guest_email,
                    total_cents, status, idempotency_key, created_at, cancelled_at,
                    refund_cents
             FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .ok_or(BookingError::BookingNotFound)?;

        if !is_admin && row.holder != requester.as_str() {
            return Err(BookingError::NotAuthenticated);
        }
        if parse_status(&row.status)?.is_cancelled() {
            return Err(BookingError::AlreadyCancelled);
        }

        let starts_at: DateTime<Utc> =
            sqlx::query_scalar("SELECT starts_at FROM showings WHERE id = $1")
                .bind(row.showing_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?
                .ok_or(BookingError::ShowingNotFound(row.showing_id))?;

        let hours_until = (starts_at - now).num_milliseconds() as f64 / 3_600_000.0;
        let refund_cents = self.refund_policy.compute(row.total_cents, hours_until);

        sqlx::query(
            "UPDATE bookings
             SET status = 'CANCELLED', cancelled_at = $1, refund_cents = $2
             WHERE id = $3",
        )
        .bind(now)
        .bind(refund_cents)
        .bind(booking_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        // Free the seats in the partial index; the rows stay for audit
        let seat_ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE booking_seats SET released_at = $1 WHERE booking_id = $2
             RETURNING seat_id",
        )
        .bind(now)
        .bind(booking_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        info!(%booking_id, refund_cents, "booking cancelled");
        Ok(CancelOutcome {
            booking_id,
            showing_id: row.showing_id,
            seat_ids,
            refund_cents,
        })
    }

    async fn find_by_reference(&self, code: &str) -> Result<BookingView, BookingError> {
        let reference = BookingReference::normalize(code);

        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, reference, showing_id, holder, guest_name, guest_email,
                    total_cents, status, idempotency_key, created_at, cancelled_at,
                    refund_cents
             FROM bookings WHERE reference = $1",
        )
        .bind(reference.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or(BookingError::BookingNotFound)?;

        let (booking, starts_at) = self.booking_row(row).await?;
        Ok(BookingView::project(&booking, starts_at))
    }

    async fn bookings_for_holder(
        &self,
        holder: HolderId,
    ) -> Result<Vec<BookingView>, BookingError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            "SELECT id, reference, showing_id, holder, guest_name, guest_email,
                    total_cents, status, idempotency_key, created_at, cancelled_at,
                    refund_cents
             FROM bookings WHERE holder = $1
             ORDER BY created_at DESC",
        )
        .bind(holder.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let (booking, starts_at) = self.booking_row(row).await?;
            views.push(BookingView::project(&booking, starts_at));
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_key_is_stable() {
        let id = Uuid::new_v4();
        assert_eq!(PgSeatStore::advisory_key(id), PgSeatStore::advisory_key(id));
        assert_ne!(
            PgSeatStore::advisory_key(id),
            PgSeatStore::advisory_key(Uuid::new_v4())
        );
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(parse_category("VIP"), SeatCategory::Vip);
        assert_eq!(parse_category("PREMIUM"), SeatCategory::Premium);
        assert_eq!(parse_category("REGULAR"), SeatCategory::Regular);
        // Unknown categories fall back rather than failing a seat map
        assert_eq!(parse_category("???"), SeatCategory::Regular);
    }

    #[test]
    fn test_booking_insert_conflict_recovery_mapping() {
        assert_eq!(
            booking_insert_conflict("bookings_reference_key"),
            Some(BookingInsertConflict::ReferenceTaken)
        );
        assert_eq!(
            booking_insert_conflict("bookings_idempotency_key"),
            Some(BookingInsertConflict::IdempotencyKeyTaken)
        );
        // Anything else is not recoverable at the bookings insert
        assert_eq!(booking_insert_conflict("booking_seats_active_key"), None);
        assert_eq!(booking_insert_conflict("bookings_pkey"), None);
    }

    #[test]
    fn test_status_parsing() {
        assert!(matches!(
            parse_status("CONFIRMED"),
            Ok(BookingStatus::Confirmed)
        ));
        assert!(matches!(
            parse_status("CANCELLED"),
            Ok(BookingStatus::Cancelled)
        ));
        assert!(parse_status("BOGUS").is_err());
    }
}
