use crate::models::{Hold, HolderId};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// In-memory soft-reservation ledger, keyed by (showing, seat).
///
/// At most one entry exists per (showing, seat); expired entries may linger
/// until swept, so every read filters by `expires_at > now`. Expiry needs no
/// background process to be effective — readers simply stop counting stale
/// holds.
#[derive(Debug, Default)]
pub struct HoldLedger {
    holds: HashMap<(Uuid, Uuid), Hold>,
}

impl HoldLedger {
    pub fn new() -> Self {
        Self {
            holds: HashMap::new(),
        }
    }

    /// Seats of a showing currently claimed by an active hold.
    pub fn active_seats(&self, showing_id: Uuid, now: DateTime<Utc>) -> HashSet<Uuid> {
        self.holds
            .values()
            .filter(|h| h.showing_id == showing_id && h.is_active(now))
            .map(|h| h.seat_id)
            .collect()
    }

    /// Requested seats that conflict with an active hold owned by someone
    /// else. A holder never conflicts with their own holds.
    pub fn conflicts(
        &self,
        showing_id: Uuid,
        seat_ids: &[Uuid],
        holder: &HolderId,
        now: DateTime<Utc>,
    ) -> Vec<Uuid> {
        seat_ids
            .iter()
            .filter(|seat_id| {
                self.holds
                    .get(&(showing_id, **seat_id))
                    .map(|h| h.is_active(now) && h.holder != *holder)
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    /// Insert one hold per seat. The caller has already checked conflicts
    /// under the showing's serialization point.
    pub fn insert(
        &mut self,
        showing_id: Uuid,
        seat_ids: &[Uuid],
        holder: &HolderId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> DateTime<Utc> {
        let expires_at = now + ttl;
        for seat_id in seat_ids {
            self.holds.insert(
                (showing_id, *seat_id),
                Hold {
                    showing_id,
                    seat_id: *seat_id,
                    holder: holder.clone(),
                    created_at: now,
                    expires_at,
                },
            );
        }
        expires_at
    }

    /// Drop every hold this holder has on the showing. Idempotent.
    pub fn release(&mut self, showing_id: Uuid, holder: &HolderId) -> usize {
        let before = self.holds.len();
        self.holds
            .retain(|_, h| !(h.showing_id == showing_id && h.holder == *holder));
        before - self.holds.len()
    }

    /// Hygiene only: drop rows whose lease has lapsed. Correctness never
    /// depends on this running.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.holds.len();
        self.holds.retain(|_, h| h.is_active(now));
        before - self.holds.len()
    }

    pub fn get(&self, showing_id: Uuid, seat_id: Uuid) -> Option<&Hold> {
        self.holds.get(&(showing_id, seat_id))
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_hold(holder: &HolderId) -> (HoldLedger, Uuid, Uuid, DateTime<Utc>) {
        let mut ledger = HoldLedger::new();
        let showing_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();
        let now = Utc::now();
        ledger.insert(showing_id, &[seat_id], holder, now, Duration::minutes(10));
        (ledger, showing_id, seat_id, now)
    }

    #[test]
    fn test_foreign_hold_conflicts() {
        let alice = HolderId::new("alice");
        let bob = HolderId::new("bob");
        let (ledger, showing_id, seat_id, now) = ledger_with_hold(&alice);

        let conflicts = ledger.conflicts(showing_id, &[seat_id], &bob, now);
        assert_eq!(conflicts, vec![seat_id]);
    }

    #[test]
    fn test_own_hold_is_exempt() {
        let alice = HolderId::new("alice");
        let (ledger, showing_id, seat_id, now) = ledger_with_hold(&alice);

        let conflicts = ledger.conflicts(showing_id, &[seat_id], &alice, now);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_expired_hold_stops_counting() {
        let alice = HolderId::new("alice");
        let bob = HolderId::new("bob");
        let (ledger, showing_id, seat_id, now) = ledger_with_hold(&alice);

        let later = now + Duration::minutes(10);
        assert!(ledger.conflicts(showing_id, &[seat_id], &bob, later).is_empty());
        assert!(ledger.active_seats(showing_id, later).is_empty());

        // The stale row still lingers until swept
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let alice = HolderId::new("alice");
        let (mut ledger, showing_id, _, _) = ledger_with_hold(&alice);

        assert_eq!(ledger.release(showing_id, &alice), 1);
        assert_eq!(ledger.release(showing_id, &alice), 0);
    }

    #[test]
    fn test_sweep_only_removes_expired() {
        let alice = HolderId::new("alice");
        let (mut ledger, showing_id, _, now) = ledger_with_hold(&alice);
        ledger.insert(
            showing_id,
            &[Uuid::new_v4()],
            &HolderId::new("bob"),
            now + Duration::minutes(5),
            Duration::minutes(10),
        );

        let swept = ledger.sweep_expired(now + Duration::minutes(11));
        assert_eq!(swept, 1);
        assert_eq!(ledger.len(), 1);
    }
}
