use serde::{Deserialize, Serialize};

/// Refund rules applied on cancellation. A deployment picks one policy per
/// booking type via configuration; both variants share the same total
/// function so neither needs a separate code path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RefundPolicy {
    /// Full refund when cancelling at least `full_refund_hours` before the
    /// showing (inclusive boundary), otherwise nothing.
    TimeWindow { full_refund_hours: f64 },
    /// Fixed percentage back regardless of timing; the remainder is the
    /// cancellation fee.
    FlatRate { refund_percent: u32 },
}

impl RefundPolicy {
    /// Refund amount in cents. Total over its domain: zero or negative
    /// hours-until-showing means the show already started or passed and is
    /// a valid input.
    pub fn compute(&self, total_cents: i32, hours_until_showing: f64) -> i32 {
        match self {
            RefundPolicy::TimeWindow { full_refund_hours } => {
                if hours_until_showing >= *full_refund_hours {
                    total_cents
                } else {
                    0
                }
            }
            RefundPolicy::FlatRate { refund_percent } => {
                let percent = (*refund_percent).min(100) as i64;
                ((total_cents as i64 * percent) / 100) as i32
            }
        }
    }
}

impl Default for RefundPolicy {
    fn default() -> Self {
        RefundPolicy::TimeWindow {
            full_refund_hours: 24.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_boundary_is_inclusive() {
        let policy = RefundPolicy::TimeWindow {
            full_refund_hours: 24.0,
        };
        assert_eq!(policy.compute(1000, 24.0), 1000);
        assert_eq!(policy.compute(1000, 23.999), 0);
        assert_eq!(policy.compute(1000, 48.0), 1000);
    }

    #[test]
    fn test_time_window_past_showing() {
        let policy = RefundPolicy::default();
        assert_eq!(policy.compute(1000, 0.0), 0);
        assert_eq!(policy.compute(1000, -3.5), 0);
    }

    #[test]
    fn test_flat_rate_ignores_timing() {
        let policy = RefundPolicy::FlatRate { refund_percent: 50 };
        assert_eq!(policy.compute(1000, 100.0), 500);
        assert_eq!(policy.compute(1000, -1.0), 500);
        assert_eq!(policy.compute(999, 50.0), 499);
    }

    #[test]
    fn test_flat_rate_clamps_percent() {
        let policy = RefundPolicy::FlatRate {
            refund_percent: 150,
        };
        assert_eq!(policy.compute(1000, 1.0), 1000);
    }
}
