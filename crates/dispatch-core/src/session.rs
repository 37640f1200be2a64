//! Process-lifetime budget ledger.
//!
//! Mutated only by the dispatcher on a successful call. The ceiling is
//! enforced as a hard filter *before* dispatch (see `Policy::rank`); once a
//! handler has produced a result the external cost has already been
//! incurred regardless of our accounting, so `charge` never refuses.

use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStatus {
    pub total: Option<f64>,
    pub spent: f64,
    pub remaining: Option<f64>,
    pub utilization: Option<f64>,
}

#[derive(Debug, Default)]
struct Ledger {
    total_budget_usd: Option<f64>,
    spent_usd: f64,
}

#[derive(Debug)]
pub struct Session {
    ledger: RwLock<Ledger>,
}

impl Session {
    pub fn new(total_budget_usd: Option<f64>) -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                total_budget_usd,
                spent_usd: 0.0,
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Add `amount` (must be ≥ 0) to spend. Never refuses, even if this
    /// takes spend above the configured ceiling.
    pub fn charge(&self, amount: f64) {
        debug_assert!(amount >= 0.0, "charge amount must be non-negative");
        let mut ledger = self.ledger.write().expect("session lock poisoned");
        ledger.spent_usd += amount;
    }

    pub fn set_budget(&self, total_budget_usd: Option<f64>) {
        let mut ledger = self.ledger.write().expect("session lock poisoned");
        ledger.total_budget_usd = total_budget_usd;
    }

    pub fn reset(&self) {
        let mut ledger = self.ledger.write().expect("session lock poisoned");
        ledger.spent_usd = 0.0;
    }

    pub fn status(&self) -> SessionStatus {
        let ledger = self.ledger.read().expect("session lock poisoned");
        match ledger.total_budget_usd {
            Some(total) => SessionStatus {
                total: Some(total),
                spent: ledger.spent_usd,
                remaining: Some(total - ledger.spent_usd),
                utilization: if total > 0.0 {
                    Some(ledger.spent_usd / total)
                } else {
                    None
                },
            },
            None => SessionStatus {
                total: None,
                spent: ledger.spent_usd,
                remaining: None,
                utilization: None,
            },
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_session_has_no_ceiling() {
        let session = Session::unbounded();
        session.charge(5.0);
        let status = session.status();
        assert_eq!(status.total, None);
        assert_eq!(status.remaining, None);
        assert_eq!(status.spent, 5.0);
    }

    #[test]
    fn bounded_session_tracks_remaining_and_utilization() {
        let session = Session::new(Some(10.0));
        session.charge(2.5);
        let status = session.status();
        assert_eq!(status.total, Some(10.0));
        assert_eq!(status.spent, 2.5);
        assert_eq!(status.remaining, Some(7.5));
        assert_eq!(status.utilization, Some(0.25));
    }

    #[test]
    fn charge_past_the_ceiling_is_permitted() {
        let session = Session::new(Some(1.0));
        session.charge(5.0);
        let status = session.status();
        assert_eq!(status.spent, 5.0);
        assert_eq!(status.remaining, Some(-4.0));
    }

    #[test]
    fn reset_zeroes_spend_but_keeps_the_ceiling() {
        let session = Session::new(Some(10.0));
        session.charge(3.0);
        session.reset();
        let status = session.status();
        assert_eq!(status.spent, 0.0);
        assert_eq!(status.total, Some(10.0));
    }

    #[test]
    fn set_budget_can_clear_the_ceiling() {
        let session = Session::new(Some(10.0));
        session.set_budget(None);
        assert_eq!(session.status().total, None);
    }
}
