//! Upkeep eligibility — the pure predicate behind the automation trigger.
//!
//! External automation polls [`needs_upkeep`] (a dry run with no side
//! effects) and, when true, invokes the real trigger on the state machine.
//! The predicate is `is_open && interval_elapsed && has_stake &&
//! has_entrants && has_funding`.

use crate::types::{Round, RoundState, Timestamp};
use serde::{Deserialize, Serialize};

/// Per-leg breakdown of the upkeep predicate, for dry-run diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepCheck {
    /// Round is accepting entrants (not mid-resolution).
    pub is_open: bool,
    /// At least `min_interval` seconds since the round opened.
    pub interval_elapsed: bool,
    /// Pooled stake is non-zero.
    pub has_stake: bool,
    /// At least one entrant to draw from.
    pub has_entrants: bool,
    /// The provider subscription can pay for a request.
    pub has_funding: bool,
}

impl UpkeepCheck {
    pub fn upkeep_needed(&self) -> bool {
        self.is_open
            && self.interval_elapsed
            && self.has_stake
            && self.has_entrants
            && self.has_funding
    }
}

/// Evaluate every leg of the predicate. Read-only.
pub fn evaluate(
    round: &Round,
    now: Timestamp,
    has_funding: bool,
    min_interval: u64,
) -> UpkeepCheck {
    UpkeepCheck {
        is_open: round.state == RoundState::Open,
        interval_elapsed: now.saturating_sub(round.opened_at) >= min_interval,
        has_stake: round.stake_total > 0,
        has_entrants: !round.entrants.is_empty(),
        has_funding,
    }
}

/// True when the round is eligible to close.
pub fn needs_upkeep(
    round: &Round,
    now: Timestamp,
    has_funding: bool,
    min_interval: u64,
) -> bool {
    evaluate(round, now, has_funding, min_interval).upkeep_needed()
}
