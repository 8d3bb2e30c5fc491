//! Entry ledger — the current round's entrants and pooled stake.
//!
//! The ledger is owned by the state machine in `engine`; only the state
//! machine may freeze or reset it. Entry order is preserved and duplicate
//! addresses are allowed, so winner selection by index gives an address
//! entering k times exactly k/n of the probability mass.

use crate::types::{Address, Amount, Round, RoundState, Timestamp};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    /// Attached value below the entrance fee. Retriable with the right fee.
    #[error("attached value {got} below entrance fee {need}")]
    FeeTooLow { got: Amount, need: Amount },
    /// The round is resolving; no new entries until it reopens.
    #[error("round is not open for entry")]
    RoundNotOpen,
}

#[derive(Debug)]
pub struct EntryLedger {
    entrance_fee: Amount,
    round: Round,
}

impl EntryLedger {
    pub fn new(entrance_fee: Amount, now: Timestamp) -> Self {
        Self {
            entrance_fee,
            round: Round::new(now),
        }
    }

    /// Record an entry. Fails without mutating anything.
    ///
    /// Overpayment is accepted (the treasury pools the full attached
    /// value) but only one `entrance_fee` of stake is credited, keeping
    /// `stake_total == entrance_fee * entrants.len()`.
    pub fn enter(&mut self, from: Address, value: Amount) -> Result<(), EntryError> {
        if self.round.state != RoundState::Open {
            return Err(EntryError::RoundNotOpen);
        }
        if value < self.entrance_fee {
            return Err(EntryError::FeeTooLow {
                got: value,
                need: self.entrance_fee,
            });
        }
        self.round.entrants.push(from);
        self.round.stake_total += self.entrance_fee;
        Ok(())
    }

    /// Immutable copy of the live round.
    pub fn snapshot(&self) -> Round {
        self.round.clone()
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn state(&self) -> RoundState {
        self.round.state
    }

    pub fn entrant_count(&self) -> usize {
        self.round.entrants.len()
    }

    pub fn stake_total(&self) -> Amount {
        self.round.stake_total
    }

    pub fn player(&self, index: usize) -> Option<Address> {
        self.round.entrants.get(index).copied()
    }

    pub fn opened_at(&self) -> Timestamp {
        self.round.opened_at
    }

    /// Stop accepting entries while the round resolves.
    pub(crate) fn freeze(&mut self) {
        self.round.state = RoundState::Closing;
    }

    /// Clear entrants and stake and open a fresh round.
    /// Called only after a successful payout.
    pub(crate) fn reopen(&mut self, now: Timestamp) {
        self.round = Round::new(now);
    }
}
