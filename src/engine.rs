// Copyright (c) 2025-2026 The Raffle developers
// Distributed under the MIT software license.

//! Raffle state machine — orchestrates entry, close, and fulfillment.
//!
//! All three mutating entry points ([`Raffle::enter`],
//! [`Raffle::perform_upkeep`], [`Raffle::fulfill_randomness`]) take
//! `&mut self`, so serialization is enforced by ownership: whoever holds
//! the `Raffle` holds the round. The `service` module wraps it in a
//! single task for async callers.
//!
//! # Fail-closed payout
//!
//! If the winner's transfer is rejected, the round stays `Closing` with
//! its entrants and stake intact and no `WinnerPicked` is emitted. There
//! is no automated retry; recovery is an operator action. Funds are
//! never double-paid: the randomness request is consumed before payout,
//! so a redelivered callback cannot trigger a second transfer.

use crate::config::RaffleConfig;
use crate::ledger::{EntryError, EntryLedger};
use crate::oracle::{OracleError, RandomnessClient, RandomnessProvider, RequestContext};
use crate::payout::{PayoutError, Transfer, Treasury};
use crate::types::{Address, Amount, RequestId, Round, RoundState, Timestamp};
use crate::upkeep::{self, UpkeepCheck};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RaffleError {
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Payout(#[from] PayoutError),
    /// The round is not eligible to close yet. The caller should wait.
    #[error("upkeep not needed (state={state}, stake={stake}, entrants={entrants})")]
    UpkeepNotNeeded {
        state: RoundState,
        stake: Amount,
        entrants: usize,
    },
    /// Close was triggered while a previous close is still resolving.
    #[error("round is already closing")]
    AlreadyClosing,
    /// Fulfillment arrived while no round is awaiting one.
    #[error("no round is awaiting randomness fulfillment")]
    NotClosing,
}

/// Externally observable signals. Everything else is a direct query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaffleEvent {
    EntryRecorded(Address),
    ClosingRequested(RequestId),
    WinnerPicked(Address),
}

/// Point-in-time snapshot of the raffle for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleStatus {
    pub state: RoundState,
    pub entrant_count: usize,
    pub stake_total: Amount,
    pub opened_at: Timestamp,
    pub recent_winner: Option<Address>,
    pub outstanding_request: Option<RequestId>,
}

pub struct Raffle {
    config: RaffleConfig,
    ledger: EntryLedger,
    oracle: RandomnessClient,
    treasury: Treasury,
    recent_winner: Option<Address>,
    events: UnboundedSender<RaffleEvent>,
}

impl Raffle {
    /// Build a raffle with an empty open round stamped at `now`.
    /// Returns the receiving end of the event stream alongside it.
    pub fn new(
        config: RaffleConfig,
        provider: Box<dyn RandomnessProvider>,
        transport: Box<dyn Transfer>,
        now: Timestamp,
    ) -> (Self, UnboundedReceiver<RaffleEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let raffle = Self {
            ledger: EntryLedger::new(config.entrance_fee, now),
            oracle: RandomnessClient::new(provider),
            treasury: Treasury::new(transport),
            recent_winner: None,
            events,
            config,
        };
        (raffle, event_rx)
    }

    fn emit(&self, event: RaffleEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }

    /// Record a paid entry in the current round.
    pub fn enter(&mut self, from: Address, value: Amount) -> Result<(), RaffleError> {
        self.ledger.enter(from, value)?;
        self.treasury.deposit(value);
        info!("entry recorded: {} (stake {})", from, self.ledger.stake_total());
        self.emit(RaffleEvent::EntryRecorded(from));
        Ok(())
    }

    /// Dry-run eligibility check for external automation. Read-only.
    pub fn check_upkeep(&self, now: Timestamp) -> UpkeepCheck {
        upkeep::evaluate(
            self.ledger.round(),
            now,
            self.oracle.is_funded(),
            self.config.interval,
        )
    }

    /// Close the round and request randomness.
    ///
    /// The request is placed before the ledger is frozen, so a provider
    /// failure leaves the round open and the trigger retriable. Once
    /// this returns `Ok`, no further entries are accepted until the
    /// matching fulfillment resolves the round.
    pub fn perform_upkeep(&mut self, now: Timestamp) -> Result<RequestId, RaffleError> {
        if self.ledger.state() == RoundState::Closing {
            return Err(RaffleError::AlreadyClosing);
        }
        let check = self.check_upkeep(now);
        if !check.upkeep_needed() {
            return Err(RaffleError::UpkeepNotNeeded {
                state: self.ledger.state(),
                stake: self.ledger.stake_total(),
                entrants: self.ledger.entrant_count(),
            });
        }

        let ctx = RequestContext::from_config(&self.config);
        let id = self.oracle.request(&ctx, self.ledger.opened_at())?;
        self.ledger.freeze();
        info!(
            "round closing: {} entrants, stake {}, request {}",
            self.ledger.entrant_count(),
            self.ledger.stake_total(),
            id
        );
        self.emit(RaffleEvent::ClosingRequested(id));
        Ok(id)
    }

    /// Resolve the round with the provider's random value.
    ///
    /// The correlation and duplicate-delivery gate runs before any round
    /// state is touched: an unknown or already consumed id is rejected
    /// without affecting the round. The winner is
    /// `entrants[random_value % n]` — deterministic given the frozen
    /// entrant list and the value.
    ///
    /// On payout failure the round stays `Closing` with stake and
    /// entrants intact. Recovery is operational, not automated.
    pub fn fulfill_randomness(
        &mut self,
        request_id: RequestId,
        random_value: u64,
        now: Timestamp,
    ) -> Result<Address, RaffleError> {
        self.oracle.confirm(request_id)?;
        if self.ledger.state() != RoundState::Closing {
            // Cannot happen while requests are only issued by
            // perform_upkeep, but a consumed id must never resolve an
            // open round.
            return Err(RaffleError::NotClosing);
        }

        let round = self.ledger.round();
        // Entrants were non-empty when the request was issued and the
        // ledger has been frozen since.
        let n = round.entrants.len() as u64;
        let winner = round.entrants[(random_value % n) as usize];
        let prize = round.stake_total;

        if let Err(e) = self.treasury.pay(winner, prize) {
            error!(
                "payout of {} to {} failed: {}; round stays closed for operator recovery",
                prize, winner, e
            );
            return Err(e.into());
        }

        self.ledger.reopen(now);
        self.recent_winner = Some(winner);
        info!("winner picked: {} (prize {})", winner, prize);
        self.emit(RaffleEvent::WinnerPicked(winner));
        Ok(winner)
    }

    // Query surface.

    pub fn state(&self) -> RoundState {
        self.ledger.state()
    }

    pub fn entrance_fee(&self) -> Amount {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn player(&self, index: usize) -> Option<Address> {
        self.ledger.player(index)
    }

    pub fn entrant_count(&self) -> usize {
        self.ledger.entrant_count()
    }

    pub fn stake_total(&self) -> Amount {
        self.ledger.stake_total()
    }

    /// Pooled balance held by the treasury. May exceed `stake_total`
    /// when entrants overpaid the fee.
    pub fn pool(&self) -> Amount {
        self.treasury.pool()
    }

    pub fn recent_winner(&self) -> Option<Address> {
        self.recent_winner
    }

    /// When the live round opened (reset on every payout).
    pub fn last_timestamp(&self) -> Timestamp {
        self.ledger.opened_at()
    }

    pub fn snapshot(&self) -> Round {
        self.ledger.snapshot()
    }

    pub fn status(&self) -> RaffleStatus {
        RaffleStatus {
            state: self.ledger.state(),
            entrant_count: self.ledger.entrant_count(),
            stake_total: self.ledger.stake_total(),
            opened_at: self.ledger.opened_at(),
            recent_winner: self.recent_winner,
            outstanding_request: self.oracle.outstanding().map(|req| req.id),
        }
    }
}
