// Copyright (c) 2025-2026 The Raffle developers
// Distributed under the MIT software license.

//! Core data model for the raffle round lifecycle.
//!
//! Exactly one [`Round`] is live at any time. It is owned by the state
//! machine in `engine` and moves through two states:
//!
//! ```text
//!            enter()                    perform_upkeep()
//!         ┌──────────┐                ┌─────────────────┐
//!         ▼          │                │                 ▼
//!     ┌────────────────┐   request   ┌───────────────────┐
//!     │      Open      │────issued──►│      Closing      │
//!     └────────────────┘             └───────────────────┘
//!             ▲                                │
//!             │      payout succeeded,         │
//!             └────── ledger reset ────────────┘
//! ```
//!
//! The only transition back into `Open` is from `Closing` after a
//! successful payout and ledger reset. A failed payout leaves the round
//! in `Closing` permanently (fail-closed, see `engine`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stake amounts in wei-scale units.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Current unix time in seconds.
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// PROVIDER PROTOCOL CONSTANTS
// =============================================================================
// Parameters of the randomness request placed with the external provider.
// The provider waits REQUEST_CONFIRMATIONS before answering and delivers
// NUM_WORDS random words in the callback.

/// Confirmations the provider waits for before fulfilling a request.
/// Higher values make the delivered value harder to bias at the cost of
/// a longer Closing window.
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Random words requested per round. One word selects one winner.
pub const NUM_WORDS: u32 = 1;

/// Gas budget handed to the provider for the fulfillment callback.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// 20-byte entrant address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Provider-issued randomness request token.
///
/// Ids are derived by the provider and are unpredictable before issuance,
/// so outcomes cannot be pre-computed. Zero is never a valid issued id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

// =============================================================================
// ROUND
// =============================================================================

/// Round lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    /// Accepting entrants.
    Open,
    /// Entrants frozen, awaiting randomness fulfillment.
    Closing,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Open => write!(f, "OPEN"),
            RoundState::Closing => write!(f, "CLOSING"),
        }
    }
}

/// One cycle of entry-collection through winner-payout-and-reset.
///
/// `entrants` preserves insertion order and allows duplicates: an address
/// entering k times holds k slots and k/n of the probability mass.
///
/// Invariant: `stake_total == entrance_fee * entrants.len()` while `Open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub state: RoundState,
    pub entrants: Vec<Address>,
    pub stake_total: Amount,
    pub opened_at: Timestamp,
}

impl Round {
    pub fn new(now: Timestamp) -> Self {
        Self {
            state: RoundState::Open,
            entrants: Vec::new(),
            stake_total: 0,
            opened_at: now,
        }
    }
}
