//! Raffle — a provably-fair lottery core.
//!
//! Paid entrants accumulate in a round; external automation triggers the
//! close once time and balance conditions hold; a randomness provider
//! answers asynchronously; the fulfillment deterministically selects and
//! pays a winner and resets the round.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod oracle;
pub mod payout;
pub mod service;
pub mod types;
pub mod upkeep;

pub use config::{ConfigError, RaffleConfig};
pub use engine::{Raffle, RaffleError, RaffleEvent, RaffleStatus};
pub use ledger::{EntryError, EntryLedger};
pub use oracle::{
    MockCoordinator, OracleError, RandomnessClient, RandomnessProvider, RandomnessRequest,
    RequestContext,
};
pub use payout::{Ledgered, PayoutError, Transfer, Treasury};
pub use service::{spawn, RaffleHandle, ServiceError};
pub use types::*;
pub use upkeep::{evaluate, needs_upkeep, UpkeepCheck};
