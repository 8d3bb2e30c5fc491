//! Payout execution — pooled stake transfer to the winner.
//!
//! The treasury owns the pooled balance. The pool is debited only when
//! the underlying transfer succeeds; there are no partial transfers, so
//! no failure can leave the pool half-paid.

use crate::types::{Address, Amount};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayoutError {
    /// The recipient or the transport rejected the transfer.
    #[error("transfer to {0} rejected")]
    TransferFailed(Address),
    /// Payout larger than the pooled balance. Indicates ledger/treasury
    /// drift and should never happen in normal operation.
    #[error("pool balance {pool} below payout {amount}")]
    InsufficientPool { pool: Amount, amount: Amount },
}

/// Value-transfer transport. Recipients are untrusted and may reject.
pub trait Transfer: Send {
    fn send(&mut self, to: Address, amount: Amount) -> Result<(), PayoutError>;
}

/// In-memory transfer ledger crediting recipient balances.
///
/// Addresses on the refuse list reject payment, modeling a recipient
/// with no payable path in the original execution environment.
#[derive(Debug, Default)]
pub struct Ledgered {
    balances: HashMap<Address, Amount>,
    refusing: HashSet<Address>,
}

impl Ledgered {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, addr: Address) -> Amount {
        self.balances.get(&addr).copied().unwrap_or(0)
    }

    /// Make `addr` reject all incoming transfers.
    pub fn refuse(&mut self, addr: Address) {
        self.refusing.insert(addr);
    }
}

impl Transfer for Ledgered {
    fn send(&mut self, to: Address, amount: Amount) -> Result<(), PayoutError> {
        if self.refusing.contains(&to) {
            return Err(PayoutError::TransferFailed(to));
        }
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

/// Shared handle so callers can keep inspecting balances after handing
/// the transport to the treasury.
impl Transfer for Arc<Mutex<Ledgered>> {
    fn send(&mut self, to: Address, amount: Amount) -> Result<(), PayoutError> {
        let mut bank = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bank.send(to, amount)
    }
}

/// Pooled stake balance plus the transport that pays it out.
pub struct Treasury {
    pool: Amount,
    transport: Box<dyn Transfer>,
}

impl Treasury {
    pub fn new(transport: Box<dyn Transfer>) -> Self {
        Self { pool: 0, transport }
    }

    pub fn pool(&self) -> Amount {
        self.pool
    }

    /// Credit an entry's attached value to the pool.
    pub fn deposit(&mut self, amount: Amount) {
        self.pool += amount;
    }

    /// Transfer `amount` to `recipient`, debiting the pool only on
    /// success. A rejected transfer leaves the pool untouched.
    pub fn pay(&mut self, recipient: Address, amount: Amount) -> Result<(), PayoutError> {
        if amount > self.pool {
            return Err(PayoutError::InsufficientPool {
                pool: self.pool,
                amount,
            });
        }
        self.transport.send(recipient, amount)?;
        self.pool -= amount;
        Ok(())
    }
}
