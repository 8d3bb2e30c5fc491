//! Randomness provider adapter — outbound requests and inbound
//! fulfillment correlation.
//!
//! The provider channel is untrusted for delivery (callbacks may be
//! duplicated, delayed, or carry ids we never issued) but trusted for
//! the unpredictability of the delivered value. [`RandomnessClient`]
//! enforces the correlation: at most one request is outstanding at a
//! time and each issued id is consumed exactly once.

use crate::config::RaffleConfig;
use crate::types::{RequestId, Timestamp, NUM_WORDS, REQUEST_CONFIRMATIONS};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    /// The outbound request could not be placed. The round is untouched
    /// and the trigger can be retried.
    #[error("randomness provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Callback for an id that was never issued or is already consumed.
    /// Replay and duplicate-delivery protection.
    #[error("unknown or already fulfilled randomness request {0}")]
    UnknownRequest(RequestId),
    /// A request is already outstanding; at most one may exist.
    #[error("a randomness request is already outstanding")]
    RequestPending,
}

/// Parameters the provider needs to place a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub request_confirmations: u16,
    pub num_words: u32,
}

impl RequestContext {
    pub fn from_config(config: &RaffleConfig) -> Self {
        Self {
            gas_lane: config.gas_lane,
            subscription_id: config.subscription_id,
            callback_gas_limit: config.callback_gas_limit,
            request_confirmations: REQUEST_CONFIRMATIONS,
            num_words: NUM_WORDS,
        }
    }
}

/// Outbound side of the randomness protocol.
///
/// `request` returns the provider-issued id; the matching value arrives
/// later through the state machine's fulfillment entry point.
pub trait RandomnessProvider: Send {
    fn request(&mut self, ctx: &RequestContext) -> Result<RequestId, OracleError>;

    /// Whether the prepaid subscription can pay for a request. Observed
    /// by the upkeep predicate as its funding precondition.
    fn is_funded(&self) -> bool;
}

/// A single outstanding request, bound to the round it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub id: RequestId,
    /// `opened_at` of the round being closed; rounds open at distinct
    /// timestamps, so this identifies the round.
    pub issued_for: Timestamp,
}

pub struct RandomnessClient {
    provider: Box<dyn RandomnessProvider>,
    outstanding: Option<RandomnessRequest>,
}

impl RandomnessClient {
    pub fn new(provider: Box<dyn RandomnessProvider>) -> Self {
        Self {
            provider,
            outstanding: None,
        }
    }

    pub fn is_funded(&self) -> bool {
        self.provider.is_funded()
    }

    pub fn outstanding(&self) -> Option<RandomnessRequest> {
        self.outstanding
    }

    /// Issue a request bound to the round that opened at `issued_for`.
    ///
    /// A provider failure leaves no trace: no request is recorded and
    /// the caller's round state is unchanged, so the trigger stays
    /// retriable.
    pub fn request(
        &mut self,
        ctx: &RequestContext,
        issued_for: Timestamp,
    ) -> Result<RequestId, OracleError> {
        if self.outstanding.is_some() {
            return Err(OracleError::RequestPending);
        }
        let id = self.provider.request(ctx)?;
        self.outstanding = Some(RandomnessRequest { id, issued_for });
        Ok(id)
    }

    /// Correlation and idempotency gate, run before any round state is
    /// touched. Consumes the outstanding request exactly once; replays
    /// and foreign ids fail without affecting a legitimate outstanding
    /// request.
    pub fn confirm(&mut self, id: RequestId) -> Result<RandomnessRequest, OracleError> {
        match self.outstanding {
            Some(req) if req.id == id => {
                self.outstanding = None;
                Ok(req)
            }
            _ => Err(OracleError::UnknownRequest(id)),
        }
    }
}

// =============================================================================
// MOCK COORDINATOR
// =============================================================================

/// In-process stand-in for the external randomness coordinator.
///
/// Derives request ids as SHA3-256 over the gas lane, subscription id,
/// request nonce, and a random salt — unpredictable before issuance,
/// like the real coordinator's hash-of-nonce scheme. Supports forced
/// outages and an unfunded subscription for exercising the request-side
/// failure paths, and reports issued ids on an optional outbox channel
/// so a driver task can deliver fulfillments.
pub struct MockCoordinator {
    rng: ChaCha20Rng,
    nonce: u64,
    funded: bool,
    outage: bool,
    outbox: Option<UnboundedSender<RequestId>>,
}

impl MockCoordinator {
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    /// Deterministic id sequence for tests and reproducible simulations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            nonce: 0,
            funded: true,
            outage: false,
            outbox: None,
        }
    }

    /// Report every issued id on `tx`.
    pub fn with_outbox(mut self, tx: UnboundedSender<RequestId>) -> Self {
        self.outbox = Some(tx);
        self
    }

    pub fn set_funded(&mut self, funded: bool) {
        self.funded = funded;
    }

    pub fn set_outage(&mut self, outage: bool) {
        self.outage = outage;
    }
}

impl Default for MockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomnessProvider for MockCoordinator {
    fn request(&mut self, ctx: &RequestContext) -> Result<RequestId, OracleError> {
        if self.outage {
            return Err(OracleError::ProviderUnavailable(
                "coordinator unreachable".into(),
            ));
        }
        if !self.funded {
            return Err(OracleError::ProviderUnavailable(format!(
                "subscription {} out of funds",
                ctx.subscription_id
            )));
        }

        self.nonce += 1;
        let mut hasher = Sha3_256::new();
        hasher.update(ctx.gas_lane);
        hasher.update(ctx.subscription_id.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(self.rng.next_u64().to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let raw = u64::from_le_bytes(bytes);
        // Zero is reserved as "never issued".
        let id = RequestId(raw.max(1));

        if let Some(tx) = &self.outbox {
            let _ = tx.send(id);
        }
        Ok(id)
    }

    fn is_funded(&self) -> bool {
        self.funded
    }
}
