//! Immutable raffle configuration.
//!
//! Validated once at construction and read-only for the lifetime of the
//! raffle instance. The provider-facing fields (`gas_lane`,
//! `subscription_id`, `callback_gas_limit`) identify the prepaid account
//! and callback budget at the external randomness provider.

use crate::types::{Amount, DEFAULT_CALLBACK_GAS_LIMIT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("entrance fee must be non-zero")]
    ZeroEntranceFee,
    #[error("close interval must be non-zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleConfig {
    /// Fixed fee each entry must attach, in wei-scale units.
    pub entrance_fee: Amount,
    /// Minimum seconds a round stays open before it may close.
    pub interval: u64,
    /// Gas budget for the provider's fulfillment callback.
    pub callback_gas_limit: u32,
    /// Provider key hash identifying the randomness lane.
    pub gas_lane: [u8; 32],
    /// Prepaid subscription the provider bills requests against.
    pub subscription_id: u64,
}

impl RaffleConfig {
    pub fn new(
        entrance_fee: Amount,
        interval: u64,
        callback_gas_limit: u32,
        gas_lane: [u8; 32],
        subscription_id: u64,
    ) -> Result<Self, ConfigError> {
        if entrance_fee == 0 {
            return Err(ConfigError::ZeroEntranceFee);
        }
        if interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            entrance_fee,
            interval,
            callback_gas_limit,
            gas_lane,
            subscription_id,
        })
    }

    /// Config for a local instance with default provider parameters.
    pub fn local(entrance_fee: Amount, interval: u64) -> Result<Self, ConfigError> {
        Self::new(
            entrance_fee,
            interval,
            DEFAULT_CALLBACK_GAS_LIMIT,
            [0u8; 32],
            1,
        )
    }
}
