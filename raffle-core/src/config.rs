use crate::error::{RaffleError, Result};
use crate::types::{Address, Amount, KeyHash};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

pub const REQUEST_CONFIRMATIONS: u16 = 3;
pub const NUM_WORDS: u32 = 1;

/// 0.25 LINK flat fee charged by the local mock coordinator per fulfillment.
pub const MOCK_BASE_FEE: Amount = Amount::from_wei(250_000_000_000_000_000);
/// LINK per gas unit charged by the local mock coordinator.
pub const MOCK_GAS_PRICE_LINK: Amount = Amount::from_wei(1_000_000_000);
/// Amount the local subscription is funded with after creation.
pub const MOCK_FUND_AMOUNT: Amount = Amount::from_ether(1);

const DEFAULT_ENTRANCE_FEE: Amount = Amount::from_wei(10_000_000_000_000_000); // 0.01 ETH
const DEFAULT_GAS_LANE: &str = "0x474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c";
const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;
const DEFAULT_INTERVAL_SECS: u64 = 30;
/// One year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;
const SEPOLIA_COORDINATOR: &str = "0x8103B0A8A00be2DDC778e6e7eaa21791Cd364625";

/// Construction-time configuration, fixed for the life of a raffle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaffleConfig {
    pub vrf_coordinator: Address,
    pub entrance_fee: Amount,
    pub gas_lane: KeyHash,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub interval_secs: u64,
}

impl RaffleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vrf_coordinator.is_zero() {
            return Err(RaffleError::config("VRF coordinator address cannot be zero"));
        }

        if self.entrance_fee.is_zero() {
            return Err(RaffleError::config("Entrance fee must be greater than 0"));
        }

        if self.callback_gas_limit == 0 {
            return Err(RaffleError::config(
                "Callback gas limit must be greater than 0",
            ));
        }

        if self.interval_secs == 0 {
            return Err(RaffleError::config("Interval must be greater than 0"));
        }

        if self.interval_secs > MAX_INTERVAL_SECS {
            return Err(RaffleError::config(format!(
                "Interval of {}s exceeds the maximum of {}s",
                self.interval_secs, MAX_INTERVAL_SECS
            )));
        }

        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RaffleConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Per-chain deployment values. Development chains deploy a local mock
/// coordinator and create their own subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub vrf_coordinator: Option<Address>,
    pub subscription_id: Option<u64>,
    pub entrance_fee: Amount,
    pub gas_lane: KeyHash,
    pub callback_gas_limit: u32,
    pub interval_secs: u64,
}

impl NetworkConfig {
    pub fn for_chain(chain_id: u64) -> Result<Self> {
        let gas_lane = KeyHash::from_str(DEFAULT_GAS_LANE)?;

        match chain_id {
            LOCAL_CHAIN_ID => Ok(Self {
                name: "localhost".to_string(),
                chain_id,
                vrf_coordinator: None,
                subscription_id: None,
                entrance_fee: DEFAULT_ENTRANCE_FEE,
                gas_lane,
                callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
                interval_secs: DEFAULT_INTERVAL_SECS,
            }),
            SEPOLIA_CHAIN_ID => Ok(Self {
                name: "sepolia".to_string(),
                chain_id,
                vrf_coordinator: Some(Address::from_str(SEPOLIA_COORDINATOR)?),
                subscription_id: None,
                entrance_fee: DEFAULT_ENTRANCE_FEE,
                gas_lane,
                callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
                interval_secs: DEFAULT_INTERVAL_SECS,
            }),
            other => Err(RaffleError::config(format!(
                "No network configuration for chain id {}",
                other
            ))),
        }
    }

    pub fn is_development(&self) -> bool {
        self.chain_id == LOCAL_CHAIN_ID
    }

    /// Resolve into a raffle configuration. Explicit arguments win over the
    /// preset; a chain without a preset coordinator or subscription needs them.
    pub fn raffle_config(
        &self,
        vrf_coordinator: Option<Address>,
        subscription_id: Option<u64>,
    ) -> Result<RaffleConfig> {
        let vrf_coordinator = vrf_coordinator.or(self.vrf_coordinator).ok_or_else(|| {
            RaffleError::config(format!("No VRF coordinator configured for {}", self.name))
        })?;
        let subscription_id = subscription_id.or(self.subscription_id).ok_or_else(|| {
            RaffleError::config(format!("No subscription id configured for {}", self.name))
        })?;

        let config = RaffleConfig {
            vrf_coordinator,
            entrance_fee: self.entrance_fee,
            gas_lane: self.gas_lane,
            subscription_id,
            callback_gas_limit: self.callback_gas_limit,
            interval_secs: self.interval_secs,
        };
        config.validate()?;
        Ok(config)
    }
}
