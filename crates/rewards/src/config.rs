// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Run configuration of one tranche.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    error::{Result, RewardsError},
    ledger::PoolDecimals,
    tranche::TrancheWindow,
};

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub pool: Address,
    /// Reward token budget of the pool for this tranche, as a decimal string.
    pub budget: String,
    #[serde(default = "default_decimals")]
    pub staking_decimals: u8,
}

/// Configuration of a tranche run, as written by the operator.
///
/// ```yaml
/// tranche:
///   number: 4
///   start: { blockNumber: 10700000, timestamp: 1597061555 }
///   end: { blockNumber: 10745000, timestamp: 1597666355 }
/// token:
///   address: "0xa3bed4e1c75d00fa6f4e5e6922db7261b5e9acd2"
///   decimals: 18
/// displayPrecision: 6
/// pools:
///   - pool: "0x0d0d65e7a7db277d3e0f5e1676325e75f3340455"
///     budget: "1000"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrancheConfig {
    pub tranche: TrancheWindow,
    pub token: TokenConfig,
    /// Decimals of the earnings token the pools accrue.
    #[serde(default = "default_decimals")]
    pub earnings_decimals: u8,
    /// Fractional digits shown in the tranche report. Claim reports always keep full precision.
    #[serde(default)]
    pub display_precision: Option<usize>,
    pub pools: Vec<PoolConfig>,
}

impl TrancheConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a config.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tranche.validate()?;
        let mut seen = BTreeSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.pool) {
                return Err(RewardsError::InvalidTranche(format!(
                    "pool {} is configured more than once",
                    pool.pool
                )));
            }
        }
        self.budgets()?;
        Ok(())
    }

    /// Budgets keyed by pool, at the reward token's decimals.
    pub fn budgets(&self) -> Result<BTreeMap<Address, Amount>> {
        self.pools
            .iter()
            .map(|pool| Ok((pool.pool, Amount::parse(&pool.budget, self.token.decimals)?)))
            .collect()
    }

    pub fn pool_decimals(&self, pool: &PoolConfig) -> PoolDecimals {
        PoolDecimals { staking: pool.staking_decimals, rewards: self.earnings_decimals }
    }
}
