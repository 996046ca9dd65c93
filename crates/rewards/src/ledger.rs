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

//! Decoded ledger pages as produced by the indexer, and their conversion into snapshots.

use std::{collections::BTreeMap, fs, path::Path};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    amount::{Amount, SCALE_DECIMALS},
    error::{Result, RewardsError},
    fetch::{merge_pages, Paginated},
    snapshot::{Checkpoint, Claim, PoolSnapshot},
};

/// Serde adapter for [U256] values carried as base-10 strings.
pub mod u256_dec {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingBalanceEntry {
    pub account: Address,
    #[serde(with = "u256_dec")]
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingRewardEntry {
    pub account: Address,
    #[serde(with = "u256_dec")]
    pub amount: U256,
    #[serde(with = "u256_dec")]
    pub amount_per_token_paid: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimEntry {
    pub account: Address,
    #[serde(with = "u256_dec")]
    pub amount: U256,
    pub timestamp: u64,
}

/// One page of a staking pool as returned by the indexer.
///
/// Scalar fields describe the pool and repeat on every page; the three lists are paginated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPage {
    pub id: Address,
    pub last_update_time: u64,
    pub period_finish: u64,
    #[serde(with = "u256_dec")]
    pub reward_rate: U256,
    #[serde(with = "u256_dec")]
    pub reward_per_token_stored: U256,
    #[serde(with = "u256_dec")]
    pub total_supply: U256,
    #[serde(default)]
    pub staking_balances: Vec<StakingBalanceEntry>,
    #[serde(default)]
    pub staking_rewards: Vec<StakingRewardEntry>,
    #[serde(default)]
    pub claims: Vec<ClaimEntry>,
}

impl Paginated for PoolPage {
    fn page_lengths(&self) -> Vec<usize> {
        vec![self.staking_balances.len(), self.staking_rewards.len(), self.claims.len()]
    }

    fn merge(mut self, next: Self) -> Self {
        self.staking_balances.extend(next.staking_balances);
        self.staking_rewards.extend(next.staking_rewards);
        self.claims.extend(next.claims);
        self
    }
}

/// Decimals of the two tokens involved in a staking pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDecimals {
    pub staking: u8,
    pub rewards: u8,
}

impl Default for PoolDecimals {
    fn default() -> Self {
        Self { staking: 18, rewards: 18 }
    }
}

impl PoolPage {
    fn duplicate(&self, kind: &str, account: &Address) -> RewardsError {
        RewardsError::InvalidSnapshot {
            pool: self.id,
            reason: format!("duplicate {kind} entry for {account}"),
        }
    }

    /// Build the snapshot evaluated at `eval_timestamp`, dropping later claims.
    ///
    /// Fails with [RewardsError::InvalidSnapshot] if merged pages repeat an account entry.
    pub fn to_snapshot(&self, eval_timestamp: u64, decimals: PoolDecimals) -> Result<PoolSnapshot> {
        let mut staking_balances = BTreeMap::new();
        for entry in &self.staking_balances {
            let amount = Amount::new(entry.amount, decimals.staking);
            if staking_balances.insert(entry.account, amount).is_some() {
                return Err(self.duplicate("staking balance", &entry.account));
            }
        }

        let mut reward_checkpoints = BTreeMap::new();
        for entry in &self.staking_rewards {
            let checkpoint = Checkpoint {
                amount: Amount::new(entry.amount, decimals.rewards),
                amount_per_token_paid: Amount::new(entry.amount_per_token_paid, SCALE_DECIMALS),
            };
            if reward_checkpoints.insert(entry.account, checkpoint).is_some() {
                return Err(self.duplicate("reward checkpoint", &entry.account));
            }
        }

        let claims: Vec<Claim> = self
            .claims
            .iter()
            .filter(|claim| claim.timestamp <= eval_timestamp)
            .map(|claim| Claim {
                account: claim.account,
                amount: Amount::new(claim.amount, decimals.rewards),
                timestamp: claim.timestamp,
            })
            .collect();

        Ok(PoolSnapshot {
            pool_id: self.id,
            last_update_time: self.last_update_time,
            period_finish: self.period_finish,
            reward_rate: Amount::new(self.reward_rate, decimals.rewards),
            reward_per_token_stored: Amount::new(self.reward_per_token_stored, SCALE_DECIMALS),
            total_staked: Amount::new(self.total_supply, decimals.staking),
            staking_balances,
            reward_checkpoints,
            claims,
        })
    }
}

/// Load a JSON array of pool pages and merge the pages of each pool in file order.
pub fn load_pool_pages(path: &Path) -> Result<BTreeMap<Address, PoolPage>> {
    let pages: Vec<PoolPage> = serde_json::from_slice(&fs::read(path)?)?;
    let count = pages.len();
    let merged = merge_pages(pages.into_iter().map(|page| (page.id, page)));
    tracing::debug!("Loaded {} pages for {} pools from {}", count, merged.len(), path.display());
    Ok(merged)
}
