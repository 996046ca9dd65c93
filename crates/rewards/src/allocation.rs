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

//! Pool shares and the distribution of fixed per-pool budgets across accounts.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::{
    amount::Amount,
    error::{Result, RewardsError},
    snapshot::EarningsByAccount,
};

/// Each account's fraction of one pool's tranche earnings, at [crate::amount::SCALE] precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolShares {
    pub pool: Address,
    /// Sum of tranche earnings across the pool.
    pub total: Amount,
    pub shares: BTreeMap<Address, Amount>,
}

/// Compute the pool total and every account's share of it.
///
/// A pool with zero total earnings gives every account a zero share.
pub fn pool_shares(
    pool: Address,
    tranche_earnings: &EarningsByAccount,
    decimals: u8,
) -> Result<PoolShares> {
    let total = Amount::sum(tranche_earnings.values(), decimals)?;
    let shares = tranche_earnings
        .iter()
        .map(|(account, earned)| {
            let share = if total.is_zero() {
                Amount::scaled(U256::ZERO)
            } else {
                earned.div_scaled(total)?
            };
            Ok((*account, share))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(PoolShares { pool, total, shares })
}

/// Rewards owed to each account once every pool budget has been split by share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub rewards: BTreeMap<Address, Amount>,
    /// Sum of all rewards.
    pub total_distributed: Amount,
    /// Sum of the budgets of the distributed pools.
    pub total_budget: Amount,
}

impl Distribution {
    /// Budget that was not handed out, from share truncation or from pools without earnings.
    pub fn undistributed(&self) -> Result<Amount> {
        self.total_budget.checked_sub(self.total_distributed)
    }

    /// Rewards ordered by amount descending, then by account ascending.
    pub fn sorted(&self) -> Vec<(Address, Amount)> {
        let mut sorted: Vec<(Address, Amount)> =
            self.rewards.iter().map(|(account, amount)| (*account, *amount)).collect();
        sorted.sort_by(|(a_account, a_amount), (b_account, b_amount)| {
            b_amount.exact().cmp(&a_amount.exact()).then_with(|| a_account.cmp(b_account))
        });
        sorted
    }
}

/// Split each pool's budget across its accounts in proportion to their shares and accumulate
/// the result per account. Truncation loss stays undistributed.
pub fn distribute(
    pools: &[PoolShares],
    budgets: &BTreeMap<Address, Amount>,
    token_decimals: u8,
) -> Result<Distribution> {
    let mut rewards: BTreeMap<Address, Amount> = BTreeMap::new();
    let mut total_budget = Amount::zero(token_decimals);

    for pool in pools {
        let budget =
            budgets.get(&pool.pool).copied().ok_or(RewardsError::MissingPoolBudget(pool.pool))?;
        total_budget = total_budget.checked_add(budget)?;

        let mut participants = 0usize;
        for (account, share) in &pool.shares {
            if share.is_zero() {
                continue;
            }
            participants += 1;
            let reward = budget.mul_scaled(*share)?;
            let entry = rewards.entry(*account).or_insert(Amount::zero(token_decimals));
            *entry = entry.checked_add(reward)?;
        }

        tracing::debug!(
            "Pool {} budget {} split across {} accounts",
            pool.pool,
            budget,
            participants
        );
        if participants == 0 && !budget.is_zero() {
            tracing::warn!(
                "Pool {} has no earnings this tranche; budget {} is unused",
                pool.pool,
                budget
            );
        }
    }

    let total_distributed = Amount::sum(rewards.values(), token_decimals)?;
    Ok(Distribution { rewards, total_distributed, total_budget })
}

/// Final allocation of one tranche and token, as committed to the Merkle tree.
///
/// Zero allocations are never admitted, so an account with nothing to claim has no leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationMap {
    decimals: u8,
    entries: BTreeMap<Address, Amount>,
}

impl AllocationMap {
    pub fn new(entries: BTreeMap<Address, Amount>, decimals: u8) -> Result<Self> {
        let mut admitted = BTreeMap::new();
        for (account, amount) in entries {
            if amount.decimals() != decimals {
                return Err(RewardsError::DecimalsMismatch {
                    left: decimals,
                    right: amount.decimals(),
                });
            }
            if !amount.is_zero() {
                admitted.insert(account, amount);
            }
        }
        Ok(Self { decimals, entries: admitted })
    }

    pub fn from_distribution(distribution: &Distribution) -> Self {
        let entries = distribution
            .rewards
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(account, amount)| (*account, *amount))
            .collect();
        Self { decimals: distribution.total_distributed.decimals(), entries }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn get(&self, account: &Address) -> Option<Amount> {
        self.entries.get(account).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.entries.iter()
    }

    pub fn total(&self) -> Result<Amount> {
        Amount::sum(self.entries.values(), self.decimals)
    }
}
