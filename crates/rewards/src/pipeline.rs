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

//! Stages of a tranche run wired in order: snapshots, netting, distribution, commitment.

use std::collections::BTreeMap;

use alloy_primitives::Address;

use crate::{
    allocation::{distribute, pool_shares, AllocationMap, Distribution, PoolShares},
    amount::Amount,
    config::{PoolConfig, TrancheConfig},
    error::{Result, RewardsError},
    ledger::PoolPage,
    merkle::MerkleTree,
    report::{
        ClaimProof, ClaimReport, EarningsBreakdown, MerkleArtifact, SortedRewards,
        TotalAllocation, TrancheReport,
    },
    snapshot::{account_earnings, EarningsByAccount},
    tranche::{net_tranche_earnings, TrancheWindow},
};

/// Earnings of one pool over a tranche.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTranche {
    pub pool: Address,
    pub earnings_at_start: EarningsByAccount,
    pub earnings_at_end: EarningsByAccount,
    pub tranche_earnings: EarningsByAccount,
    pub shares: PoolShares,
}

/// Result of the accrual and distribution stages for one tranche and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrancheOutcome {
    pub window: TrancheWindow,
    pub token: Address,
    pub earnings_decimals: u8,
    pub pools: Vec<PoolTranche>,
    pub distribution: Distribution,
}

/// Evaluate one pool at both ends of the window.
///
/// A pool without a start page had no activity before the tranche. A pool without an end page
/// cannot be evaluated.
pub fn evaluate_pool(
    config: &TrancheConfig,
    pool: &PoolConfig,
    start: Option<&PoolPage>,
    end: Option<&PoolPage>,
) -> Result<PoolTranche> {
    let decimals = config.pool_decimals(pool);
    let window = &config.tranche;

    let end = end.ok_or_else(|| RewardsError::InvalidSnapshot {
        pool: pool.pool,
        reason: format!("no ledger page at tranche end block {}", window.end.block_number),
    })?;
    let earnings_at_end =
        account_earnings(&end.to_snapshot(window.end.timestamp, decimals)?, window.end.timestamp)?;

    let earnings_at_start = match start {
        Some(page) => account_earnings(
            &page.to_snapshot(window.start.timestamp, decimals)?,
            window.start.timestamp,
        )?,
        None => {
            tracing::debug!("Pool {} has no ledger page at tranche start", pool.pool);
            EarningsByAccount::new()
        }
    };

    let tranche_earnings = net_tranche_earnings(pool.pool, &earnings_at_start, &earnings_at_end)?;
    let shares = pool_shares(pool.pool, &tranche_earnings, decimals.rewards)?;
    tracing::debug!(
        "Pool {} earned {} across {} accounts",
        pool.pool,
        shares.total,
        tranche_earnings.len()
    );

    Ok(PoolTranche {
        pool: pool.pool,
        earnings_at_start,
        earnings_at_end,
        tranche_earnings,
        shares,
    })
}

/// Run the accrual and distribution stages over merged ledger pages keyed by pool.
pub fn compute_tranche(
    config: &TrancheConfig,
    start_pages: &BTreeMap<Address, PoolPage>,
    end_pages: &BTreeMap<Address, PoolPage>,
) -> Result<TrancheOutcome> {
    config.validate()?;
    let budgets = config.budgets()?;

    let pools = config
        .pools
        .iter()
        .map(|pool| {
            evaluate_pool(config, pool, start_pages.get(&pool.pool), end_pages.get(&pool.pool))
        })
        .collect::<Result<Vec<_>>>()?;

    let shares: Vec<PoolShares> = pools.iter().map(|pool| pool.shares.clone()).collect();
    let distribution = distribute(&shares, &budgets, config.token.decimals)?;

    tracing::info!(
        "Tranche {} ({} to {}): {} of {} to {} accounts in {} pools, {} undistributed",
        config.tranche.number,
        config.tranche.start.time_label(),
        config.tranche.end.time_label(),
        distribution.total_distributed,
        distribution.total_budget,
        distribution.rewards.len(),
        pools.len(),
        distribution.undistributed()?
    );

    Ok(TrancheOutcome {
        window: config.tranche,
        token: config.token.address,
        earnings_decimals: config.earnings_decimals,
        pools,
        distribution,
    })
}

impl TrancheOutcome {
    pub fn allocations(&self) -> AllocationMap {
        AllocationMap::from_distribution(&self.distribution)
    }

    pub fn claim_report(&self) -> ClaimReport {
        ClaimReport::from_allocations(&self.allocations())
    }

    /// Shape the outcome into the published report, formatting amounts to `precision`.
    pub fn report(&self, precision: Option<usize>) -> Result<TrancheReport> {
        let mut breakdown = EarningsBreakdown::default();
        for pool in &self.pools {
            for (account, amount) in &pool.tranche_earnings {
                breakdown
                    .per_staker_per_pool
                    .entry(*account)
                    .or_default()
                    .insert(pool.pool, amount.format(precision));
            }
            let at_start = Amount::sum(pool.earnings_at_start.values(), self.earnings_decimals)?;
            let at_end = Amount::sum(pool.earnings_at_end.values(), self.earnings_decimals)?;
            breakdown.total_per_pool_at_start.insert(pool.pool, at_start.format(precision));
            breakdown.total_per_pool_at_end.insert(pool.pool, at_end.format(precision));
        }

        let rewards = self
            .distribution
            .sorted()
            .into_iter()
            .map(|(account, amount)| (account, amount.format(precision)))
            .collect();

        Ok(TrancheReport {
            tranche: self.window,
            token_address: self.token,
            total_rewards: self.distribution.total_distributed.format(precision),
            rewards: SortedRewards(rewards),
            mta_earnings: breakdown,
        })
    }
}

/// Commit a finalized allocation to a Merkle tree and summarize it.
pub fn build_merkle(
    tranche_number: u64,
    token: Address,
    allocations: &AllocationMap,
) -> Result<(MerkleTree, MerkleArtifact)> {
    let tree = MerkleTree::new(allocations);
    let total = allocations.total()?;
    let artifact = MerkleArtifact {
        root_hash: tree.root(),
        tranche_number,
        token_address: token,
        accounts: tree.len(),
        total_allocation: TotalAllocation { exact: total.exact(), simple: total.format(None) },
    };
    tracing::info!(
        "Tranche {} Merkle root {} commits {} to {} accounts",
        tranche_number,
        artifact.root_hash,
        artifact.total_allocation.simple,
        artifact.accounts
    );
    Ok((tree, artifact))
}

/// Proofs for every committed account, in account order.
pub fn claim_proofs(tree: &MerkleTree, tranche_number: u64) -> Result<Vec<ClaimProof>> {
    tree.accounts()
        .map(|account| Ok(ClaimProof::new(tranche_number, tree.claim(account)?)))
        .collect()
}
