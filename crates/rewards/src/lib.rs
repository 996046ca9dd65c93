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

//! Off-chain replication of staking reward accrual and Merkle distribution of tranche rewards.

// Declare modules
pub mod allocation;
pub mod amount;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod merkle;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod tranche;

// Re-export commonly used types
pub use allocation::{distribute, pool_shares, AllocationMap, Distribution, PoolShares};

pub use amount::{div_scaled, format_units, mul_scaled, parse_units, Amount, SCALE};

pub use config::{PoolConfig, TokenConfig, TrancheConfig};

pub use error::{Result, RewardsError};

pub use fetch::{
    fetch_all, fetch_all_keyed, merge_pages, paginate, should_fetch_more, PageFetcher, Paginated,
};

pub use ledger::{load_pool_pages, PoolDecimals, PoolPage};

pub use merkle::{combined_hash, leaf_hash, verify, AccountProof, MerkleTree, EMPTY_ROOT};

pub use pipeline::{build_merkle, claim_proofs, compute_tranche, PoolTranche, TrancheOutcome};

pub use report::{ClaimProof, ClaimReport, MerkleArtifact, TrancheReport};

pub use snapshot::{account_earnings, earned, reward_per_token, EarningsByAccount, PoolSnapshot};

pub use tranche::{net_tranche_earnings, TrancheBoundary, TrancheWindow, TRANCHE_DURATION_SECS};
