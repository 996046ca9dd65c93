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

//! Replica of the staking contract's reward-per-token accounting for one pool.
//!
//! The contract keeps a pool-wide accumulator `rewardPerTokenStored` that grows by
//! `rewardRate * elapsed / totalSupply` and a per-account checkpoint of the accumulator value at
//! which rewards were last booked. Evaluating both at a timestamp gives an account's lifetime
//! earnings without replaying every block.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::Address;

use crate::{
    amount::{div_scaled, mul_scaled, Amount},
    error::{Result, RewardsError},
};

/// Earnings keyed by account for a single pool.
pub type EarningsByAccount = BTreeMap<Address, Amount>;

/// Reward booked for an account at its last interaction with the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Reward earned and booked, in reward token units.
    pub amount: Amount,
    /// Reward-per-token value at the time of booking, at [crate::amount::SCALE] precision.
    pub amount_per_token_paid: Amount,
}

/// Reward withdrawn by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub account: Address,
    pub amount: Amount,
    pub timestamp: u64,
}

/// State of one pool as seen at one evaluation timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool_id: Address,
    pub last_update_time: u64,
    pub period_finish: u64,
    /// Reward token units emitted per second. Its decimals are the decimals of all earnings.
    pub reward_rate: Amount,
    pub reward_per_token_stored: Amount,
    pub total_staked: Amount,
    pub staking_balances: BTreeMap<Address, Amount>,
    pub reward_checkpoints: BTreeMap<Address, Checkpoint>,
    /// Claims in ledger order, up to the evaluation timestamp.
    pub claims: Vec<Claim>,
}

impl PoolSnapshot {
    /// Decimals of every earnings amount derived from this snapshot.
    pub fn reward_decimals(&self) -> u8 {
        self.reward_rate.decimals()
    }

    /// Every account known to the pool, in ascending order.
    pub fn accounts(&self) -> BTreeSet<Address> {
        self.staking_balances
            .keys()
            .chain(self.reward_checkpoints.keys())
            .chain(self.claims.iter().map(|claim| &claim.account))
            .copied()
            .collect()
    }

    fn invalid(&self, reason: impl Into<String>) -> RewardsError {
        RewardsError::InvalidSnapshot { pool: self.pool_id, reason: reason.into() }
    }
}

/// Pool-wide reward-per-token accumulator at `eval_timestamp`.
///
/// An empty pool keeps its stored value, whatever its rate and period.
pub fn reward_per_token(snapshot: &PoolSnapshot, eval_timestamp: u64) -> Result<Amount> {
    if snapshot.total_staked.is_zero() {
        return Ok(snapshot.reward_per_token_stored);
    }

    let applicable_until = eval_timestamp.min(snapshot.period_finish);
    let elapsed = applicable_until.checked_sub(snapshot.last_update_time).ok_or_else(|| {
        snapshot.invalid(format!(
            "last update time {} is after applicable time {}",
            snapshot.last_update_time, applicable_until
        ))
    })?;

    let reward_units = snapshot.reward_rate.checked_mul_int(elapsed)?;
    let per_token_delta = div_scaled(reward_units.exact(), snapshot.total_staked.exact())?;
    let value = snapshot
        .reward_per_token_stored
        .exact()
        .checked_add(per_token_delta)
        .ok_or(RewardsError::ArithmeticOverflow("reward_per_token"))?;

    Ok(Amount::new(value, snapshot.reward_per_token_stored.decimals()))
}

/// Lifetime earnings of `account`: booked reward, plus reward accrued since the checkpoint,
/// plus everything already claimed up to `eval_timestamp`.
///
/// An account without a checkpoint has never had reward booked, so only its claims count.
pub fn earned(
    snapshot: &PoolSnapshot,
    account: &Address,
    reward_per_token: Amount,
    eval_timestamp: u64,
) -> Result<Amount> {
    let decimals = snapshot.reward_decimals();

    let accrued = match snapshot.reward_checkpoints.get(account) {
        Some(checkpoint) => {
            let delta_per_token = reward_per_token
                .exact()
                .checked_sub(checkpoint.amount_per_token_paid.exact())
                .ok_or_else(|| {
                    snapshot.invalid(format!(
                        "reward per token {} is below the amount paid to {}",
                        reward_per_token.exact(),
                        account
                    ))
                })?;
            let balance =
                snapshot.staking_balances.get(account).map(Amount::exact).unwrap_or_default();
            let new_reward = Amount::new(mul_scaled(balance, delta_per_token)?, decimals);
            Amount::new(checkpoint.amount.exact(), decimals).checked_add(new_reward)?
        }
        None => Amount::zero(decimals),
    };

    snapshot
        .claims
        .iter()
        .filter(|claim| claim.account == *account && claim.timestamp <= eval_timestamp)
        .try_fold(accrued, |total, claim| total.checked_add(claim.amount))
}

/// Evaluate [earned] for every account known to the pool.
pub fn account_earnings(snapshot: &PoolSnapshot, eval_timestamp: u64) -> Result<EarningsByAccount> {
    let rpt = reward_per_token(snapshot, eval_timestamp)?;
    tracing::debug!(
        "Pool {} reward per token at {}: {}",
        snapshot.pool_id,
        eval_timestamp,
        rpt.exact()
    );

    snapshot
        .accounts()
        .into_iter()
        .map(|account| Ok((account, earned(snapshot, &account, rpt, eval_timestamp)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::amount::{SCALE, SCALE_DECIMALS};

    fn units(s: &str) -> U256 {
        U256::from_str_radix(s, 10).unwrap()
    }

    fn tokens(s: &str) -> Amount {
        Amount::new(units(s), 18)
    }

    fn rpt(s: &str) -> Amount {
        Amount::new(units(s), SCALE_DECIMALS)
    }

    fn empty_pool(pool_id: Address) -> PoolSnapshot {
        PoolSnapshot {
            pool_id,
            last_update_time: 1_000,
            period_finish: 2_000,
            reward_rate: tokens("1000000000000000000"),
            reward_per_token_stored: rpt("0"),
            total_staked: tokens("0"),
            staking_balances: BTreeMap::new(),
            reward_checkpoints: BTreeMap::new(),
            claims: Vec::new(),
        }
    }

    #[test]
    fn test_zero_liquidity_keeps_stored_value() {
        let mut pool = empty_pool(Address::repeat_byte(1));
        pool.reward_per_token_stored = rpt("123456789");
        let cases = [("0", 0), ("1", 1_500), ("99999999999999999999999", 9_999_999)];
        for (rate, period_finish) in cases {
            pool.reward_rate = tokens(rate);
            pool.period_finish = period_finish;
            for eval in [0, 1_000, 5_000] {
                assert_eq!(reward_per_token(&pool, eval).unwrap(), rpt("123456789"));
            }
        }
    }

    #[test]
    fn test_reward_per_token_accrues_until_period_finish() {
        let mut pool = empty_pool(Address::repeat_byte(1));
        pool.total_staked = tokens("2000000000000000000");
        pool.reward_per_token_stored = rpt("5");

        // 1 token/s over 500s, split over 2 staked tokens.
        assert_eq!(
            reward_per_token(&pool, 1_500).unwrap(),
            Amount::scaled(SCALE * U256::from(250) + U256::from(5))
        );
        // Capped at period finish.
        assert_eq!(
            reward_per_token(&pool, 9_000).unwrap(),
            Amount::scaled(SCALE * U256::from(500) + U256::from(5))
        );
        // No elapsed time.
        assert_eq!(reward_per_token(&pool, 1_000).unwrap(), rpt("5"));
    }

    #[test]
    fn test_negative_elapsed_time_is_invalid() {
        let mut pool = empty_pool(Address::repeat_byte(1));
        pool.total_staked = tokens("1");
        assert!(matches!(reward_per_token(&pool, 999), Err(RewardsError::InvalidSnapshot { .. })));
    }

    #[test]
    fn test_earned_adds_claims_to_accrued_reward() {
        let account = Address::repeat_byte(0xaa);
        let mut pool = empty_pool(Address::repeat_byte(1));
        pool.staking_balances.insert(account, tokens("2000000000000000000"));
        pool.reward_checkpoints.insert(
            account,
            Checkpoint { amount: tokens("7"), amount_per_token_paid: Amount::scaled(SCALE) },
        );
        pool.claims = vec![
            Claim { account, amount: tokens("100"), timestamp: 1_200 },
            Claim { account: Address::repeat_byte(0xbb), amount: tokens("1000"), timestamp: 1_200 },
            Claim { account, amount: tokens("50"), timestamp: 3_000 },
        ];

        let value = earned(&pool, &account, Amount::scaled(SCALE * U256::from(3)), 2_000).unwrap();
        // 2 tokens * 2 per token + 7 booked + 100 claimed before the evaluation time.
        assert_eq!(value.exact(), units("4000000000000000000") + U256::from(107));
    }

    #[test]
    fn test_earned_without_checkpoint_counts_claims_only() {
        let account = Address::repeat_byte(0xaa);
        let mut pool = empty_pool(Address::repeat_byte(1));
        pool.staking_balances.insert(account, tokens("2000000000000000000"));
        pool.claims = vec![Claim { account, amount: tokens("42"), timestamp: 1_100 }];

        let value = earned(&pool, &account, Amount::scaled(SCALE), 2_000).unwrap();
        assert_eq!(value, tokens("42"));
        let stranger = earned(&pool, &Address::ZERO, Amount::scaled(SCALE), 2_000).unwrap();
        assert_eq!(stranger, tokens("0"));
    }

    #[test]
    fn test_reward_per_token_below_paid_is_invalid() {
        let account = Address::repeat_byte(4);
        let mut pool = empty_pool(Address::repeat_byte(1));
        pool.staking_balances.insert(account, tokens("10"));
        pool.reward_checkpoints
            .insert(account, Checkpoint { amount: tokens("1"), amount_per_token_paid: rpt("5") });

        let err = earned(&pool, &account, rpt("4"), 1_500).unwrap_err();
        assert!(matches!(err, RewardsError::InvalidSnapshot { .. }));
    }

    #[test]
    fn test_account_earnings_covers_every_known_account() {
        let (a, b, c) = (Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3));
        let mut pool = empty_pool(Address::repeat_byte(9));
        pool.staking_balances.insert(a, tokens("1"));
        pool.reward_checkpoints
            .insert(b, Checkpoint { amount: tokens("5"), amount_per_token_paid: rpt("0") });
        pool.claims.push(Claim { account: c, amount: tokens("3"), timestamp: 0 });

        let earnings = account_earnings(&pool, 1_500).unwrap();
        assert_eq!(earnings.keys().copied().collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(earnings[&a], tokens("0"));
        assert_eq!(earnings[&b], tokens("5"));
        assert_eq!(earnings[&c], tokens("3"));
    }
}
