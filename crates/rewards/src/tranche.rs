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

//! Tranche windows and netting of lifetime earnings into per-tranche earnings.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    error::{Result, RewardsError},
    snapshot::EarningsByAccount,
};

/// Nominal length of a tranche.
pub const TRANCHE_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// A point on chain delimiting a tranche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrancheBoundary {
    pub block_number: u64,
    pub timestamp: u64,
}

impl TrancheBoundary {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.timestamp).ok()?, 0)
    }

    /// RFC 3339 time of the boundary, or the raw timestamp when it is out of chrono's range.
    pub fn time_label(&self) -> String {
        match self.datetime() {
            Some(datetime) => datetime.to_rfc3339(),
            None => self.timestamp.to_string(),
        }
    }
}

/// A reward distribution period, nominally one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheWindow {
    pub number: u64,
    pub start: TrancheBoundary,
    pub end: TrancheBoundary,
}

impl TrancheWindow {
    pub fn new(number: u64, start: TrancheBoundary, end: TrancheBoundary) -> Result<Self> {
        let window = Self { number, start, end };
        window.validate()?;
        Ok(window)
    }

    /// Check that the window ends strictly after it starts.
    pub fn validate(&self) -> Result<()> {
        if self.end.timestamp <= self.start.timestamp {
            return Err(RewardsError::InvalidTranche(format!(
                "tranche {} ends at {} which is not after its start at {}",
                self.number, self.end.timestamp, self.start.timestamp
            )));
        }
        if self.end.block_number < self.start.block_number {
            return Err(RewardsError::InvalidTranche(format!(
                "tranche {} ends at block {} before its start block {}",
                self.number, self.end.block_number, self.start.block_number
            )));
        }
        if self.duration_secs() != TRANCHE_DURATION_SECS {
            tracing::warn!(
                "Tranche {} spans {}s from {} to {} instead of the usual {}s",
                self.number,
                self.duration_secs(),
                self.start.time_label(),
                self.end.time_label(),
                TRANCHE_DURATION_SECS
            );
        }
        Ok(())
    }

    pub fn duration_secs(&self) -> u64 {
        self.end.timestamp.saturating_sub(self.start.timestamp)
    }
}

/// Net-new earnings of each account present at the end of the tranche.
///
/// Accounts with an earnings entry at the start and a positive end value earn the difference.
/// Every other account is credited its whole end value, including accounts that first appear
/// during the tranche with claims already on record.
pub fn net_tranche_earnings(
    pool: Address,
    earnings_at_start: &EarningsByAccount,
    earnings_at_end: &EarningsByAccount,
) -> Result<EarningsByAccount> {
    let mut tranche = EarningsByAccount::new();
    for (account, end) in earnings_at_end {
        let amount = match earnings_at_start.get(account) {
            Some(start) if !end.is_zero() => net(pool, *account, *start, *end)?,
            Some(_) => *end,
            None => {
                if !end.is_zero() {
                    tracing::debug!(
                        "Account {} has no start entry in pool {}; crediting full end value {}",
                        account,
                        pool,
                        end
                    );
                }
                *end
            }
        };
        tranche.insert(*account, amount);
    }
    Ok(tranche)
}

fn net(pool: Address, account: Address, start: Amount, end: Amount) -> Result<Amount> {
    if end < start {
        return Err(RewardsError::NonMonotonicEarnings {
            pool,
            account,
            start: start.exact(),
            end: end.exact(),
        });
    }
    end.checked_sub(start)
}
