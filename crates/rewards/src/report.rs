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

//! Externally consumed report structures and their file locations.

use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{Address, B256, U256};
use serde::{
    de::{DeserializeOwned, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    allocation::AllocationMap,
    amount::{parse_units, Amount},
    error::{Result, RewardsError},
    ledger::u256_dec,
    merkle::AccountProof,
    tranche::TrancheWindow,
};

/// Rewards in report order: descending by amount, then by account.
///
/// Serialized as a JSON object whose key order is the report order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortedRewards(pub Vec<(Address, String)>);

impl Serialize for SortedRewards {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (account, amount) in &self.0 {
            map.serialize_entry(account, amount)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SortedRewards {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RewardsVisitor;

        impl<'de> Visitor<'de> for RewardsVisitor {
            type Value = SortedRewards;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of account to reward amount")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<Address, String>()? {
                    entries.push(entry);
                }
                Ok(SortedRewards(entries))
            }
        }

        deserializer.deserialize_map(RewardsVisitor)
    }
}

/// Earnings of the staking token that the rewards were split by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsBreakdown {
    /// account -> pool -> earnings within the tranche.
    pub per_staker_per_pool: BTreeMap<Address, BTreeMap<Address, String>>,
    pub total_per_pool_at_start: BTreeMap<Address, String>,
    pub total_per_pool_at_end: BTreeMap<Address, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrancheReport {
    pub tranche: TrancheWindow,
    pub token_address: Address,
    pub total_rewards: String,
    pub rewards: SortedRewards,
    pub mta_earnings: EarningsBreakdown,
}

/// Allocation of one tranche, keyed by account, at the token's full precision.
///
/// This is the input of the Merkle stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimReport(pub BTreeMap<Address, String>);

impl ClaimReport {
    pub fn from_allocations(allocations: &AllocationMap) -> Self {
        Self(allocations.iter().map(|(account, amount)| (*account, amount.format(None))).collect())
    }

    /// Load a claim report, failing with [RewardsError::MissingReportArtifact] if absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RewardsError::MissingReportArtifact(path.to_path_buf()));
        }
        read_json(path)
    }

    pub fn to_allocation_map(&self, decimals: u8) -> Result<AllocationMap> {
        let entries = self
            .0
            .iter()
            .map(|(account, amount)| {
                Ok((*account, Amount::new(parse_units(amount, decimals)?, decimals)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        AllocationMap::new(entries, decimals)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalAllocation {
    /// Base units.
    #[serde(with = "u256_dec")]
    pub exact: U256,
    /// Decimal string at the token's decimals.
    pub simple: String,
}

/// Summary of a Merkle tree published for one tranche and token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleArtifact {
    pub root_hash: B256,
    pub tranche_number: u64,
    pub token_address: Address,
    pub accounts: usize,
    pub total_allocation: TotalAllocation,
}

/// Proof an account submits to redeem its allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimProof {
    pub account: Address,
    pub tranche_number: u64,
    #[serde(with = "u256_dec")]
    pub allocation: U256,
    pub proof: Vec<B256>,
}

impl ClaimProof {
    pub fn new(tranche_number: u64, proof: AccountProof) -> Self {
        Self {
            account: proof.account,
            tranche_number,
            allocation: proof.amount,
            proof: proof.proof,
        }
    }
}

pub fn tranche_dir(root: &Path, tranche_number: u64) -> PathBuf {
    root.join(tranche_number.to_string())
}

/// `<root>/<tranche>/<token>.json`
pub fn report_path(root: &Path, tranche_number: u64, token: &Address) -> PathBuf {
    tranche_dir(root, tranche_number).join(format!("{token}.json"))
}

/// `<root>/<tranche>/<token>.claims.json`
pub fn claim_report_path(root: &Path, tranche_number: u64, token: &Address) -> PathBuf {
    tranche_dir(root, tranche_number).join(format!("{token}.claims.json"))
}

/// `<root>/<tranche>/<token>.merkle.json`
pub fn merkle_artifact_path(root: &Path, tranche_number: u64, token: &Address) -> PathBuf {
    tranche_dir(root, tranche_number).join(format!("{token}.merkle.json"))
}

/// `<root>/<tranche>/<token>.proofs.json`
pub fn proofs_path(root: &Path, tranche_number: u64, token: &Address) -> PathBuf {
    tranche_dir(root, tranche_number).join(format!("{token}.proofs.json"))
}

/// Serialize `value` fully before touching the file, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tranche::TrancheBoundary;

    fn window() -> TrancheWindow {
        TrancheWindow {
            number: 4,
            start: TrancheBoundary { block_number: 10_700_000, timestamp: 1_597_061_555 },
            end: TrancheBoundary { block_number: 10_745_000, timestamp: 1_597_666_355 },
        }
    }

    #[test]
    fn test_report_keeps_reward_order() {
        let report = TrancheReport {
            tranche: window(),
            token_address: Address::repeat_byte(0x11),
            total_rewards: "30.0".into(),
            rewards: SortedRewards(vec![
                (Address::with_last_byte(2), "20.0".into()),
                (Address::with_last_byte(1), "10.0".into()),
            ]),
            mta_earnings: EarningsBreakdown::default(),
        };
        let json = serde_json::to_string(&report).unwrap();
        let second = json.find("0x0000000000000000000000000000000000000002").unwrap();
        let first = json.find("0x0000000000000000000000000000000000000001").unwrap();
        assert!(second < first);
        assert!(json.contains("\"tokenAddress\""));
        assert!(json.contains("\"perStakerPerPool\""));
        assert!(json.contains("\"blockNumber\":10700000"));

        let decoded: TrancheReport = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_missing_claim_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = claim_report_path(dir.path(), 4, &Address::repeat_byte(0x11));
        let err = ClaimReport::load(&path).unwrap_err();
        assert!(matches!(err, RewardsError::MissingReportArtifact(p) if p == path));
    }

    #[test]
    fn test_claim_report_to_allocations() {
        let dir = tempfile::tempdir().unwrap();
        let path = claim_report_path(dir.path(), 4, &Address::repeat_byte(0x11));
        let report = ClaimReport(
            [
                (Address::with_last_byte(1), "1000.0".to_string()),
                (Address::with_last_byte(2), "0.000000000000000001".to_string()),
                (Address::with_last_byte(3), "0.0".to_string()),
            ]
            .into(),
        );
        write_json(&path, &report).unwrap();

        let allocations = ClaimReport::load(&path).unwrap().to_allocation_map(18).unwrap();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations.get(&Address::with_last_byte(2)).unwrap().exact(), U256::from(1));
    }

    #[test]
    fn test_claim_report_rejects_bad_amounts() {
        let report = ClaimReport([(Address::with_last_byte(1), "1e18".to_string())].into());
        assert!(matches!(
            report.to_allocation_map(18),
            Err(RewardsError::InvalidNumericFormat(_))
        ));
    }

    #[test]
    fn test_claim_proof_encoding() {
        let proof = ClaimProof {
            account: Address::with_last_byte(1),
            tranche_number: 4,
            allocation: U256::from(10).pow(U256::from(21)),
            proof: vec![B256::repeat_byte(0xab)],
        };
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["trancheNumber"], 4);
        assert_eq!(value["allocation"], "1000000000000000000000");
        assert_eq!(value["proof"][0], format!("0x{}", "ab".repeat(32)));
    }
}
