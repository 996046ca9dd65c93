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

//! Merkle commitment over a tranche allocation.
//!
//! Leaves are `keccak256(abi.encodePacked(account, amount))`. Leaves are sorted as bytes and
//! deduplicated, and each pair is hashed in sorted order, so the root depends only on the set of
//! allocations. An odd node at the end of a layer is promoted to the next layer unchanged. The
//! on-chain redeemer verifies proofs with the same sorted-pair rule.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::{
    allocation::AllocationMap,
    error::{Result, RewardsError},
};

/// Root of a tree without leaves.
pub const EMPTY_ROOT: B256 = B256::ZERO;

/// Leaf committing to `amount` base units for `account`.
pub fn leaf_hash(account: &Address, amount: U256) -> B256 {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(account.as_slice());
    packed[20..].copy_from_slice(&amount.to_be_bytes::<32>());
    keccak256(packed)
}

/// Parent of two nodes, independent of their order.
pub fn combined_hash(a: &B256, b: &B256) -> B256 {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut packed = [0u8; 64];
    packed[..32].copy_from_slice(first.as_slice());
    packed[32..].copy_from_slice(second.as_slice());
    keccak256(packed)
}

/// Check that `proof` leads from `leaf` to `root`.
pub fn verify(root: &B256, leaf: &B256, proof: &[B256]) -> bool {
    proof.iter().fold(*leaf, |node, sibling| combined_hash(&node, sibling)) == *root
}

/// Inclusion proof of one account's allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProof {
    pub account: Address,
    pub amount: U256,
    pub leaf: B256,
    pub proof: Vec<B256>,
}

/// A Merkle tree built once from a finalized [AllocationMap]. It only answers root and proof
/// queries; a new allocation needs a new tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Layers from the sorted leaves up to the root.
    layers: Vec<Vec<B256>>,
    leaves: BTreeMap<Address, (U256, B256)>,
}

impl MerkleTree {
    pub fn new(allocations: &AllocationMap) -> Self {
        Self::from_entries(allocations.iter().map(|(account, amount)| (*account, amount.exact())))
    }

    /// Build from raw `(account, base units)` entries in any order.
    pub fn from_entries(entries: impl IntoIterator<Item = (Address, U256)>) -> Self {
        let leaves: BTreeMap<Address, (U256, B256)> = entries
            .into_iter()
            .map(|(account, amount)| (account, (amount, leaf_hash(&account, amount))))
            .collect();

        let mut elements: Vec<B256> = leaves.values().map(|(_, leaf)| *leaf).collect();
        elements.sort();
        elements.dedup();

        let layers = build_layers(elements);
        tracing::debug!(
            "Built Merkle tree with {} leaves and {} layers",
            leaves.len(),
            layers.len()
        );
        Self { layers, leaves }
    }

    /// The root hash, or [EMPTY_ROOT] when there are no leaves.
    pub fn root(&self) -> B256 {
        self.layers.last().and_then(|layer| layer.first()).copied().unwrap_or(EMPTY_ROOT)
    }

    /// Number of committed accounts.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.leaves.keys()
    }

    pub fn leaf(&self, account: &Address) -> Result<B256> {
        self.leaves
            .get(account)
            .map(|(_, leaf)| *leaf)
            .ok_or(RewardsError::AccountNotFound(*account))
    }

    /// Sibling hashes from the account's leaf up to the root. Levels where the node was promoted
    /// without a sibling contribute nothing.
    pub fn proof(&self, account: &Address) -> Result<Vec<B256>> {
        let leaf = self.leaf(account)?;
        let mut index = self
            .layers
            .first()
            .and_then(|leaves| leaves.binary_search(&leaf).ok())
            .ok_or(RewardsError::AccountNotFound(*account))?;

        let mut proof = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let pair = if index % 2 == 0 { index + 1 } else { index - 1 };
            if let Some(sibling) = layer.get(pair) {
                proof.push(*sibling);
            }
            index /= 2;
        }
        Ok(proof)
    }

    pub fn claim(&self, account: &Address) -> Result<AccountProof> {
        let (amount, leaf) =
            self.leaves.get(account).copied().ok_or(RewardsError::AccountNotFound(*account))?;
        Ok(AccountProof { account: *account, amount, leaf, proof: self.proof(account)? })
    }
}

fn build_layers(leaves: Vec<B256>) -> Vec<Vec<B256>> {
    if leaves.is_empty() {
        return Vec::new();
    }

    let mut layers = vec![leaves];
    loop {
        let current = &layers[layers.len() - 1];
        if current.len() <= 1 {
            break;
        }
        let next: Vec<B256> = current
            .chunks(2)
            .map(|pair| match pair {
                [first, second] => combined_hash(first, second),
                _ => pair[0],
            })
            .collect();
        layers.push(next);
    }
    layers
}
