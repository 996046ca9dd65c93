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

use std::path::PathBuf;

use alloy_primitives::{Address, U256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewardsError {
    #[error("Invalid numeric format: {0:?}")]
    InvalidNumericFormat(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic out of range: {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Decimals mismatch: {left} vs {right}")]
    DecimalsMismatch { left: u8, right: u8 },

    #[error("Account {0} not found in allocation")]
    AccountNotFound(Address),

    #[error("Report artifact missing at {}", .0.display())]
    MissingReportArtifact(PathBuf),

    #[error("Invalid snapshot for pool {pool}: {reason}")]
    InvalidSnapshot { pool: Address, reason: String },

    #[error("Earnings decreased for account {account} in pool {pool}: start {start}, end {end}")]
    NonMonotonicEarnings { pool: Address, account: Address, start: U256, end: U256 },

    #[error("No reward budget configured for pool {0}")]
    MissingPoolBudget(Address),

    #[error("Invalid tranche window: {0}")]
    InvalidTranche(String),

    #[error("IO error {0:?}")]
    Io(#[from] std::io::Error),

    #[error("JSON error {0:?}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error {0:?}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = RewardsError> = std::result::Result<T, E>;
