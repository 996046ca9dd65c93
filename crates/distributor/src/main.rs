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

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tranche_rewards::{
    build_merkle, claim_proofs, compute_tranche, load_pool_pages,
    report::{self, write_json},
    ClaimProof, ClaimReport, TrancheConfig,
};

/// Arguments of the tranche distributor.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// Whether to log in JSON format.
    #[clap(long, env, global = true, default_value_t = false)]
    log_json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the rewards of a tranche and write its report and claim report.
    Report(ReportArgs),
    /// Build the Merkle tree of a tranche from its claim report.
    Merkle(MerkleArgs),
    /// Print the claim proof of one account.
    Proof(ProofArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Path to the tranche configuration YAML.
    #[clap(long, env = "TRANCHE_CONFIG")]
    config: PathBuf,
    /// JSON array of pool pages recorded at the tranche start block.
    ///
    /// When omitted, no pool had activity before the tranche.
    #[clap(long)]
    start: Option<PathBuf>,
    /// JSON array of pool pages recorded at the tranche end block.
    #[clap(long)]
    end: PathBuf,
    /// Directory that receives `<tranche>/<token>.json` and `<tranche>/<token>.claims.json`.
    #[clap(long, env = "REPORTS_DIR", default_value = "reports")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct MerkleArgs {
    /// Path to the tranche configuration YAML.
    #[clap(long, env = "TRANCHE_CONFIG")]
    config: PathBuf,
    /// Directory holding the claim report of the tranche.
    #[clap(long, env = "REPORTS_DIR", default_value = "reports")]
    reports_dir: PathBuf,
}

#[derive(Args, Debug)]
struct ProofArgs {
    /// Path to the tranche configuration YAML.
    #[clap(long, env = "TRANCHE_CONFIG")]
    config: PathBuf,
    /// Directory holding the claim report of the tranche.
    #[clap(long, env = "REPORTS_DIR", default_value = "reports")]
    reports_dir: PathBuf,
    /// Account to prove.
    account: Address,
}

fn main() -> Result<()> {
    let args = MainArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    // Logs go to stderr so that stdout carries only command output.
    if args.log_json {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = run(&args.command);
    if let Err(e) = &result {
        tracing::error!("FATAL: {:?}", e);
    }
    result
}

fn run(command: &Command) -> Result<()> {
    match command {
        Command::Report(args) => run_report(args),
        Command::Merkle(args) => run_merkle(args),
        Command::Proof(args) => {
            let proof = run_proof(args)?;
            println!("{}", serde_json::to_string_pretty(&proof)?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<TrancheConfig> {
    TrancheConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn run_report(args: &ReportArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let start_pages = match &args.start {
        Some(path) => load_pool_pages(path)
            .with_context(|| format!("Failed to load start pages from {}", path.display()))?,
        None => Default::default(),
    };
    let end_pages = load_pool_pages(&args.end)
        .with_context(|| format!("Failed to load end pages from {}", args.end.display()))?;

    let outcome = compute_tranche(&config, &start_pages, &end_pages)
        .with_context(|| format!("Failed to compute tranche {}", config.tranche.number))?;
    let tranche_report = outcome.report(config.display_precision)?;
    let claim_report = outcome.claim_report();

    let number = config.tranche.number;
    let token = config.token.address;
    let report_path = report::report_path(&args.out_dir, number, &token);
    let claims_path = report::claim_report_path(&args.out_dir, number, &token);
    write_json(&report_path, &tranche_report)?;
    write_json(&claims_path, &claim_report)?;

    tracing::info!(
        "Wrote tranche {} report for {} accounts to {}",
        number,
        claim_report.0.len(),
        report_path.display()
    );
    Ok(())
}

fn load_claims(config: &TrancheConfig, reports_dir: &Path) -> Result<ClaimReport> {
    let path = report::claim_report_path(reports_dir, config.tranche.number, &config.token.address);
    Ok(ClaimReport::load(&path)?)
}

fn run_merkle(args: &MerkleArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let number = config.tranche.number;
    let token = config.token.address;

    let allocations =
        load_claims(&config, &args.reports_dir)?.to_allocation_map(config.token.decimals)?;
    let (tree, artifact) = build_merkle(number, token, &allocations)?;
    let proofs = claim_proofs(&tree, number)?;

    let artifact_path = report::merkle_artifact_path(&args.reports_dir, number, &token);
    write_json(&artifact_path, &artifact)?;
    write_json(&report::proofs_path(&args.reports_dir, number, &token), &proofs)?;

    tracing::info!("Wrote Merkle artifact to {}", artifact_path.display());
    Ok(())
}

fn run_proof(args: &ProofArgs) -> Result<ClaimProof> {
    let config = load_config(&args.config)?;
    let number = config.tranche.number;

    let allocations =
        load_claims(&config, &args.reports_dir)?.to_allocation_map(config.token.decimals)?;
    let (tree, artifact) = build_merkle(number, config.token.address, &allocations)?;
    let claim = tree.claim(&args.account)?;
    tracing::debug!("Proof of {} against root {}", args.account, artifact.root_hash);
    Ok(ClaimProof::new(number, claim))
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;
    use tranche_rewards::{leaf_hash, report::read_json, verify, MerkleArtifact, RewardsError};

    use super::*;

    const CONFIG: &str = r#"
tranche:
  number: 2
  start: { blockNumber: 100, timestamp: 1000000 }
  end: { blockNumber: 200, timestamp: 1604800 }
token:
  address: "0x00000000000000000000000000000000000000ee"
pools:
  - pool: "0x0000000000000000000000000000000000000001"
    budget: "90"
"#;

    const END_PAGES: &str = r#"[{
        "id": "0x0000000000000000000000000000000000000001",
        "lastUpdateTime": 1604800,
        "periodFinish": 1604800,
        "rewardRate": "0",
        "rewardPerTokenStored": "0",
        "totalSupply": "3",
        "stakingRewards": [
            {
                "account": "0x00000000000000000000000000000000000000a1",
                "amount": "1",
                "amountPerTokenPaid": "0"
            },
            {
                "account": "0x00000000000000000000000000000000000000a2",
                "amount": "3",
                "amountPerTokenPaid": "0"
            }
        ]
    }]"#;

    fn setup(dir: &Path) -> (PathBuf, PathBuf) {
        let config = dir.join("tranche.yaml");
        let end = dir.join("end.json");
        std::fs::write(&config, CONFIG).unwrap();
        std::fs::write(&end, END_PAGES).unwrap();
        (config, end)
    }

    #[test]
    #[traced_test]
    fn test_report_then_merkle_then_proof() {
        let dir = tempfile::tempdir().unwrap();
        let (config, end) = setup(dir.path());
        let reports_dir = dir.path().join("reports");

        run(&Command::Report(ReportArgs {
            config: config.clone(),
            start: None,
            end,
            out_dir: reports_dir.clone(),
        }))
        .unwrap();
        assert!(logs_contain("Wrote tranche 2 report for 2 accounts"));

        run(&Command::Merkle(MerkleArgs {
            config: config.clone(),
            reports_dir: reports_dir.clone(),
        }))
        .unwrap();
        let token = Address::with_last_byte(0xee);
        let artifact: MerkleArtifact =
            read_json(&report::merkle_artifact_path(&reports_dir, 2, &token)).unwrap();
        assert_eq!(artifact.accounts, 2);
        assert_eq!(artifact.total_allocation.simple, "90.0");

        let account = Address::with_last_byte(0xa2);
        let proof = run_proof(&ProofArgs { config, reports_dir, account }).unwrap();
        assert_eq!(proof.allocation.to_string(), "67500000000000000000");
        let leaf = leaf_hash(&account, proof.allocation);
        assert!(verify(&artifact.root_hash, &leaf, &proof.proof));
    }

    #[test]
    fn test_merkle_without_claim_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = setup(dir.path());
        let err = run(&Command::Merkle(MerkleArgs { config, reports_dir: dir.path().into() }))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RewardsError>(),
            Some(RewardsError::MissingReportArtifact(_))
        ));
    }
}
