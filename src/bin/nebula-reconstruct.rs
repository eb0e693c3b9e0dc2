// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Break-glass recovery CLI: `verify` a manifest/shard set for
//! feasibility, or `rebuild` the original file from it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nebula_reconstruct::{manifest::Manifest, options::{ReconstructOptions, VerifyOptions}, reconstruct};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nebula-reconstruct", version, about = "Reconstruct a file from erasure-coded shards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check manifest structure and shard feasibility without decoding.
    Verify {
        /// Path to the manifest JSON file.
        manifest: PathBuf,

        /// Shard directory, for hash verification. If omitted, only
        /// manifest structure and the Merkle tree are checked.
        #[arg(long)]
        shard_dir: Option<PathBuf>,

        /// Emit the report as pretty-printed JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Reconstruct the original file from a manifest and shard directory.
    Rebuild {
        /// Path to the manifest JSON file.
        manifest: PathBuf,

        /// Directory containing shard files.
        #[arg(long)]
        shard_dir: PathBuf,

        /// Output path for the reconstructed file.
        #[arg(long)]
        out: PathBuf,

        /// Hex-encoded AES-256-GCM key, required if the manifest
        /// declares an `encryption` section.
        #[arg(long)]
        key_hex: Option<String>,

        /// Skip whole-file hash verification against `original_hash`.
        #[arg(long)]
        no_verify_hash: bool,

        /// Emit the report as pretty-printed JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Verify { manifest, shard_dir, json } => {
            let manifest = Manifest::load(&manifest)?;
            let mut options = VerifyOptions::new();
            if let Some(dir) = shard_dir {
                options = options.with_shard_dir(dir);
            }
            let report = reconstruct::verify_manifest(&manifest, &options)?;
            print_report(&report, json)?;
            Ok(exit_code_for(report.feasible))
        }
        Command::Rebuild {
            manifest,
            shard_dir,
            out,
            key_hex,
            no_verify_hash,
            json,
        } => {
            let manifest = Manifest::load(&manifest)?;
            let mut options = ReconstructOptions::new(shard_dir).with_verify_hash(!no_verify_hash);
            if let Some(key) = key_hex {
                options = options.with_key_hex(key);
            }

            match reconstruct::reconstruct_file(&manifest, &options) {
                Ok((plaintext, report)) => {
                    std::fs::write(&out, &plaintext)?;
                    print_report(&report, json)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("reconstruction failed: {err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn print_report(report: &nebula_reconstruct::report::ReconstructionReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!(
            "feasible={} shards_available={}/{} valid={} rs_errors_corrected={} decrypted={} hash_verified={}",
            report.feasible,
            report.shards_available,
            report.shards_required,
            report.shards_valid,
            report.rs_errors_corrected,
            report.decrypted,
            report.hash_verified,
        );
    }
    Ok(())
}

fn exit_code_for(feasible: bool) -> ExitCode {
    if feasible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
