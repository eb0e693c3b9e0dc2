// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Nebula Reconstruct - break-glass erasure-coding recovery
//!
//! Given a manifest and a directory of shards, rebuild the original
//! file: verify shard integrity, check feasibility against the
//! systematic Reed-Solomon parameters, decode, optionally unwrap an
//! AES-256-GCM encryption layer, and optionally verify the whole-file
//! hash against the manifest. See [`reconstruct::reconstruct_file`] and
//! [`reconstruct::verify_manifest`] for the two entry points the CLI
//! drives.

use thiserror::Error;

pub mod aead;
pub mod encode;
pub mod gf256;
pub mod manifest;
pub mod options;
pub mod report;
pub mod reconstruct;
pub mod rs;
pub mod shards;

pub use manifest::Manifest;
pub use options::{ReconstructOptions, VerifyOptions};
pub use report::ReconstructionReport;
pub use reconstruct::{analyze_feasibility, reconstruct_file, verify_manifest, Feasibility};

use aead::AeadError;
use manifest::ManifestError;
use rs::RsError;

/// Top-level error taxonomy for a reconstruction or verification run.
/// Mirrors the per-row taxonomy in the specification's error handling
/// design, matching the style of the teacher's `FecError`.
#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Rs(#[from] RsError),

    #[error(transparent)]
    Aead(#[from] AeadError),

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("insufficient valid shards: have {have}, need {need}")]
    Infeasible { need: usize, have: usize },

    #[error("shards disagree on size")]
    ShardSizeMismatch,

    #[error("manifest declares an unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("reconstructed file's hash does not match manifest.original_hash")]
    ReconstructedHashMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconstructError>;
