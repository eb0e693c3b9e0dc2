// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shard loading and integrity checking.
//!
//! Synchronous, `std::fs`-based -- the teacher crate's `LocalStorage`
//! is `tokio`-async and backend-pluggable, but shard transport is out
//! of scope here (`spec.md` declares it a collaborator); the core only
//! needs to read a fixed path relative to a caller-supplied directory.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::manifest::ShardDescriptor;

/// What went wrong loading a single shard, if anything.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ShardLoadError {
    MissingFile,
    HashMismatch,
}

impl std::fmt::Display for ShardLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardLoadError::MissingFile => write!(f, "shard file missing"),
            ShardLoadError::HashMismatch => write!(f, "shard hash mismatch"),
        }
    }
}

/// The outcome of attempting to load and verify one shard.
#[derive(Debug, Clone)]
pub struct LoadedShard {
    pub index: u32,
    pub path: PathBuf,
    pub expected_hash: String,
    pub actual_hash: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub valid: bool,
    pub error: Option<ShardLoadError>,
}

/// Load and hash-check every shard descriptor in the manifest's order,
/// resolving `path` against `shard_dir`.
///
/// Per-shard errors (missing file, hash mismatch) do not short-circuit
/// the loop -- every descriptor is attempted so the caller can report
/// on all of them and decide feasibility from the aggregate.
pub fn load_shards(descriptors: &[&ShardDescriptor], shard_dir: &Path) -> Vec<LoadedShard> {
    descriptors
        .iter()
        .map(|descriptor| load_one(descriptor, shard_dir))
        .collect()
}

fn load_one(descriptor: &ShardDescriptor, shard_dir: &Path) -> LoadedShard {
    let path = shard_dir.join(&descriptor.path);

    match std::fs::read(&path) {
        Ok(bytes) => {
            let actual_hash = hex::encode(Sha256::digest(&bytes));
            let valid = actual_hash.eq_ignore_ascii_case(&descriptor.hash);
            if !valid {
                warn!(index = descriptor.index, path = %path.display(), "shard hash mismatch");
            } else {
                debug!(index = descriptor.index, "shard verified");
            }
            LoadedShard {
                index: descriptor.index,
                path,
                expected_hash: descriptor.hash.clone(),
                actual_hash: Some(actual_hash),
                bytes: Some(bytes),
                valid,
                error: if valid {
                    None
                } else {
                    Some(ShardLoadError::HashMismatch)
                },
            }
        }
        Err(_) => {
            warn!(index = descriptor.index, path = %path.display(), "shard file missing");
            LoadedShard {
                index: descriptor.index,
                path,
                expected_hash: descriptor.hash.clone(),
                actual_hash: None,
                bytes: None,
                valid: false,
                error: Some(ShardLoadError::MissingFile),
            }
        }
    }
}
