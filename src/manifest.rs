// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Manifest schema, structural validation, and Merkle verification.
//!
//! Mirrors the JSON shape produced by the reference encoder
//! (`nebula_reconstruct.manifest` in the original Python tool):
//! version tag, RS parameters, ordered shard descriptors, and optional
//! Merkle and encryption sections.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Manifest schema revision this crate understands.
pub const SUPPORTED_VERSION: &str = "nebula_reconstruct_v1";

/// Errors raised while loading or structurally validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized manifest version: {0}")]
    UnsupportedVersion(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHash(String),

    #[error("rs.data_shards + rs.parity_shards ({sum}) != rs.total_shards ({total})")]
    RsFieldMismatch { sum: u32, total: u32 },

    #[error("manifest declares {declared} shards but rs.data_shards requires at least {required}")]
    TooFewShardDescriptors { declared: usize, required: usize },

    #[error("duplicate shard index {0} in manifest")]
    DuplicateShardIndex(u32),

    #[error("shard index {index} out of bounds for total_shards={total}")]
    ShardIndexOutOfBounds { index: u32, total: u32 },

    #[error("computed Merkle root does not match manifest.merkle.root")]
    MerkleMismatch,
}

/// Top-level manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub hash_algorithm: String,
    pub original_size_bytes: u64,
    #[serde(default)]
    pub original_hash: Option<String>,
    pub rs: RsSection,
    pub shards: Vec<ShardDescriptor>,
    #[serde(default)]
    pub merkle: Option<MerkleSection>,
    #[serde(default)]
    pub encryption: Option<EncryptionSection>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RsSection {
    pub data_shards: u32,
    pub parity_shards: u32,
    pub total_shards: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub index: u32,
    pub path: String,
    pub hash: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleSection {
    pub algorithm: String,
    pub root: String,
    pub leaf_hashes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionSection {
    pub algorithm: String,
    pub iv: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl Manifest {
    /// Load and parse a manifest from disk without structural
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = std::fs::read(path)?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        Ok(manifest)
    }

    /// Structural validation per the manifest schema: required fields,
    /// `hash_algorithm == "sha256"`, `rs` arithmetic consistency, shard
    /// index bounds/uniqueness, and (if present) the Merkle root.
    ///
    /// `version` presence is enforced implicitly by serde (it is a
    /// required field); this additionally checks it is a version this
    /// revision recognizes.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version != SUPPORTED_VERSION {
            return Err(ManifestError::UnsupportedVersion(self.version.clone()));
        }

        if self.hash_algorithm != "sha256" {
            return Err(ManifestError::UnsupportedHash(self.hash_algorithm.clone()));
        }

        let sum = self.rs.data_shards + self.rs.parity_shards;
        if sum != self.rs.total_shards {
            return Err(ManifestError::RsFieldMismatch {
                sum,
                total: self.rs.total_shards,
            });
        }

        if self.shards.len() < self.rs.data_shards as usize {
            return Err(ManifestError::TooFewShardDescriptors {
                declared: self.shards.len(),
                required: self.rs.data_shards as usize,
            });
        }

        let mut seen = std::collections::HashSet::new();
        for shard in &self.shards {
            if shard.index >= self.rs.total_shards {
                return Err(ManifestError::ShardIndexOutOfBounds {
                    index: shard.index,
                    total: self.rs.total_shards,
                });
            }
            if !seen.insert(shard.index) {
                return Err(ManifestError::DuplicateShardIndex(shard.index));
            }
        }

        if let Some(merkle) = &self.merkle {
            if !merkle.root.is_empty() {
                let computed = compute_merkle_root(&merkle.leaf_hashes)
                    .ok_or(ManifestError::MerkleMismatch)?;
                if !computed.eq_ignore_ascii_case(&merkle.root) {
                    warn!(expected = %merkle.root, computed = %computed, "merkle root mismatch");
                    return Err(ManifestError::MerkleMismatch);
                }
            }
        }

        Ok(())
    }

    /// Shards in ascending index order (the order the report preserves).
    pub fn shards_by_index(&self) -> Vec<&ShardDescriptor> {
        let mut shards: Vec<&ShardDescriptor> = self.shards.iter().collect();
        shards.sort_by_key(|s| s.index);
        shards
    }
}

/// Compute a SHA-256 Merkle root over hex-encoded leaf hashes, hashing
/// the *raw* bytes of each pair, duplicating the last node at odd
/// layers. A single leaf is returned verbatim.
pub fn compute_merkle_root(leaf_hashes: &[String]) -> Option<String> {
    if leaf_hashes.is_empty() {
        return None;
    }

    let mut layer: Vec<Vec<u8>> = leaf_hashes
        .iter()
        .map(|h| hex::decode(h))
        .collect::<Result<_, _>>()
        .ok()?;

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            let last = layer.last().unwrap().clone();
            layer.push(last);
        }
        let mut next = Vec::with_capacity(layer.len() / 2);
        for pair in layer.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(&pair[0]);
            hasher.update(&pair[1]);
            next.push(hasher.finalize().to_vec());
        }
        layer = next;
    }

    Some(hex::encode(&layer[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        Manifest {
            version: SUPPORTED_VERSION.to_string(),
            hash_algorithm: "sha256".to_string(),
            original_size_bytes: 33,
            original_hash: None,
            rs: RsSection {
                data_shards: 3,
                parity_shards: 2,
                total_shards: 5,
            },
            shards: (0..5)
                .map(|i| ShardDescriptor {
                    index: i,
                    path: format!("shard_{i}.bin"),
                    hash: "0".repeat(64),
                    size_bytes: 11,
                })
                .collect(),
            merkle: None,
            encryption: None,
        }
    }

    #[test]
    fn valid_manifest_passes() {
        assert!(sample_manifest().validate().is_ok());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut m = sample_manifest();
        m.version = "v0".to_string();
        assert!(matches!(
            m.validate(),
            Err(ManifestError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn wrong_hash_algorithm_rejected() {
        let mut m = sample_manifest();
        m.hash_algorithm = "md5".to_string();
        assert!(matches!(
            m.validate(),
            Err(ManifestError::UnsupportedHash(_))
        ));
    }

    #[test]
    fn rs_field_mismatch_rejected() {
        let mut m = sample_manifest();
        m.rs.total_shards = 6;
        assert!(matches!(
            m.validate(),
            Err(ManifestError::RsFieldMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_index_rejected() {
        let mut m = sample_manifest();
        m.shards[1].index = 0;
        assert!(matches!(
            m.validate(),
            Err(ManifestError::DuplicateShardIndex(0))
        ));
    }

    #[test]
    fn out_of_bounds_index_rejected() {
        let mut m = sample_manifest();
        m.shards[0].index = 10;
        assert!(matches!(
            m.validate(),
            Err(ManifestError::ShardIndexOutOfBounds { index: 10, total: 5 })
        ));
    }

    #[test]
    fn merkle_single_leaf_is_verbatim() {
        let leaf = hex::encode(Sha256::digest(b"leaf"));
        assert_eq!(compute_merkle_root(&[leaf.clone()]), Some(leaf));
    }

    #[test]
    fn merkle_order_sensitive() {
        let a = hex::encode(Sha256::digest(b"a"));
        let b = hex::encode(Sha256::digest(b"b"));
        assert_ne!(
            compute_merkle_root(&[a.clone(), b.clone()]),
            compute_merkle_root(&[b, a])
        );
    }

    #[test]
    fn merkle_odd_layer_duplicates_last() {
        let a = hex::encode(Sha256::digest(b"a"));
        let b = hex::encode(Sha256::digest(b"b"));
        let c = hex::encode(Sha256::digest(b"c"));
        let three = compute_merkle_root(&[a.clone(), b.clone(), c.clone()]);
        let four = compute_merkle_root(&[a, b, c.clone(), c]);
        assert_eq!(three, four);
    }

    #[test]
    fn merkle_mismatch_detected() {
        let mut m = sample_manifest();
        let leaves: Vec<String> = (0..5)
            .map(|i| hex::encode(Sha256::digest(format!("shard{i}").as_bytes())))
            .collect();
        let root = compute_merkle_root(&leaves).unwrap();
        let mut tampered = leaves.clone();
        tampered[2] = hex::encode(Sha256::digest(b"tampered"));
        m.merkle = Some(MerkleSection {
            algorithm: "sha256".to_string(),
            root,
            leaf_hashes: tampered,
        });
        assert!(matches!(m.validate(), Err(ManifestError::MerkleMismatch)));
    }
}
