// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reconstruction orchestrator and feasibility analyzer.
//!
//! Grounded on the teacher's `pipeline.rs::Pipeline` orchestration
//! shape (validate config, delegate to sub-components in sequence,
//! return a structured result) and on
//! `original_source/reconstruct.py::reconstruct_file` for the exact
//! decrypt-then-verify step ordering.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::aead::{self, AeadError};
use crate::manifest::Manifest;
use crate::options::{ReconstructOptions, VerifyOptions};
use crate::report::{ReconstructionReport, ShardDetail};
use crate::rs::RsCodec;
use crate::shards::{self, LoadedShard};
use crate::ReconstructError;

/// Pure feasibility check over `{available_indices, k, n}`, with no
/// shard I/O -- used both by callers wanting a pre-flight view and by
/// step 2 of [`reconstruct_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feasibility {
    pub feasible: bool,
    pub available: usize,
    pub required: usize,
    pub total: usize,
    pub missing_indices: Vec<u32>,
    pub redundancy_margin: i64,
    pub fast_path: bool,
}

/// Analyze whether reconstruction is feasible from a set of available
/// shard indices, without decoding.
pub fn analyze_feasibility(available_indices: &[u32], k: usize, n: usize) -> Feasibility {
    let available_set: std::collections::HashSet<u32> = available_indices.iter().copied().collect();
    let missing_indices: Vec<u32> = (0..n as u32).filter(|i| !available_set.contains(i)).collect();
    let fast_path = (0..k as u32).all(|i| available_set.contains(&i));

    Feasibility {
        feasible: available_indices.len() >= k,
        available: available_indices.len(),
        required: k,
        total: n,
        missing_indices,
        redundancy_margin: available_indices.len() as i64 - k as i64,
        fast_path,
    }
}

/// Parse and structurally validate a manifest, optionally hash-checking
/// shards against a directory. Used by the `verify` CLI command.
pub fn verify_manifest(manifest: &Manifest, options: &VerifyOptions) -> Result<ReconstructionReport, ReconstructError> {
    manifest.validate()?;

    let k = manifest.rs.data_shards as usize;
    let n = manifest.rs.total_shards as usize;
    let descriptors = manifest.shards_by_index();

    let loaded: Vec<LoadedShard> = match &options.shard_dir {
        Some(dir) => shards::load_shards(&descriptors, dir),
        None => Vec::new(),
    };

    let available_indices: Vec<u32> = if loaded.is_empty() {
        descriptors.iter().map(|d| d.index).collect()
    } else {
        loaded.iter().filter(|s| s.valid).map(|s| s.index).collect()
    };
    let feasibility = analyze_feasibility(&available_indices, k, n);

    let shard_details: Vec<ShardDetail> = descriptors
        .iter()
        .map(|d| {
            let loaded_entry = loaded.iter().find(|l| l.index == d.index);
            ShardDetail {
                index: d.index,
                path: d.path.clone(),
                valid: loaded_entry.map(|l| l.valid).unwrap_or(true),
                error: loaded_entry.and_then(|l| l.error.as_ref()).map(|e| e.to_string()),
            }
        })
        .collect();

    let shards_valid = shard_details.iter().filter(|s| s.valid).count();

    Ok(ReconstructionReport {
        success: true,
        feasible: feasibility.feasible,
        original_size: manifest.original_size_bytes,
        reconstructed_size: None,
        original_hash: manifest.original_hash.clone(),
        reconstructed_hash: None,
        hash_verified: false,
        decrypted: false,
        shards_required: manifest.rs.data_shards,
        shards_available: feasibility.available,
        shards_valid,
        rs_errors_corrected: 0,
        shard_details,
        error: None,
    })
}

/// Run the full reconstruction pipeline described in `spec.md` §4.5:
/// load and hash-check shards, check feasibility, decode, optionally
/// decrypt, optionally verify the whole-file hash, and return both the
/// plaintext and a structured report.
///
/// On any fatal error the report still carries the error kind for
/// diagnostics, but no plaintext is returned -- per the propagation
/// policy, only per-shard errors are tolerated while feasibility
/// remains.
pub fn reconstruct_file(
    manifest: &Manifest,
    options: &ReconstructOptions,
) -> Result<(Vec<u8>, ReconstructionReport), ReconstructError> {
    manifest.validate()?;

    let k = manifest.rs.data_shards as usize;
    let n = manifest.rs.total_shards as usize;
    let descriptors = manifest.shards_by_index();

    // Step 1: load and hash-check every shard.
    let loaded = shards::load_shards(&descriptors, &options.shard_dir);
    let shard_details: Vec<ShardDetail> = loaded
        .iter()
        .map(|l| ShardDetail {
            index: l.index,
            path: l.path.to_string_lossy().into_owned(),
            valid: l.valid,
            error: l.error.as_ref().map(|e| e.to_string()),
        })
        .collect();

    let valid: Vec<&LoadedShard> = loaded.iter().filter(|l| l.valid).collect();
    let available_indices: Vec<u32> = valid.iter().map(|l| l.index).collect();

    // Step 2: feasibility.
    let feasibility = analyze_feasibility(&available_indices, k, n);
    if !feasibility.feasible {
        let err = ReconstructError::Infeasible {
            need: k,
            have: valid.len(),
        };
        error!(%err, "reconstruction infeasible");
        return Err(fatal_with_report(
            err,
            manifest,
            feasibility.available,
            valid.len(),
            shard_details,
        ));
    }
    info!(available = valid.len(), required = k, fast_path = feasibility.fast_path, "feasibility confirmed");

    // Step 3: shard size agreement.
    let shard_size = match valid.first().and_then(|s| s.bytes.as_ref()).map(|b| b.len()) {
        Some(size) => size,
        None => {
            let err = ReconstructError::Infeasible { need: k, have: 0 };
            return Err(fatal_with_report(err, manifest, feasibility.available, 0, shard_details));
        }
    };
    if valid
        .iter()
        .any(|s| s.bytes.as_ref().map(|b| b.len()) != Some(shard_size))
    {
        let err = ReconstructError::ShardSizeMismatch;
        error!(%err, "shard sizes disagree");
        return Err(fatal_with_report(
            err,
            manifest,
            feasibility.available,
            valid.len(),
            shard_details,
        ));
    }

    // Step 4: RS decode.
    let codec = RsCodec::new(k, n).map_err(ReconstructError::Rs)?;
    let shard_map: BTreeMap<usize, Vec<u8>> = valid
        .iter()
        .map(|s| (s.index as usize, s.bytes.clone().unwrap_or_default()))
        .collect();
    let outcome = codec
        .decode(&shard_map, manifest.original_size_bytes as usize)
        .map_err(|e| {
            error!(error = %e, "rs decode failed");
            e
        })
        .map_err(ReconstructError::Rs)?;
    let mut post_rs = outcome.plaintext;

    // Step 5/6: optional decryption.
    let mut decrypted = false;
    if let Some(enc) = &manifest.encryption {
        if enc.algorithm != "aes-256-gcm" {
            let err = ReconstructError::UnsupportedCipher(enc.algorithm.clone());
            error!(%err, "unsupported cipher");
            return Err(fatal_with_report(
                err,
                manifest,
                feasibility.available,
                valid.len(),
                shard_details,
            ));
        }

        let key_hex = options.key_hex.as_deref().ok_or_else(|| {
            let err = ReconstructError::Aead(AeadError::InvalidKeyLength(0));
            error!(%err, "decryption key required but not supplied");
            fatal_with_report(err, manifest, feasibility.available, valid.len(), shard_details.clone())
        })?;
        let key = hex::decode(key_hex).map_err(|_| {
            ReconstructError::ManifestInvalid("key-hex is not valid hex".to_string())
        })?;
        let iv = hex::decode(&enc.iv).map_err(|_| {
            ReconstructError::ManifestInvalid("encryption.iv is not valid hex".to_string())
        })?;
        let tag = enc
            .tag
            .as_deref()
            .map(hex::decode)
            .transpose()
            .map_err(|_| ReconstructError::ManifestInvalid("encryption.tag is not valid hex".to_string()))?;

        // With no separate tag, the trailing `aead::TAG_LEN` bytes of the
        // post-RS plaintext are assumed to be the tag. A payload shorter
        // than that is a malformed manifest/shard set, not a decryption
        // failure.
        if tag.is_none() && post_rs.len() < aead::TAG_LEN {
            let err = ReconstructError::ManifestInvalid(
                "ciphertext shorter than the GCM tag and manifest supplies no separate tag".to_string(),
            );
            error!(%err, "manifest invalid");
            return Err(fatal_with_report(
                err,
                manifest,
                feasibility.available,
                valid.len(),
                shard_details,
            ));
        }

        post_rs = aead::open(&post_rs, &key, &iv, tag.as_deref())
            .map_err(|e| {
                error!(error = %e, "decryption failed");
                e
            })
            .map_err(|e| {
                fatal_with_report(
                    ReconstructError::Aead(e),
                    manifest,
                    feasibility.available,
                    valid.len(),
                    shard_details.clone(),
                )
            })?;
        decrypted = true;
    }

    let plaintext = post_rs;

    // Step 7: optional whole-file hash verification.
    let mut hash_verified = false;
    let reconstructed_hash = hex::encode(Sha256::digest(&plaintext));
    if options.verify_hash {
        if let Some(expected) = &manifest.original_hash {
            if expected.eq_ignore_ascii_case(&reconstructed_hash) {
                hash_verified = true;
            } else {
                warn!(expected = %expected, actual = %reconstructed_hash, "reconstructed hash mismatch");
                let err = ReconstructError::ReconstructedHashMismatch;
                return Err(fatal_with_report(
                    err,
                    manifest,
                    feasibility.available,
                    valid.len(),
                    shard_details,
                ));
            }
        }
    }

    info!(
        reconstructed_size = plaintext.len(),
        decrypted,
        hash_verified,
        corrected_errors = outcome.corrected_errors,
        "reconstruction succeeded"
    );

    let report = ReconstructionReport {
        success: true,
        feasible: true,
        original_size: manifest.original_size_bytes,
        reconstructed_size: Some(plaintext.len() as u64),
        original_hash: manifest.original_hash.clone(),
        reconstructed_hash: Some(reconstructed_hash),
        hash_verified,
        decrypted,
        shards_required: manifest.rs.data_shards,
        shards_available: feasibility.available,
        shards_valid: valid.len(),
        rs_errors_corrected: outcome.corrected_errors,
        shard_details,
        error: None,
    };

    Ok((plaintext, report))
}

/// Build the diagnostic report for a failed run and log the error,
/// returning `err` unchanged so call sites can use this inline in a
/// `return Err(...)`.
fn fatal_with_report(
    err: ReconstructError,
    manifest: &Manifest,
    shards_available: usize,
    shards_valid: usize,
    shard_details: Vec<ShardDetail>,
) -> ReconstructError {
    let report = ReconstructionReport {
        success: false,
        feasible: shards_valid >= manifest.rs.data_shards as usize,
        original_size: manifest.original_size_bytes,
        reconstructed_size: None,
        original_hash: manifest.original_hash.clone(),
        reconstructed_hash: None,
        hash_verified: false,
        decrypted: false,
        shards_required: manifest.rs.data_shards,
        shards_available,
        shards_valid,
        rs_errors_corrected: 0,
        shard_details,
        error: Some(err.to_string()),
    };
    if let Ok(json) = report.to_json() {
        tracing::debug!(report = %json, "reconstruction failed");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feasibility_fast_path_detection() {
        let f = analyze_feasibility(&[0, 1, 2], 3, 5);
        assert!(f.feasible);
        assert!(f.fast_path);
        assert_eq!(f.redundancy_margin, 0);
    }

    #[test]
    fn feasibility_missing_indices() {
        let f = analyze_feasibility(&[0, 2], 3, 5);
        assert!(!f.feasible);
        assert_eq!(f.missing_indices, vec![1, 3, 4]);
    }

    #[test]
    fn feasibility_monotonicity() {
        let without = analyze_feasibility(&[1, 3], 3, 5);
        let with = analyze_feasibility(&[1, 3, 4], 3, 5);
        assert!(!without.feasible);
        assert!(with.feasible);
    }
}
