// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reconstruction options, in the teacher's builder-method style
//! (`config.rs`'s `with_*` methods), scaled down to the handful of
//! knobs a break-glass recovery run actually has.

use std::path::PathBuf;

/// Options controlling one `reconstruct_file` run.
#[derive(Debug, Clone, Default)]
pub struct ReconstructOptions {
    /// Directory shard paths are resolved against.
    pub shard_dir: PathBuf,
    /// Hex-encoded AES-256-GCM key, required only if the manifest
    /// declares an `encryption` section.
    pub key_hex: Option<String>,
    /// Recompute and compare the whole-file hash against
    /// `manifest.original_hash` when present. Defaults to `true`.
    pub verify_hash: bool,
}

impl ReconstructOptions {
    pub fn new(shard_dir: impl Into<PathBuf>) -> Self {
        Self {
            shard_dir: shard_dir.into(),
            key_hex: None,
            verify_hash: true,
        }
    }

    pub fn with_key_hex(mut self, key_hex: impl Into<String>) -> Self {
        self.key_hex = Some(key_hex.into());
        self
    }

    pub fn with_verify_hash(mut self, verify_hash: bool) -> Self {
        self.verify_hash = verify_hash;
        self
    }
}

/// Options for a `verify`-only run (no decoding, no decryption).
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Directory shard paths are resolved against, if shard hash
    /// verification is desired. `None` restricts verification to
    /// manifest structure and the Merkle tree.
    pub shard_dir: Option<PathBuf>,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self { shard_dir: None }
    }

    pub fn with_shard_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shard_dir = Some(dir.into());
        self
    }
}
