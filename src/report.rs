// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structured outcome record returned by [`crate::reconstruct::reconstruct_file`]
//! and [`crate::reconstruct::verify_manifest`].

use serde::Serialize;

/// Per-shard entry in the report, preserving manifest shard order.
#[derive(Debug, Clone, Serialize)]
pub struct ShardDetail {
    pub index: u32,
    pub path: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full structured report for a `verify` or `rebuild` run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconstructionReport {
    pub success: bool,
    pub feasible: bool,
    pub original_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstructed_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstructed_hash: Option<String>,
    pub hash_verified: bool,
    pub decrypted: bool,
    pub shards_required: u32,
    pub shards_available: usize,
    pub shards_valid: usize,
    pub rs_errors_corrected: usize,
    pub shard_details: Vec<ShardDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReconstructionReport {
    /// Render the report as pretty-printed JSON, as the CLI's
    /// `--json` option does.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
