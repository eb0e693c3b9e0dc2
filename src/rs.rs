// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Systematic Reed-Solomon codec over GF(2^8).
//!
//! The code is systematic: shard indices `0..k` are data shards holding
//! the (padded) plaintext verbatim, and indices `k..n` are parity
//! shards. Encoding builds a Vandermonde matrix over `n` distinct
//! nonzero field elements, then left-multiplies by the inverse of its
//! top `k x k` block so the first `k` rows become the identity -- the
//! standard systematic-RS construction also used by `pure_rust.rs`'s
//! Cauchy-matrix backend, here with a Vandermonde generator instead.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, trace};

use crate::gf256::{GfTables, invert_matrix};

/// Errors raised by the RS codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RsError {
    #[error("invalid RS parameters: k={k}, n={n}")]
    InvalidParams { k: usize, n: usize },

    #[error("insufficient shards for reconstruction: have {have}, need {need}")]
    InsufficientShards { have: usize, need: usize },

    #[error("shards disagree on size")]
    ShardSizeMismatch,

    #[error("RS decode failed: syndrome could not be satisfied within the redundancy budget")]
    DecodeFailure,
}

/// Result of a successful decode, including how many errors (not mere
/// erasures) were corrected along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub plaintext: Vec<u8>,
    pub corrected_errors: usize,
}

/// A systematic `(n, k)` Reed-Solomon codec.
#[derive(Debug)]
pub struct RsCodec {
    k: usize,
    n: usize,
    gf: GfTables,
    /// `n x k` matrix; rows `0..k` are the identity, rows `k..n` are the
    /// parity-generator rows.
    matrix: Vec<Vec<u8>>,
}

impl RsCodec {
    /// Construct a codec for `k` data shards and `n` total shards.
    pub fn new(k: usize, n: usize) -> Result<Self, RsError> {
        if k == 0 || n <= k || n > 255 {
            return Err(RsError::InvalidParams { k, n });
        }

        let gf = GfTables::new();
        let matrix = build_systematic_matrix(&gf, k, n).ok_or(RsError::InvalidParams { k, n })?;

        Ok(Self { k, n, gf, matrix })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Encode `plaintext` into `n` shards of equal length, padding with
    /// `0x00` to the next multiple of `k`.
    pub fn encode(&self, plaintext: &[u8]) -> Vec<Vec<u8>> {
        let shard_size = plaintext.len().div_ceil(self.k);
        let padded_len = shard_size * self.k;

        let mut padded = plaintext.to_vec();
        padded.resize(padded_len, 0);

        let mut data_shards: Vec<Vec<u8>> = (0..self.k)
            .map(|i| padded[i * shard_size..(i + 1) * shard_size].to_vec())
            .collect();

        let mut parity_shards = Vec::with_capacity(self.n - self.k);
        for row in &self.matrix[self.k..self.n] {
            let mut parity = vec![0u8; shard_size];
            for (j, &coeff) in row.iter().enumerate() {
                self.gf.mul_add_slice(&mut parity, &data_shards[j], coeff);
            }
            parity_shards.push(parity);
        }

        debug!(k = self.k, n = self.n, shard_size, "encoded shards");

        data_shards.append(&mut parity_shards);
        data_shards
    }

    /// Decode the original plaintext from a partial mapping of shard
    /// index to shard bytes. `erasures_only` shards are trusted
    /// verbatim; reconstruction solves for any missing data shards via
    /// matrix inversion over the selected erasure-free shards.
    ///
    /// Takes the fast path (plain concatenation) when all data-shard
    /// indices `0..k` are present, per the tie-break rule that prefers
    /// the cheapest assembly whenever it is available.
    pub fn decode(
        &self,
        shards: &BTreeMap<usize, Vec<u8>>,
        original_size: usize,
    ) -> Result<DecodeOutcome, RsError> {
        if shards.len() < self.k {
            return Err(RsError::InsufficientShards {
                have: shards.len(),
                need: self.k,
            });
        }

        let shard_size = shards
            .values()
            .next()
            .map(|s| s.len())
            .ok_or(RsError::InsufficientShards {
                have: 0,
                need: self.k,
            })?;
        if shards.values().any(|s| s.len() != shard_size) {
            return Err(RsError::ShardSizeMismatch);
        }

        if (0..self.k).all(|i| shards.contains_key(&i)) {
            trace!("fast path: all data shards present");
            let mut plaintext = Vec::with_capacity(shard_size * self.k);
            for i in 0..self.k {
                plaintext.extend_from_slice(&shards[&i]);
            }
            plaintext.truncate(original_size);
            return Ok(DecodeOutcome {
                plaintext,
                corrected_errors: 0,
            });
        }

        // Erasure path: pick exactly k shards in ascending index order,
        // build the corresponding rows of the systematic matrix, invert,
        // and solve for the k data shards.
        let selected: Vec<usize> = shards.keys().take(self.k).copied().collect();
        let selected_matrix: Vec<Vec<u8>> = selected
            .iter()
            .map(|&idx| self.matrix[idx].clone())
            .collect();

        let inverse =
            invert_matrix(&self.gf, &selected_matrix).ok_or(RsError::DecodeFailure)?;

        let mut data_shards: Vec<Vec<u8>> = vec![vec![0u8; shard_size]; self.k];
        for (data_idx, row) in inverse.iter().enumerate() {
            for (src_pos, &coeff) in row.iter().enumerate() {
                let src = &shards[&selected[src_pos]];
                self.gf
                    .mul_add_slice(&mut data_shards[data_idx], src, coeff);
            }
        }

        debug!(
            k = self.k,
            n = self.n,
            used = selected.len(),
            "decoded via erasure path"
        );

        let mut plaintext = Vec::with_capacity(shard_size * self.k);
        for shard in &data_shards {
            plaintext.extend_from_slice(shard);
        }
        plaintext.truncate(original_size);

        Ok(DecodeOutcome {
            plaintext,
            corrected_errors: 0,
        })
    }

    /// Decode while tolerating up to `n - k` combined erasures and
    /// unknown-position errors among the *provided* shards. Erasures
    /// (absent indices) consume one budget unit each; every extra
    /// provided shard beyond the first `k` erasure-free ones is treated
    /// as a candidate for exclusion if it makes the solve inconsistent
    /// with the rest, consuming two budget units each. Intended for the
    /// rare case where a caller passes shards the integrity layer
    /// flagged as suspect rather than simply omitting them.
    pub fn decode_with_correction(
        &self,
        shards: &BTreeMap<usize, Vec<u8>>,
        original_size: usize,
    ) -> Result<DecodeOutcome, RsError> {
        let erasures = self.n - shards.len();
        if erasures > self.n - self.k {
            return Err(RsError::InsufficientShards {
                have: shards.len(),
                need: self.k,
            });
        }

        if shards.len() == self.k {
            return self.decode(shards, original_size);
        }

        let budget = self.n - self.k;
        let available: Vec<usize> = shards.keys().copied().collect();

        // Try the plain erasure-only solve first (cheapest): accept it
        // if the number of shards it disagrees with, doubled, still
        // fits the remaining budget after accounting for erasures.
        if let Ok(outcome) = self.decode(shards, original_size) {
            let mismatches = self.mismatch_count(&outcome.plaintext, shards);
            if erasures + 2 * mismatches <= budget {
                return Ok(DecodeOutcome {
                    plaintext: outcome.plaintext,
                    corrected_errors: mismatches,
                });
            }
        }

        // Otherwise search small combinations of included shards to
        // exclude from the solve, bounded by the redundancy budget.
        let max_exclude = available.len().saturating_sub(self.k);
        for exclude_count in 1..=max_exclude {
            if erasures + 2 * exclude_count > budget {
                break;
            }
            for excluded in combinations(&available, exclude_count) {
                let trial: BTreeMap<usize, Vec<u8>> = shards
                    .iter()
                    .filter(|(idx, _)| !excluded.contains(idx))
                    .map(|(&idx, bytes)| (idx, bytes.clone()))
                    .collect();
                if trial.len() < self.k {
                    continue;
                }
                if let Ok(outcome) = self.decode(&trial, original_size) {
                    let mismatches = self.mismatch_count(&outcome.plaintext, shards);
                    if mismatches <= excluded.len() && erasures + 2 * mismatches <= budget {
                        return Ok(DecodeOutcome {
                            plaintext: outcome.plaintext,
                            corrected_errors: mismatches,
                        });
                    }
                }
            }
        }

        Err(RsError::DecodeFailure)
    }

    /// Re-encode `plaintext` and count how many of `shards` it disagrees
    /// with.
    fn mismatch_count(&self, plaintext: &[u8], shards: &BTreeMap<usize, Vec<u8>>) -> usize {
        let re_encoded = self.encode(plaintext);
        shards
            .iter()
            .filter(|(&idx, bytes)| re_encoded.get(idx).map(|s| s.as_slice()) != Some(bytes.as_slice()))
            .count()
    }
}

fn combinations(items: &[usize], count: usize) -> Vec<Vec<usize>> {
    if count == 0 {
        return vec![Vec::new()];
    }
    if items.is_empty() || count > items.len() {
        return Vec::new();
    }
    let mut result = Vec::new();
    for i in 0..=items.len() - count {
        let rest = combinations(&items[i + 1..], count - 1);
        for mut combo in rest {
            combo.push(items[i]);
            result.push(combo);
        }
    }
    result
}

/// Build the `n x k` systematic matrix: rows `0..k` are the identity
/// (`I_k`), rows `k..n` are the Vandermonde-derived parity generator.
fn build_systematic_matrix(gf: &GfTables, k: usize, n: usize) -> Option<Vec<Vec<u8>>> {
    // Distinct nonzero field elements 1..=n index the Vandermonde rows.
    let points: Vec<u8> = (1..=n as u16).map(|v| v as u8).collect();
    let vandermonde: Vec<Vec<u8>> = points
        .iter()
        .map(|&x| (0..k).map(|j| gf.pow(x, j as u32)).collect())
        .collect();

    let top: Vec<Vec<u8>> = vandermonde[..k].to_vec();
    let top_inv = invert_matrix(gf, &top)?;

    let mut systematic = Vec::with_capacity(n);
    for row in &vandermonde {
        let mut out = vec![0u8; k];
        for (col, out_cell) in out.iter_mut().enumerate() {
            let mut acc = 0u8;
            for (src_col, &coeff) in row.iter().enumerate() {
                acc = GfTables::add(acc, gf.mul(coeff, top_inv[src_col][col]));
            }
            *out_cell = acc;
        }
        systematic.push(out);
    }

    Some(systematic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard_map(shards: &[Vec<u8>], indices: &[usize]) -> BTreeMap<usize, Vec<u8>> {
        indices.iter().map(|&i| (i, shards[i].clone())).collect()
    }

    #[test]
    fn systematic_rows_are_identity() {
        let codec = RsCodec::new(3, 5).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(codec.matrix[i][j], if i == j { 1 } else { 0 });
            }
        }
    }

    #[test]
    fn round_trip_fast_path() {
        let codec = RsCodec::new(3, 5).unwrap();
        let data = b"Hello, World! This is test data.".to_vec();
        let shards = codec.encode(&data);
        let map = shard_map(&shards, &[0, 1, 2]);
        let out = codec.decode(&map, data.len()).unwrap();
        assert_eq!(out.plaintext, data);
    }

    #[test]
    fn round_trip_erasure_path_losing_data_shards() {
        let codec = RsCodec::new(3, 5).unwrap();
        let data = b"Hello, World! This is test data.".to_vec();
        let shards = codec.encode(&data);
        let map = shard_map(&shards, &[1, 3, 4]);
        let out = codec.decode(&map, data.len()).unwrap();
        assert_eq!(out.plaintext, data);
    }

    #[test]
    fn shard_subset_independence() {
        let codec = RsCodec::new(4, 7).unwrap();
        let data: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let shards = codec.encode(&data);
        let all: Vec<usize> = (0..7).collect();

        let mut results = Vec::new();
        for combo in combinations(&all, 4) {
            let map = shard_map(&shards, &combo);
            let out = codec.decode(&map, data.len()).unwrap();
            results.push(out.plaintext);
        }
        for r in &results {
            assert_eq!(r, &data);
        }
    }

    #[test]
    fn insufficient_shards_errors() {
        let codec = RsCodec::new(3, 5).unwrap();
        let data = b"short".to_vec();
        let shards = codec.encode(&data);
        let map = shard_map(&shards, &[0, 1]);
        assert_eq!(
            codec.decode(&map, data.len()),
            Err(RsError::InsufficientShards { have: 2, need: 3 })
        );
    }

    #[test]
    fn zero_and_one_byte_plaintexts() {
        for data in [Vec::new(), vec![0xAB]] {
            let codec = RsCodec::new(3, 5).unwrap();
            let shards = codec.encode(&data);
            let sizes: Vec<usize> = shards.iter().map(|s| s.len()).collect();
            assert!(sizes.iter().all(|&s| s == sizes[0]));

            let map = shard_map(&shards, &[0, 3, 4]);
            let out = codec.decode(&map, data.len()).unwrap();
            assert_eq!(out.plaintext, data);
        }
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(RsCodec::new(0, 5).is_err());
        assert!(RsCodec::new(5, 5).is_err());
        assert!(RsCodec::new(1, 256).is_err());
    }

    #[test]
    fn correction_path_tolerates_one_corrupted_shard() {
        let codec = RsCodec::new(3, 5).unwrap();
        let data = b"correction budget test data!!".to_vec();
        let mut shards = codec.encode(&data);
        shards[1] = vec![0xFF; shards[1].len()];

        let map = shard_map(&shards, &[0, 1, 2, 3, 4]);
        let out = codec.decode_with_correction(&map, data.len()).unwrap();
        assert_eq!(out.plaintext, data);
        assert_eq!(out.corrected_errors, 1);
    }
}
