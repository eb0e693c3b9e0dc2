// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Encoding-side tooling: produce a manifest and shard files from
//! plaintext. This is not a storage/distribution pipeline -- it exists
//! to produce test fixtures and to let a break-glass operator stand up
//! a throwaway recovery set without a second toolchain, per the
//! specification's note that encoding-side tooling is in scope only as
//! far as fixture generation requires.

use std::path::Path;

use aes_gcm::{
    Aes256Gcm, Key,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::manifest::{EncryptionSection, Manifest, MerkleSection, RsSection, ShardDescriptor, SUPPORTED_VERSION};
use crate::rs::RsCodec;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Rs(#[from] crate::rs::RsError),

    #[error("failed to write shard file: {0}")]
    Io(#[from] std::io::Error),

    #[error("encryption key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Options controlling [`encode_to_dir`].
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub k: usize,
    pub n: usize,
    pub include_merkle: bool,
    /// 32-byte AES-256-GCM key; when present the plaintext is sealed
    /// before RS encoding and an `encryption` section is added.
    pub encryption_key: Option<[u8; 32]>,
}

impl EncodeOptions {
    pub fn new(k: usize, n: usize) -> Self {
        Self {
            k,
            n,
            include_merkle: true,
            encryption_key: None,
        }
    }

    pub fn with_merkle(mut self, include: bool) -> Self {
        self.include_merkle = include;
        self
    }

    pub fn with_encryption_key(mut self, key: [u8; 32]) -> Self {
        self.encryption_key = Some(key);
        self
    }
}

/// Encode `plaintext` into shard files under `out_dir` and return the
/// manifest describing them. Shard files are named `shard_<index>.bin`.
pub fn encode_to_dir(
    plaintext: &[u8],
    out_dir: &Path,
    options: &EncodeOptions,
) -> Result<Manifest, EncodeError> {
    std::fs::create_dir_all(out_dir)?;

    let original_hash = hex::encode(Sha256::digest(plaintext));

    let (payload, encryption) = match &options.encryption_key {
        Some(key) => {
            let (sealed, iv, tag) = seal(plaintext, key)?;
            (
                sealed,
                Some(EncryptionSection {
                    algorithm: "aes-256-gcm".to_string(),
                    iv: hex::encode(iv),
                    tag: Some(hex::encode(tag)),
                }),
            )
        }
        None => (plaintext.to_vec(), None),
    };

    let codec = RsCodec::new(options.k, options.n)?;
    let shard_bytes = codec.encode(&payload);

    let mut shards = Vec::with_capacity(shard_bytes.len());
    let mut leaf_hashes = Vec::with_capacity(shard_bytes.len());
    for (index, bytes) in shard_bytes.iter().enumerate() {
        let path = format!("shard_{index}.bin");
        std::fs::write(out_dir.join(&path), bytes)?;
        let hash = hex::encode(Sha256::digest(bytes));
        leaf_hashes.push(hash.clone());
        shards.push(ShardDescriptor {
            index: index as u32,
            path,
            hash,
            size_bytes: bytes.len() as u64,
        });
    }

    let merkle = if options.include_merkle {
        crate::manifest::compute_merkle_root(&leaf_hashes).map(|root| MerkleSection {
            algorithm: "sha256".to_string(),
            root,
            leaf_hashes,
        })
    } else {
        None
    };

    info!(k = options.k, n = options.n, out_dir = %out_dir.display(), "encoded fixture shards");

    Ok(Manifest {
        version: SUPPORTED_VERSION.to_string(),
        hash_algorithm: "sha256".to_string(),
        original_size_bytes: plaintext.len() as u64,
        original_hash: Some(original_hash),
        rs: RsSection {
            data_shards: options.k as u32,
            parity_shards: (options.n - options.k) as u32,
            total_shards: options.n as u32,
        },
        shards,
        merkle,
        encryption,
    })
}

fn seal(plaintext: &[u8], key: &[u8; 32]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), EncodeError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| EncodeError::InvalidKeyLength(key.len()))?;
    let (body, tag) = sealed.split_at(sealed.len() - 16);
    Ok((body.to_vec(), nonce.to_vec(), tag.to_vec()))
}
