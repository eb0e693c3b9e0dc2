// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Property-based tests over the GF(2^8) field and the systematic RS
//! codec: any k-of-n subset of shards must decode back to the original
//! plaintext, regardless of which shards are missing.

use nebula_reconstruct::gf256::GfTables;
use nebula_reconstruct::rs::RsCodec;
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #[test]
    fn gf_mul_div_are_inverse(a in 1u8.., b in 1u8..) {
        let gf = GfTables::new();
        let product = gf.mul(a, b);
        prop_assert_eq!(gf.div(product, b), Some(a));
    }

    #[test]
    fn gf_mul_is_commutative(a: u8, b: u8) {
        let gf = GfTables::new();
        prop_assert_eq!(gf.mul(a, b), gf.mul(b, a));
    }

    #[test]
    fn gf_add_is_self_inverse(a: u8, b: u8) {
        let gf = GfTables::new();
        prop_assert_eq!(GfTables::add(GfTables::add(a, b), b), a);
    }

    #[test]
    fn rs_any_k_subset_of_seven_recovers_plaintext(
        data in prop::collection::vec(any::<u8>(), 1..200),
        drop_a in 0usize..7,
        drop_b in 0usize..7,
        drop_c in 0usize..7,
    ) {
        let codec = RsCodec::new(4, 7).unwrap();
        let shards = codec.encode(&data);

        let mut dropped: Vec<usize> = vec![drop_a, drop_b, drop_c];
        dropped.sort_unstable();
        dropped.dedup();
        // Keep dropping deterministic-but-varied without ever dropping
        // more than three of the seven shards.
        let available: BTreeMap<usize, Vec<u8>> = (0..7)
            .filter(|i| !dropped.contains(i))
            .map(|i| (i, shards[i].clone()))
            .collect();

        if available.len() >= 4 {
            let outcome = codec.decode(&available, data.len()).unwrap();
            prop_assert_eq!(outcome.plaintext, data);
        }
    }

    #[test]
    fn rs_encode_shards_are_equal_length(data in prop::collection::vec(any::<u8>(), 0..300)) {
        let codec = RsCodec::new(3, 6).unwrap();
        let shards = codec.encode(&data);
        let first_len = shards[0].len();
        prop_assert!(shards.iter().all(|s| s.len() == first_len));
    }
}
