//! Keyed multiply-rotate hash over a byte sequence.
//!
//! Single-lane: every pass folds the input through `mix` one byte at a
//! time. The loop walks the input in 8-byte groups only to unroll it; each
//! byte of a group is still mixed on its own, so the grouped pass and the
//! plain byte loop give the same value for every input length. The pass is
//! repeated `iterations` times with the pass index XOR-folded into the
//! state first, and the result goes through a three-step avalanche.
//!
//! Laned: the *iteration count* is split across a fixed number of lanes.
//! Each lane starts from its own seed and runs the single-lane passes over
//! the whole input for its share; lane results are folded together with a
//! fixed XOR/multiply/rotate reduction. This is a different function from
//! the single-lane hash. The canonical `hashMix` is single-lane; a laned
//! digest is always tagged with [`HashVariant::Laned`].

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::descriptor::HashDescriptor;
use crate::lanes::{even_shares, unit_lanes, WorkerGroup};
use crate::Strategy;

pub const SEED: u32 = 0x811C_9DC5;
pub const DEFAULT_LANES: usize = 4;

const MIX_MUL: u32 = 0x9E37_79B1;
const MIX_ROT: u32 = 13;
const AVALANCHE_MUL: u32 = 0x85EB_CA6B;
const LANE_SEED_MUL: u32 = 0x27D4_EB2F;
const COMBINE_MUL: u32 = 0x1656_67B1;
const COMBINE_ROT: u32 = 15;

/// Which hash definition produced a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashVariant {
    SingleLane,
    Laned { lanes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    pub value: u32,
    pub variant: HashVariant,
}

/// Hash `data` with the given strategy.
///
/// `Naive` and `CacheBlocked` both compute the canonical single-lane hash
/// (byte loop vs unrolled groups). `Parallel` computes the laned hash with
/// `lanes` partitions, independent of how many workers `group` has.
pub fn hash(data: &[u8], desc: &HashDescriptor, strategy: Strategy, lanes: usize, group: &WorkerGroup) -> HashDigest {
    match strategy {
        Strategy::Naive => HashDigest {
            value: avalanche(run_passes_bytewise(SEED, data, 0..desc.iterations)),
            variant: HashVariant::SingleLane,
        },
        Strategy::CacheBlocked => HashDigest {
            value: hash_mix(data, desc.iterations),
            variant: HashVariant::SingleLane,
        },
        Strategy::Parallel => {
            let lanes = lanes.max(1);
            HashDigest {
                value: hash_mix_laned(data, desc.iterations, lanes, group),
                variant: HashVariant::Laned { lanes },
            }
        }
    }
}

/// Canonical single-lane hash.
pub fn hash_mix(data: &[u8], iterations: u32) -> u32 {
    avalanche(run_passes(SEED, data, 0..iterations))
}

/// Iteration-partitioned hash over `lanes` lanes.
pub fn hash_mix_laned(data: &[u8], iterations: u32, lanes: usize, group: &WorkerGroup) -> u32 {
    let shares = even_shares(iterations as usize, lanes);
    let mut partials = vec![0u32; shares.len()];
    group.run(&mut partials, &unit_lanes(shares.len()), |lane, out| {
        let share = &shares[lane.index].range;
        let passes = share.start as u32..share.end as u32;
        out[0] = avalanche(run_passes(lane_seed(lane.index), data, passes));
    });
    combine(&partials)
}

#[inline(always)]
fn mix(h: u32, byte: u8) -> u32 {
    (h ^ byte as u32).wrapping_mul(MIX_MUL).rotate_left(MIX_ROT)
}

fn run_passes(seed: u32, data: &[u8], passes: Range<u32>) -> u32 {
    let mut h = seed;
    for pass_index in passes {
        h ^= pass_index;
        h = pass(h, data);
    }
    h
}

/// One full pass, unrolled over 8-byte groups.
#[inline]
fn pass(mut h: u32, data: &[u8]) -> u32 {
    let mut groups = data.chunks_exact(8);
    for g in &mut groups {
        h = mix(h, g[0]);
        h = mix(h, g[1]);
        h = mix(h, g[2]);
        h = mix(h, g[3]);
        h = mix(h, g[4]);
        h = mix(h, g[5]);
        h = mix(h, g[6]);
        h = mix(h, g[7]);
    }
    for &b in groups.remainder() {
        h = mix(h, b);
    }
    h
}

fn run_passes_bytewise(seed: u32, data: &[u8], passes: Range<u32>) -> u32 {
    let mut h = seed;
    for pass_index in passes {
        h ^= pass_index;
        for &b in data {
            h = mix(h, b);
        }
    }
    h
}

#[inline]
fn avalanche(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(AVALANCHE_MUL);
    h ^= h >> 13;
    h
}

fn lane_seed(index: usize) -> u32 {
    SEED ^ (index as u32).wrapping_add(1).wrapping_mul(LANE_SEED_MUL).rotate_left(7)
}

fn combine(partials: &[u32]) -> u32 {
    partials
        .iter()
        .fold(0u32, |acc, &p| (acc ^ p).wrapping_mul(COMBINE_MUL).rotate_left(COMBINE_ROT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let data = b"the quick brown fox jumps over the lazy dog";
        assert_eq!(hash_mix(data, 17), hash_mix(data, 17));
        assert_ne!(hash_mix(data, 17), hash_mix(data, 18));
    }

    #[test]
    fn test_single_byte_flip_changes_output() {
        let data: Vec<u8> = (0..37u8).collect();
        let base = hash_mix(&data, 1);
        for i in 0..data.len() {
            let mut flipped = data.clone();
            flipped[i] ^= 0x01;
            assert_ne!(hash_mix(&flipped, 1), base, "flip at byte {} did not change hash", i);
        }
    }

    #[test]
    fn test_unrolled_matches_bytewise() {
        let group = WorkerGroup::cooperative();
        for len in [0usize, 1, 7, 8, 9, 16, 31] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            let desc = HashDescriptor::new(5);
            let naive = hash(&data, &desc, Strategy::Naive, DEFAULT_LANES, &group);
            let blocked = hash(&data, &desc, Strategy::CacheBlocked, DEFAULT_LANES, &group);
            assert_eq!(naive, blocked, "len={}", len);
        }
    }

    #[test]
    fn test_grouping_does_not_change_value() {
        // The same bytes give the same pass value whether they land in a
        // full group or in the remainder.
        let data: Vec<u8> = (0..24u8).collect();
        let whole = pass(SEED, &data);
        let mut h = SEED;
        for &b in &data {
            h = mix(h, b);
        }
        assert_eq!(whole, h);
        assert_eq!(pass(pass(SEED, &data[..5]), &data[5..]), whole);
    }

    #[test]
    fn test_laned_independent_of_worker_count() {
        let data = b"tessera lanes";
        let one = hash_mix_laned(data, 1_000, 4, &WorkerGroup::cooperative());
        let many = hash_mix_laned(data, 1_000, 4, &WorkerGroup::new(3));
        assert_eq!(one, many);
    }

    #[test]
    fn test_laned_is_tagged() {
        let digest = hash(b"x", &HashDescriptor::new(10), Strategy::Parallel, 0, &WorkerGroup::cooperative());
        assert_eq!(digest.variant, HashVariant::Laned { lanes: 1 });
    }

    #[test]
    fn test_zero_iterations() {
        // No passes: the data is never read, only the seed is avalanched.
        assert_eq!(hash_mix(b"abc", 0), hash_mix(b"xyz", 0));
        assert_eq!(hash_mix(b"abc", 0), avalanche(SEED));
    }
}
