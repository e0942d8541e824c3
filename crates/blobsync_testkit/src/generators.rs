//! Property-based test generators using proptest.
//!
//! Provides strategies for generating key trees that a directory-backed
//! store can hold: no key is also a directory prefix of another key.

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for a single path segment.
///
/// The alphabet includes `-` and `.` so that byte order and segment order
/// disagree (`a-b` sorts before `a/b`).
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-c][a-c.-]{0,2}")
        .expect("Invalid regex")
        .prop_filter("segment must not be a dot segment", |s| s != "." && s != "..")
}

/// Strategy for a key of one to `max_depth` segments.
pub fn key_strategy(max_depth: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(segment_strategy(), 1..=max_depth.max(1)).prop_map(|segs| segs.join("/"))
}

/// Strategy for a set of keys forming a valid tree.
pub fn key_tree_strategy(max_keys: usize, max_depth: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::vec(key_strategy(max_depth), 0..=max_keys).prop_map(|keys| prune_conflicts(keys))
}

/// Drops keys that collide with another key's directory.
pub fn prune_conflicts(keys: Vec<String>) -> BTreeSet<String> {
    let mut accepted: BTreeSet<String> = BTreeSet::new();
    let mut dirs: BTreeSet<String> = BTreeSet::new();

    for key in keys {
        if dirs.contains(&key) || accepted.contains(&key) {
            continue;
        }
        let ancestors: Vec<String> = key
            .match_indices('/')
            .map(|(idx, _)| key[..idx].to_string())
            .collect();
        if ancestors.iter().any(|a| accepted.contains(a)) {
            continue;
        }
        dirs.extend(ancestors);
        accepted.insert(key);
    }
    accepted
}

/// Strategy for file bodies.
pub fn body_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}
