//! Placement properties of the hash ring

use fileio::cluster::{HashRing, Node};
use fileio::common::HashAlgorithm;
use std::collections::HashMap;

fn nodes(n: usize) -> Vec<Node> {
    (0..n)
        .map(|i| Node::new(format!("node-{}", i), format!("10.0.0.{}", i + 1), 3001))
        .collect()
}

fn owners(ring: &HashRing, keys: &[String]) -> Vec<String> {
    keys.iter()
        .map(|k| ring.locate(k).unwrap().id.clone())
        .collect()
}

#[test]
fn test_adding_a_node_only_moves_keys_to_it() {
    for algorithm in [HashAlgorithm::Blake3, HashAlgorithm::Legacy32] {
        let keys: Vec<String> = (0..2000).map(|i| format!("bucket:file-{}", i)).collect();
        let mut ring = HashRing::with_nodes(10, algorithm, &nodes(4));
        let before = owners(&ring, &keys);

        let extra = Node::new("node-new", "10.0.0.99", 3001);
        ring.add_node(&extra);
        let after = owners(&ring, &keys);

        for (b, a) in before.iter().zip(after.iter()) {
            assert!(a == b || a == "node-new", "{} moved to {}", b, a);
        }
    }
}

#[test]
fn test_removing_a_node_only_moves_its_keys() {
    let keys: Vec<String> = (0..2000).map(|i| format!("bucket:file-{}", i)).collect();
    let all = nodes(5);
    let mut ring = HashRing::with_nodes(10, HashAlgorithm::Blake3, &all);
    let before = owners(&ring, &keys);

    ring.remove_node(&all[2]);
    let after = owners(&ring, &keys);

    for (b, a) in before.iter().zip(after.iter()) {
        if b != "node-2" {
            assert_eq!(a, b);
        } else {
            assert_ne!(a, "node-2");
        }
    }
}

#[test]
fn test_every_node_gets_a_share() {
    let ring = HashRing::with_nodes(50, HashAlgorithm::Blake3, &nodes(4));
    let mut counts: HashMap<String, usize> = HashMap::new();
    for i in 0..4000 {
        *counts
            .entry(ring.locate(&format!("b:k{}", i)).unwrap().id.clone())
            .or_default() += 1;
    }
    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|&c| c > 200), "skewed: {:?}", counts);
}

#[test]
fn test_insertion_order_does_not_matter() {
    let mut forward = nodes(6);
    let a = HashRing::with_nodes(10, HashAlgorithm::Blake3, &forward);
    forward.reverse();
    let b = HashRing::with_nodes(10, HashAlgorithm::Blake3, &forward);

    for i in 0..500 {
        let key = format!("b:k{}", i);
        assert_eq!(a.locate(&key), b.locate(&key));
    }
}

#[cfg(feature = "heavy-tests")]
#[test]
fn test_large_ring_minimal_disruption() {
    let keys: Vec<String> = (0..100_000).map(|i| format!("bucket:file-{}", i)).collect();
    let mut ring = HashRing::with_nodes(100, HashAlgorithm::Blake3, &nodes(50));
    let before = owners(&ring, &keys);
    ring.add_node(&Node::new("node-new", "10.0.1.1", 3001));
    let after = owners(&ring, &keys);
    let moved = before.iter().zip(after.iter()).filter(|(b, a)| b != a).count();
    // Expect roughly 1/51 of the keys to move
    assert!(moved < keys.len() / 20, "moved {}", moved);
}
