//! Reciprocal Rank Fusion

use crate::corpus::{Chunk, ChunkKey};
use crate::search::{CandidateSource, ScoredCandidate};
use std::collections::HashMap;

/// Fuse ranked candidate lists with Reciprocal Rank Fusion
///
/// Each list contributes `1 / (k + rank)` per document, rank 0-based;
/// contributions are summed per `(filename, char_start)` identity so a
/// chunk found by several probes outranks single-probe chunks of similar
/// rank. Result is descending by fused score, ties broken by first-seen
/// order across the input lists. Each identity appears exactly once.
pub fn reciprocal_rank_fusion(lists: &[Vec<(Chunk, f64)>], k: f64) -> Vec<ScoredCandidate> {
    let mut fused: HashMap<ChunkKey, (f64, usize, Chunk)> = HashMap::new();
    let mut next_seen = 0usize;

    for list in lists {
        for (rank, (chunk, _original_score)) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f64);
            let entry = fused.entry(chunk.key()).or_insert_with(|| {
                let seen = next_seen;
                next_seen += 1;
                (0.0, seen, chunk.clone())
            });
            entry.0 += contribution;
        }
    }

    let mut results: Vec<(f64, usize, Chunk)> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    results
        .into_iter()
        .map(|(score, _, chunk)| ScoredCandidate {
            chunk,
            score,
            source: CandidateSource::Fused,
            llm_score: None,
        })
        .collect()
}
