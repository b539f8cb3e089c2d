//! Batch layout vectors.
//!
//! Known-good layouts for command counts and batch sizes. Other
//! implementations of the same batching must produce these exact sizes.

use serde::{Deserialize, Serialize};

/// One expected batch layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Number of commands.
    pub commands: usize,
    /// Batch size.
    pub batch_size: usize,
    /// Expected batch sizes, in order.
    pub expected: Vec<usize>,
}

impl LayoutVector {
    fn new(id: &str, description: &str, commands: usize, batch_size: usize, expected: &[usize]) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            commands,
            batch_size,
            expected: expected.to_vec(),
        }
    }
}

/// Batch layout vectors.
pub fn layout_vectors() -> Vec<LayoutVector> {
    vec![
        LayoutVector::new("empty", "No commands, no batches", 0, 50, &[]),
        LayoutVector::new("single", "One command", 1, 50, &[1]),
        LayoutVector::new("exact", "Exactly one full batch", 50, 50, &[50]),
        LayoutVector::new("merge_15", "Tail of 15 merges (short = 16)", 65, 50, &[65]),
        LayoutVector::new("merge_17", "Tail of short + 1 still merges", 67, 50, &[67]),
        LayoutVector::new("split_18", "Tail of short + 2 is split off", 68, 50, &[50, 18]),
        LayoutVector::new("split_20", "Tail of 20 is split off", 70, 50, &[50, 20]),
        LayoutVector::new("appended_120", "Three appended lists of 40", 120, 50, &[50, 50, 20]),
        LayoutVector::new("size_10", "Tail of 3 merges at size 10", 43, 10, &[10, 10, 10, 13]),
        LayoutVector::new("size_1", "Last command rides with the one before", 5, 1, &[1, 1, 1, 2]),
        LayoutVector::new("size_2", "Short is zero at size 2", 4, 2, &[2, 2]),
    ]
}

/// Serializes vectors to JSON.
pub fn vectors_to_json(vectors: &[LayoutVector]) -> String {
    serde_json::to_string_pretty(vectors).expect("Failed to serialize vectors")
}

/// Parses vectors from JSON.
pub fn vectors_from_json(json: &str) -> serde_json::Result<Vec<LayoutVector>> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use txlink_core::batch_sizes;

    #[test]
    fn vectors_match_assembler() {
        for vector in layout_vectors() {
            let sizes = batch_sizes(vector.commands, vector.batch_size).unwrap();
            assert_eq!(sizes, vector.expected, "vector {}", vector.id);
        }
    }

    #[test]
    fn vector_ids_are_unique() {
        let vectors = layout_vectors();
        let mut ids: Vec<&str> = vectors.iter().map(|v| v.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), vectors.len());
    }

    #[test]
    fn vectors_survive_json() {
        let vectors = layout_vectors();
        let parsed = vectors_from_json(&vectors_to_json(&vectors)).unwrap();
        assert_eq!(parsed, vectors);
    }
}
