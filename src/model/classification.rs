//! Category prototypes and classification results.

use serde::{Deserialize, Serialize};

/// Sentinel reported when no category clears the threshold.
pub const UNDETERMINED: &str = "Undetermined";

/// A registered category and its exemplar embeddings.
#[derive(Debug, Clone)]
pub struct Category {
    /// Unique key.
    pub name: String,
    /// Optional human description used in the description prompt.
    pub description: Option<String>,
    /// Unit-normalized vectors: the description prompt first, then up to 5 examples.
    pub exemplars: Vec<Vec<f32>>,
}

impl Category {
    /// Best match to any exemplar: the maximum dot product against `query`.
    ///
    /// A category without exemplars scores `f32::NEG_INFINITY`.
    pub fn score(&self, query: &[f32]) -> f32 {
        self.exemplars
            .iter()
            .map(|exemplar| dot(exemplar, query))
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Dot product of two vectors (cosine similarity when both are unit-normalized).
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Similarity of the input to one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Category name.
    pub category: String,
    /// Raw similarity (not a probability).
    pub similarity: f32,
}

/// Result of a successful classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Winning category, or [`UNDETERMINED`].
    pub predicted_category: String,
    /// True top score, reported even when it is below the threshold.
    pub best_similarity: f32,
    /// All categories, highest similarity first; ties keep registration order.
    pub ranked_scores: Vec<CategoryScore>,
}

impl ClassificationResult {
    /// `true` when no category cleared the threshold.
    pub fn is_undetermined(&self) -> bool {
        self.predicted_category == UNDETERMINED
    }
}

/// Everything `classify` can answer with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifyOutcome {
    /// Scores were computed.
    Classified(ClassificationResult),
    /// The registry is empty.
    NoCategories,
    /// The embedding provider failed; carries the reason.
    ProviderUnavailable { reason: String },
}

impl ClassifyOutcome {
    /// The result, if classification succeeded.
    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classified(result) => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_max_over_exemplars() {
        let category = Category {
            name: "a".into(),
            description: None,
            exemplars: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
        };
        let score = category.score(&[0.0, 1.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ClassifyOutcome::NoCategories).expect("serialize");
        assert_eq!(json["status"], "no_categories");
    }
}
