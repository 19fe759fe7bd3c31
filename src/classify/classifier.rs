//! Prototype-embedding classifier.
//!
//! Each category is represented by a description prompt plus up to
//! [`MAX_EXAMPLES`] example prompts, embedded once at registration. An input
//! scores against a category as the best dot product over its exemplars.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::provider::{provider_from_config, CallOptions, EmbeddingProvider};
use super::registry::CategoryRegistry;
use crate::config::Config;
use crate::error::{MailLensError, ProviderError, Result};
use crate::i18n::{self, Lang};
use crate::model::classification::{
    Category, CategoryScore, ClassificationResult, ClassifyOutcome, UNDETERMINED,
};

/// Example prompts kept per category; extras are dropped.
pub const MAX_EXAMPLES: usize = 5;

/// Default similarity threshold below which the result is [`UNDETERMINED`].
pub const DEFAULT_THRESHOLD: f32 = 0.28;

pub struct Classifier {
    provider: Arc<dyn EmbeddingProvider>,
    /// Serializes provider calls.
    gate: Mutex<()>,
    registry: CategoryRegistry,
    threshold: RwLock<f32>,
    lang: Lang,
    timeout: Duration,
}

impl Classifier {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        lang: Lang,
        threshold: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            gate: Mutex::new(()),
            registry: CategoryRegistry::new(),
            threshold: RwLock::new(clamp_threshold(threshold)),
            lang,
            timeout,
        }
    }

    /// Build a classifier with the configured provider, language and threshold.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = provider_from_config(&config.provider)?;
        info!(provider = provider.name(), "Embedding provider ready");
        Ok(Self::new(
            provider,
            config.general.language,
            config.classifier.threshold,
            Duration::from_secs(config.provider.timeout_secs.max(1)),
        ))
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn threshold(&self) -> f32 {
        *self.threshold.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the threshold; values are clamped to `[-1, 1]`.
    pub fn set_threshold(&self, threshold: f32) {
        *self.threshold.write().unwrap_or_else(PoisonError::into_inner) = clamp_threshold(threshold);
    }

    /// Register `name`, replacing any previous prototypes in place.
    pub fn add_category(
        &self,
        name: &str,
        description: Option<&str>,
        examples: &[String],
    ) -> Result<()> {
        self.add_category_with(name, description, examples, &self.call_options())
    }

    /// [`Classifier::add_category`] with explicit call options.
    pub fn add_category_with(
        &self,
        name: &str,
        description: Option<&str>,
        examples: &[String],
        call: &CallOptions,
    ) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MailLensError::ClassifierConfig(
                "category name must not be empty".to_string(),
            ));
        }
        if examples.len() > MAX_EXAMPLES {
            debug!(
                category = name,
                dropped = examples.len() - MAX_EXAMPLES,
                "Dropping examples beyond the limit"
            );
        }

        let mut prompts = vec![i18n::description_prompt(self.lang, name, description)];
        prompts.extend(
            examples
                .iter()
                .take(MAX_EXAMPLES)
                .enumerate()
                .map(|(i, example)| i18n::example_prompt(self.lang, name, i + 1, example)),
        );

        // Embed before taking the registry write lock.
        let exemplars = self.embed(&prompts, call)?;
        if exemplars.len() != prompts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "{} embeddings for {} prompts",
                exemplars.len(),
                prompts.len()
            ))
            .into());
        }

        let replaced = self.registry.upsert(Category {
            name: name.to_string(),
            description: description.map(str::to_string).filter(|d| !d.is_empty()),
            exemplars,
        });
        info!(
            category = name,
            prompts = prompts.len(),
            replaced = replaced,
            "Registered category"
        );
        Ok(())
    }

    pub fn remove_category(&self, name: &str) -> bool {
        self.registry.remove(name)
    }

    pub fn reset(&self) {
        self.registry.reset();
    }

    pub fn category_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Classify `text` against every registered category.
    pub fn classify(&self, text: &str) -> ClassifyOutcome {
        self.classify_with(text, &self.call_options())
    }

    /// [`Classifier::classify`] with explicit call options.
    pub fn classify_with(&self, text: &str, call: &CallOptions) -> ClassifyOutcome {
        if self.registry.is_empty() {
            return ClassifyOutcome::NoCategories;
        }

        let prompt = i18n::classification_prompt(self.lang, text);
        let query = match self.embed(&[prompt], call) {
            Ok(mut vectors) if vectors.len() == 1 => vectors.remove(0),
            Ok(vectors) => {
                return ClassifyOutcome::ProviderUnavailable {
                    reason: format!("expected 1 embedding, got {}", vectors.len()),
                }
            }
            Err(e) => {
                warn!(error = %e, "Classification failed");
                return ClassifyOutcome::ProviderUnavailable {
                    reason: e.to_string(),
                };
            }
        };

        let scores = self.registry.with_categories(|categories| {
            categories
                .iter()
                .map(|c| CategoryScore {
                    category: c.name.clone(),
                    similarity: c.score(&query),
                })
                .collect::<Vec<_>>()
        });

        // The registry may have been emptied while the query was embedded.
        match rank(scores, self.threshold()) {
            Some(result) => ClassifyOutcome::Classified(result),
            None => ClassifyOutcome::NoCategories,
        }
    }

    fn call_options(&self) -> CallOptions {
        CallOptions::with_timeout(self.timeout)
    }

    fn embed(&self, prompts: &[String], call: &CallOptions) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.provider.embed_batch(prompts, true, call)
    }
}

/// Stable descending sort plus thresholding. `None` for an empty score list.
///
/// Non-finite similarities rank last and never pass the threshold.
pub fn rank(mut scores: Vec<CategoryScore>, threshold: f32) -> Option<ClassificationResult> {
    for score in &mut scores {
        if !score.similarity.is_finite() {
            score.similarity = f32::NEG_INFINITY;
        }
    }
    scores.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    let best = scores.first()?;
    let predicted_category = if best.similarity < threshold {
        UNDETERMINED.to_string()
    } else {
        best.category.clone()
    };
    Some(ClassificationResult {
        predicted_category,
        best_similarity: best.similarity,
        ranked_scores: scores,
    })
}

fn clamp_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        DEFAULT_THRESHOLD
    } else {
        threshold.clamp(-1.0, 1.0)
    }
}
