//! Integration tests for category registration and classification.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use maillens::classify::{
    CallOptions, CancelToken, CategoryCatalog, Classifier, EmbeddingProvider, HashingEmbedder,
};
use maillens::error::ProviderError;
use maillens::i18n::Lang;
use maillens::model::classification::{normalize, ClassifyOutcome, UNDETERMINED};
use maillens::{MailLensError, Pipeline};

/// Returns the vector of the first key contained in the prompt.
struct KeywordProvider {
    table: Vec<(&'static str, Vec<f32>)>,
    calls: AtomicUsize,
}

impl KeywordProvider {
    fn new(table: Vec<(&'static str, Vec<f32>)>) -> Self {
        Self {
            table,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for KeywordProvider {
    fn embed_batch(
        &self,
        prompts: &[String],
        normalize_output: bool,
        call: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        call.check(0)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(prompts
            .iter()
            .map(|prompt| {
                let mut v = self
                    .table
                    .iter()
                    .find(|(key, _)| prompt.contains(key))
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| vec![0.0, 0.0, 1.0]);
                if normalize_output {
                    normalize(&mut v);
                }
                v
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

struct FailingProvider;

impl EmbeddingProvider for FailingProvider {
    fn embed_batch(
        &self,
        _prompts: &[String],
        _normalize: bool,
        _call: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

fn unit3(a: f32, b: f32) -> Vec<f32> {
    vec![a, b, (1.0 - a * a - b * b).max(0.0).sqrt()]
}

fn keyword_classifier() -> (Classifier, Arc<KeywordProvider>) {
    let provider = Arc::new(KeywordProvider::new(vec![
        ("invoice overdue", unit3(0.91, 0.40)),
        ("weather", unit3(0.15, 0.10)),
        ("Billing", vec![1.0, 0.0, 0.0]),
        ("Travel", vec![0.0, 1.0, 0.0]),
    ]));
    let classifier = Classifier::new(provider.clone(), Lang::En, 0.28, Duration::from_secs(5));
    (classifier, provider)
}

// ─── Scoring and thresholding ───────────────────────────────────────

#[test]
fn test_best_category_wins() {
    let (classifier, _) = keyword_classifier();
    classifier.add_category("Billing", None, &[]).unwrap();
    classifier.add_category("Travel", None, &[]).unwrap();

    let outcome = classifier.classify("Your invoice overdue notice");
    let result = outcome.result().expect("classified");
    assert_eq!(result.predicted_category, "Billing");
    assert!((result.best_similarity - 0.91).abs() < 1e-4);

    let order: Vec<&str> = result
        .ranked_scores
        .iter()
        .map(|s| s.category.as_str())
        .collect();
    assert_eq!(order, ["Billing", "Travel"]);
    assert!((result.ranked_scores[1].similarity - 0.40).abs() < 1e-4);
}

#[test]
fn test_low_similarity_is_undetermined() {
    let (classifier, _) = keyword_classifier();
    classifier.add_category("Billing", None, &[]).unwrap();
    classifier.add_category("Travel", None, &[]).unwrap();

    let outcome = classifier.classify("Nice weather today");
    let result = outcome.result().expect("classified");
    assert_eq!(result.predicted_category, UNDETERMINED);
    assert!(result.is_undetermined());
    assert!((result.best_similarity - 0.15).abs() < 1e-4);
    assert_eq!(result.ranked_scores.len(), 2);
}

#[test]
fn test_threshold_can_be_lowered() {
    let (classifier, _) = keyword_classifier();
    classifier.add_category("Billing", None, &[]).unwrap();
    classifier.set_threshold(0.1);

    let outcome = classifier.classify("Nice weather today");
    assert_eq!(outcome.result().unwrap().predicted_category, "Billing");
}

#[test]
fn test_empty_registry_reports_no_categories() {
    let (classifier, provider) = keyword_classifier();
    assert_eq!(classifier.classify("anything"), ClassifyOutcome::NoCategories);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

// ─── Registration ───────────────────────────────────────────────────

#[test]
fn test_examples_are_capped() {
    let (classifier, provider) = keyword_classifier();
    let examples: Vec<String> = (0..7).map(|i| format!("example {i}")).collect();
    classifier
        .add_category("Billing", Some("Invoices"), &examples)
        .unwrap();

    // Description prompt plus five examples, embedded in one call.
    assert_eq!(classifier.registry().exemplar_count("Billing"), Some(6));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_name_is_rejected() {
    let (classifier, _) = keyword_classifier();
    let err = classifier.add_category("   ", None, &[]).unwrap_err();
    assert!(matches!(err, MailLensError::ClassifierConfig(_)));
    assert!(classifier.registry().is_empty());
}

#[test]
fn test_overwrite_keeps_position() {
    let (classifier, _) = keyword_classifier();
    classifier.add_category("Billing", None, &[]).unwrap();
    classifier.add_category("Travel", None, &[]).unwrap();
    classifier
        .add_category("Billing", Some("Updated"), &["one".to_string()])
        .unwrap();

    assert_eq!(classifier.category_names(), ["Billing", "Travel"]);
    assert_eq!(classifier.registry().exemplar_count("Billing"), Some(2));
}

#[test]
fn test_remove_and_reset() {
    let (classifier, _) = keyword_classifier();
    classifier.add_category("Billing", None, &[]).unwrap();
    classifier.add_category("Travel", None, &[]).unwrap();

    assert!(classifier.remove_category("Billing"));
    assert!(!classifier.remove_category("Billing"));
    assert_eq!(classifier.category_names(), ["Travel"]);

    classifier.reset();
    assert_eq!(classifier.classify("x"), ClassifyOutcome::NoCategories);
}

// ─── Provider failures ──────────────────────────────────────────────

#[test]
fn test_failing_provider_is_reported() {
    let failing = Classifier::new(Arc::new(FailingProvider), Lang::En, 0.28, Duration::from_secs(1));
    let err = failing.add_category("Billing", None, &[]).unwrap_err();
    assert!(matches!(err, MailLensError::Provider(_)));
    assert!(failing.registry().is_empty());
}

#[test]
fn test_cancelled_call_is_reported() {
    let provider = Arc::new(KeywordProvider::new(vec![("Billing", vec![1.0, 0.0, 0.0])]));
    let classifier = Classifier::new(provider, Lang::En, 0.28, Duration::from_secs(5));
    classifier.add_category("Billing", None, &[]).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let call = CallOptions::with_timeout(Duration::from_secs(5)).cancellable(cancel);
    match classifier.classify_with("invoice", &call) {
        ClassifyOutcome::ProviderUnavailable { reason } => assert!(!reason.is_empty()),
        other => panic!("expected provider failure, got {other:?}"),
    }
}

// ─── End to end with the offline embedder ───────────────────────────

#[test]
fn test_catalog_examples_drive_classification() {
    use assert_fs::prelude::*;

    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("billing/1.eml")
        .write_str(
            "From: billing@example.com\nSubject: Invoice 1001\n\n\
             Your invoice 1001 for cloud hosting is attached. Payment is due in 14 days.\n",
        )
        .unwrap();
    temp.child("travel/1.eml")
        .write_str(
            "From: trips@example.com\nSubject: Flight booking\n\n\
             Your flight to Lisbon departs at 07:40. Boarding gate closes early.\n",
        )
        .unwrap();
    let catalog_file = temp.child("categories.toml");
    catalog_file
        .write_str(
            "[[category]]\nname = \"Billing\"\nexamples_dir = \"billing\"\n\n\
             [[category]]\nname = \"Travel\"\nexamples_dir = \"travel\"\n",
        )
        .unwrap();

    let pipeline = Pipeline::default();
    let classifier = Classifier::new(
        Arc::new(HashingEmbedder::new(256)),
        Lang::En,
        -1.0,
        Duration::from_secs(5),
    );
    let catalog = CategoryCatalog::load(catalog_file.path()).unwrap();
    for spec in &catalog.categories {
        let examples: Vec<String> = spec
            .example_files()
            .unwrap()
            .iter()
            .map(|path| {
                let data = std::fs::read(path).unwrap();
                pipeline.process(&data, "example.eml").unwrap().classification_text
            })
            .collect();
        classifier
            .add_category(&spec.name, spec.description.as_deref(), &examples)
            .unwrap();
    }

    let query = pipeline
        .process(
            b"From: billing@example.com\nSubject: Invoice 1002\n\n\
              Your invoice 1002 for cloud hosting is attached. Payment is due in 14 days.\n",
            "query.eml",
        )
        .unwrap();
    let outcome = classifier.classify(&query.classification_text);
    assert_eq!(outcome.result().unwrap().predicted_category, "Billing");

    temp.close().unwrap();
}
