//! Embedding providers.
//!
//! Every call carries a [`CallOptions`] with a deadline and a cancellation
//! flag. Providers must return one vector per prompt, all of one fixed
//! dimensionality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use crate::model::classification::normalize;

/// Default dimensionality of [`HashingEmbedder`].
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// Granularity of cancellable sleeps between retries.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation for one provider call, retries included.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub deadline: Instant,
    pub cancel: CancelToken,
}

impl CallOptions {
    /// A call that must finish within `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel: CancelToken::new(),
        }
    }

    /// Attach an external cancellation token.
    pub fn cancellable(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Time left before the deadline, `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    /// Fail fast when the call was cancelled or its deadline passed.
    pub fn check(&self, attempts: usize) -> Result<Duration, ProviderError> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        self.remaining()
            .ok_or(ProviderError::DeadlineExceeded { attempts })
    }

    /// Sleep up to `duration`, waking early on cancellation or deadline.
    fn sleep(&self, duration: Duration, attempts: usize) -> Result<(), ProviderError> {
        let until = Instant::now() + duration;
        loop {
            let left = self.check(attempts)?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            thread::sleep(SLEEP_SLICE.min(until - now).min(left));
        }
    }
}

/// A text embedding backend.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed all `prompts` in one logical call, unit-normalizing when asked.
    fn embed_batch(
        &self,
        prompts: &[String],
        normalize: bool,
        call: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the provider selected by the configuration.
pub fn provider_from_config(
    config: &ProviderConfig,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    match config.kind {
        ProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.dimensions.unwrap_or(DEFAULT_HASHING_DIMENSION),
        ))),
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::from_config(config)?)),
    }
}

// ── Hashing embedder ────────────────────────────────────────────

/// Deterministic offline embedder based on signed feature hashing of
/// lowercase word unigrams and bigrams.
///
/// Texts that share words get positive similarity, which is enough for
/// smoke runs and tests without a model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut add = |feature: &str, weight: f32| {
            let mut state = fnv1a_64(feature.as_bytes());
            let bits = splitmix64(&mut state);
            let index = (bits % self.dimension as u64) as usize;
            let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
            vec[index] += sign * weight;
        };
        for token in &tokens {
            add(token, 1.0);
        }
        for pair in tokens.windows(2) {
            add(&format!("{} {}", pair[0], pair[1]), 0.5);
        }
        vec
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed_batch(
        &self,
        prompts: &[String],
        normalize_output: bool,
        call: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        call.check(0)?;
        Ok(prompts
            .iter()
            .map(|prompt| {
                let mut vec = self.embed_one(prompt);
                if normalize_output {
                    normalize(&mut vec);
                }
                vec
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ── OpenAI-compatible embedder ──────────────────────────────────

/// Blocking client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_attempts: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Build a client; the API key is read from `config.api_key_env`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ProviderError::Unavailable(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        if api_key.trim().is_empty() {
            return Err(ProviderError::Unavailable("empty API key".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::Unavailable("missing embedding model name".to_string()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| ProviderError::Unavailable(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_attempts: config.max_attempts.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    /// One request with retry and backoff, bounded by the call deadline.
    fn request(&self, inputs: &[String], call: &CallOptions) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut attempt = 0usize;
        loop {
            let remaining = call.check(attempt)?;
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
                dimensions: self.dimensions,
            };
            let response = self
                .client
                .post(&self.endpoint)
                .timeout(remaining)
                .json(&request)
                .send();
            attempt += 1;

            let failure = match response {
                Ok(resp) if resp.status().is_success() => {
                    let mut parsed: EmbeddingResponse = resp
                        .json()
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                    parsed.data.sort_by_key(|entry| entry.index);
                    if parsed.data.len() != inputs.len() {
                        return Err(ProviderError::InvalidResponse(format!(
                            "{} embeddings for {} inputs",
                            parsed.data.len(),
                            inputs.len()
                        )));
                    }
                    return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    let message = format!("request failed ({status}): {body}");
                    if !should_retry(status) {
                        return Err(ProviderError::Unavailable(message));
                    }
                    message
                }
                Err(err) => {
                    let message = err.to_string();
                    if !is_retryable_error(&err) {
                        return Err(ProviderError::Unavailable(message));
                    }
                    message
                }
            };

            if attempt >= self.max_attempts {
                return Err(ProviderError::Unavailable(format!(
                    "{failure} (after {attempt} attempts)"
                )));
            }
            warn!(attempt = attempt, error = %failure, "Embedding request failed, retrying");
            call.sleep(retry_backoff(attempt), attempt)?;
        }
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed_batch(
        &self,
        prompts: &[String],
        normalize_output: bool,
        call: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(prompts.len());
        for chunk in prompts.chunks(self.batch_size) {
            debug!(prompts = chunk.len(), model = %self.model, "Requesting embeddings");
            vectors.extend(self.request(chunk, call)?);
        }

        if let Some(first) = vectors.first() {
            let dim = first.len();
            if vectors.iter().any(|v| v.len() != dim) {
                return Err(ProviderError::InvalidResponse(
                    "embeddings of mixed dimensionality".to_string(),
                ));
            }
        }
        if normalize_output {
            vectors.iter_mut().for_each(|v| normalize(v));
        }
        Ok(vectors)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() || err.is_decode()
}

/// 500 ms doubled per attempt, capped at 16 s.
fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
