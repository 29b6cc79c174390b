use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::workspace::{BlockType, Workspace};

pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Blocks shorter than this after trimming carry no embedding.
const MIN_EMBED_CHARS: usize = 3;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// External text→vector mapping.
///
/// Implementations must preserve input order and be deterministic for a
/// pinned model identifier; callers pin the identifier via `model_id`.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    fn model_id(&self) -> &str;
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed every qualifying block in place, batch by batch.
///
/// Qualifying: type ≠ skip and trimmed text length ≥ 3. Internal newlines
/// collapse to spaces before encoding. Returns the number of blocks embedded.
pub async fn embed_workspace<E: Embedder>(
    workspace: &mut Workspace,
    embedder: &E,
    batch_size: usize,
    progress: bool,
) -> Result<usize> {
    let mut targets: Vec<usize> = Vec::new();
    let mut texts: Vec<String> = Vec::new();

    for (i, block) in workspace.blocks.iter().enumerate() {
        if block.kind == BlockType::Skip {
            continue;
        }
        if block.text.trim().chars().count() < MIN_EMBED_CHARS {
            continue;
        }
        targets.push(i);
        texts.push(block.text.replace('\n', " "));
    }

    let pb = if progress {
        let pb = ProgressBar::new(texts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .expect("progress template")
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let mut out = embedder.encode(batch).await?;
        if out.len() != batch.len() {
            return Err(Error::Embedding {
                message: format!(
                    "embedder returned {} vectors for {} texts",
                    out.len(),
                    batch.len()
                ),
            });
        }
        vectors.append(&mut out);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    for (&target, vector) in targets.iter().zip(vectors) {
        workspace.blocks[target].embedding = Some(vector);
    }
    Ok(targets.len())
}

// ── HTTP backend ──

/// Async client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Owns its own bounded retry policy for rate limits and server errors; the
/// pipeline core never retries.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Embedding {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| Error::Embedding {
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Embedding {
                message: format!("{status}: {detail}"),
            });
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| Error::Embedding {
                message: e.to_string(),
            })?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(Error::Embedding {
                message: format!(
                    "endpoint returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
            });
        }
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        for attempt in 0..MAX_RETRIES {
            match self.request_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) => {
                    let retryable = matches!(&err, Error::Embedding { message }
                        if message.contains("429")
                            || message.contains("500")
                            || message.contains("502")
                            || message.contains("503"));
                    if !retryable {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "embedding request failed (attempt {}/{}), backing off {:.1}s: {}",
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64(),
                        err
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        self.request_batch(texts).await
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

// ── Hash backend ──

/// Deterministic feature-hashing embedder for offline runs and tests.
///
/// Tokens hash into sign-split buckets, so identical texts always map to
/// identical vectors and overlapping texts land near each other. Not a
/// semantic model; a stand-in with the same contract.
#[derive(Debug)]
pub struct HashEmbedder {
    dimension: usize,
    model: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: format!("feature-hash-{dimension}"),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h as usize) % self.dimension;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ── Tests ──
