//! Google Generative Language embedding provider.
//!
//! Documents go through `:batchEmbedContents` with task type
//! `RETRIEVAL_DOCUMENT`, in batches of at most `batch_size` texts. Queries go
//! through `:embedContent` with task type `RETRIEVAL_QUERY`. Transient
//! failures are retried per the configured [`RetryPolicy`].

use async_trait::async_trait;
use docvec_core::config::EmbeddingConfig;
use docvec_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::embeddings::{EmbeddingProvider, RetryPolicy};

const DOCUMENT_TASK: &str = "RETRIEVAL_DOCUMENT";
const QUERY_TASK: &str = "RETRIEVAL_QUERY";

/// Service limit on texts per batch request.
const MAX_BATCH_SIZE: usize = 100;

/// Embedding provider backed by the Google Generative Language API.
#[derive(Clone)]
pub struct GoogleProvider {
    client: Client,
    endpoint: String,
    /// Fully qualified model name ("models/...")
    model: String,
    api_key: String,
    dimensions: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let model = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model,
            api_key: api_key.to_string(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.clamp(1, MAX_BATCH_SIZE),
            retry: RetryPolicy::from_config(config),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.endpoint, self.model, method)
    }

    /// POST `body` and return the response text, classifying failures.
    async fn post<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> AppResult<String> {
        let url = self.url(method);
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::transient(format!("Request to embedding API failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::transient(format!("Failed to read embedding API response: {}", e))
        })?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        Ok(text)
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_chunk(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        parts: [Part {
                            text: text.as_str(),
                        }],
                    },
                    task_type: DOCUMENT_TASK,
                })
                .collect(),
        };

        let body = self
            .retry
            .run("batchEmbedContents", || self.post("batchEmbedContents", &request))
            .await?;

        parse_batch_response(&body, texts.len(), self.dimensions)
    }
}

#[async_trait]
impl EmbeddingProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(texts = texts.len(), provider = "google"))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_chunk(batch).await?);
        }

        Ok(embeddings)
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), provider = "google"))]
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let request = EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: QUERY_TASK,
        };

        let body = self
            .retry
            .run("embedContent", || self.post("embedContent", &request))
            .await?;

        parse_single_response(&body, self.dimensions)
    }
}

/// Map a non-success HTTP response onto a transient or permanent error.
fn classify_failure(status: StatusCode, body: &str) -> AppError {
    let (message, api_status) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => (parsed.error.message, parsed.error.status),
        Err(_) => (body.trim().to_string(), None),
    };

    let detail = match api_status {
        Some(api_status) => format!("{} {}: {}", status, api_status, message),
        None => format!("{}: {}", status, message),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        if is_quota_exhausted(&message) {
            return AppError::permanent(format!("Embedding quota exhausted ({})", detail));
        }
        return AppError::transient(format!("Embedding API rate limited ({})", detail));
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return AppError::transient(format!("Embedding API unavailable ({})", detail));
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::permanent(format!("Embedding API rejected credentials ({})", detail))
        }
        _ => AppError::permanent(format!("Embedding API request failed ({})", detail)),
    }
}

/// Daily and billing quotas do not recover within a retry window.
fn is_quota_exhausted(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("billing") || lower.contains("per day") || lower.contains("daily")
}

fn parse_batch_response(body: &str, expected: usize, dimensions: usize) -> AppResult<Vec<Vec<f32>>> {
    let parsed: BatchEmbedResponse = serde_json::from_str(body)
        .map_err(|e| AppError::permanent(format!("Malformed embedding response: {}", e)))?;

    if parsed.embeddings.len() != expected {
        return Err(AppError::permanent(format!(
            "Embedding API returned {} vectors for {} texts",
            parsed.embeddings.len(),
            expected
        )));
    }

    parsed
        .embeddings
        .into_iter()
        .map(|embedding| check_dimensions(embedding.values, dimensions))
        .collect()
}

fn parse_single_response(body: &str, dimensions: usize) -> AppResult<Vec<f32>> {
    let parsed: EmbedContentResponse = serde_json::from_str(body)
        .map_err(|e| AppError::permanent(format!("Malformed embedding response: {}", e)))?;

    check_dimensions(parsed.embedding.values, dimensions)
}

fn check_dimensions(values: Vec<f32>, dimensions: usize) -> AppResult<Vec<f32>> {
    if values.len() != dimensions {
        return Err(AppError::permanent(format!(
            "Unexpected embedding dimensions: got {}, expected {}",
            values.len(),
            dimensions
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = BatchEmbedRequest {
            requests: vec![EmbedContentRequest {
                model: "models/text-embedding-004",
                content: Content {
                    parts: [Part { text: "hello" }],
                },
                task_type: DOCUMENT_TASK,
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "requests": [{
                    "model": "models/text-embedding-004",
                    "content": {"parts": [{"text": "hello"}]},
                    "taskType": "RETRIEVAL_DOCUMENT"
                }]
            })
        );
    }

    #[test]
    fn test_model_prefix_and_batch_clamp() {
        let config = EmbeddingConfig {
            model: "text-embedding-004".to_string(),
            endpoint: "http://localhost:9/v1beta/".to_string(),
            batch_size: 500,
            ..EmbeddingConfig::default()
        };
        let provider = GoogleProvider::new(&config, "key").unwrap();

        assert_eq!(provider.model_name(), "models/text-embedding-004");
        assert_eq!(provider.batch_size, MAX_BATCH_SIZE);
        assert_eq!(
            provider.url("embedContent"),
            "http://localhost:9/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = GoogleProvider::new(&EmbeddingConfig::default(), "super-secret").unwrap();
        assert!(!format!("{:?}", provider).contains("super-secret"));
    }

    #[test]
    fn test_parse_batch_response() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2,0.3]},{"values":[0.4,0.5,0.6]}]}"#;
        let vectors = parse_batch_response(body, 2, 3).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    }

    #[test]
    fn test_parse_rejects_wrong_count_and_dimensions() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2,0.3]}]}"#;
        assert!(!parse_batch_response(body, 2, 3).unwrap_err().is_transient());
        assert!(!parse_batch_response(body, 1, 4).unwrap_err().is_transient());
    }

    #[test]
    fn test_parse_single_response() {
        let body = r#"{"embedding":{"values":[1.0,0.0]}}"#;
        assert_eq!(parse_single_response(body, 2).unwrap(), vec![1.0, 0.0]);

        let err = parse_single_response("<html>oops</html>", 2).unwrap_err();
        assert!(matches!(err, AppError::Embedding { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_failure() {
        let invalid_key = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, invalid_key);
        assert!(!err.is_transient());
        assert!(err.to_string().contains("API key not valid"));

        assert!(!classify_failure(StatusCode::FORBIDDEN, "").is_transient());
        assert!(classify_failure(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom").is_transient());

        let rate_limited = r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_failure(StatusCode::TOO_MANY_REQUESTS, rate_limited).is_transient());

        let daily = r#"{"error":{"code":429,"message":"Quota exceeded for metric: embed_content_requests per day","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(!classify_failure(StatusCode::TOO_MANY_REQUESTS, daily).is_transient());
    }
}
