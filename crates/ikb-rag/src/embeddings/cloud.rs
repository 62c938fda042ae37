//! Cloud embedding provider speaking the Gemini `batchEmbedContents` API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{l2_normalize, EmbeddingProvider};
use crate::config::CloudEmbeddingConfig;
use crate::deadline::Deadline;
use crate::error::{RagError, Result};

const PROVIDER: &str = "cloud";
/// Largest number of texts `batchEmbedContents` accepts in one call.
const MAX_BATCH: usize = 100;

pub struct CloudEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl CloudEmbedder {
    pub fn new(config: &CloudEmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build embedding client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{}:batchEmbedContents",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Splits `texts` into API-sized calls, preserving order.
    fn build_requests<'a>(&'a self, texts: &'a [String]) -> Vec<BatchEmbedRequest<'a>> {
        texts
            .chunks(MAX_BATCH)
            .map(|batch| self.build_request(batch))
            .collect()
    }

    fn build_request<'a>(&'a self, texts: &'a [String]) -> BatchEmbedRequest<'a> {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: format!("models/{}", self.model),
                    content: Content {
                        parts: vec![Part {
                            text: text.as_str(),
                        }],
                    },
                })
                .collect(),
        }
    }

    async fn send(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::provider(PROVIDER, "GEMINI_API_KEY is not set"));
        }

        let requests = self.build_requests(texts);
        let batches = requests.len();
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, request) in requests.iter().enumerate() {
            tracing::debug!(
                "Cloud embedding sub-batch {}/{} ({} texts)",
                i + 1,
                batches,
                request.requests.len()
            );
            vectors.extend(self.send_batch(request).await?);
        }
        Ok(vectors)
    }

    async fn send_batch(&self, request: &BatchEmbedRequest<'_>) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::provider(PROVIDER, format!("request to {} timed out", self.endpoint))
                } else {
                    RagError::provider(PROVIDER, format!("request to {} failed: {}", self.endpoint, e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::provider(PROVIDER, format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(RagError::provider(
                PROVIDER,
                format!("API error ({}): {}", status, preview),
            ));
        }

        parse_batch_response(&body, request.requests.len())
    }
}

#[async_trait]
impl EmbeddingProvider for CloudEmbedder {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, texts: &[String], deadline: &Deadline) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!("Embedding {} texts via cloud model {}", texts.len(), self.model);
        deadline.run("cloud embedding", self.send(texts)).await
    }
}

fn parse_batch_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let parsed: BatchEmbedResponse = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        RagError::provider(PROVIDER, format!("malformed response: {}. Body: {}", e, preview))
    })?;

    if parsed.embeddings.len() != expected {
        return Err(RagError::provider(
            PROVIDER,
            format!(
                "returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                expected
            ),
        ));
    }

    Ok(parsed
        .embeddings
        .into_iter()
        .map(|e| l2_normalize(e.values))
        .collect())
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(api_key: &str) -> CloudEmbedder {
        let config = CloudEmbeddingConfig {
            base_url: "https://example.invalid/v1beta/".to_string(),
            api_key: api_key.to_string(),
            ..CloudEmbeddingConfig::default()
        };
        CloudEmbedder::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_and_request_shape() {
        let embedder = embedder("key");
        assert_eq!(
            embedder.endpoint,
            "https://example.invalid/v1beta/models/text-embedding-004:batchEmbedContents"
        );

        let texts = vec!["pump".to_string(), "valve".to_string()];
        let body = serde_json::to_value(embedder.build_request(&texts)).unwrap();
        assert_eq!(body["requests"].as_array().unwrap().len(), 2);
        assert_eq!(body["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(body["requests"][1]["content"]["parts"][0]["text"], "valve");
    }

    #[test]
    fn test_parse_normalizes_vectors() {
        let body = r#"{"embeddings": [{"values": [3.0, 4.0]}, {"values": [0.0, 5.0]}]}"#;
        let vectors = parse_batch_response(body, 2).unwrap();
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert!((vectors[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_count_mismatch_and_garbage() {
        let body = r#"{"embeddings": [{"values": [1.0]}]}"#;
        assert!(matches!(parse_batch_response(body, 2), Err(RagError::Provider { .. })));
        assert!(matches!(parse_batch_response("<html>", 1), Err(RagError::Provider { .. })));
    }

    #[test]
    fn test_large_batches_are_split_in_order() {
        let embedder = embedder("key");
        let texts: Vec<String> = (0..250).map(|i| format!("chunk {}", i)).collect();
        let requests = embedder.build_requests(&texts);

        let sizes: Vec<usize> = requests.iter().map(|r| r.requests.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(requests[0].requests[0].content.parts[0].text, "chunk 0");
        assert_eq!(requests[1].requests[0].content.parts[0].text, "chunk 100");
        assert_eq!(requests[2].requests[49].content.parts[0].text, "chunk 249");

        assert_eq!(embedder.build_requests(&texts[..100]).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let embedder = embedder("");
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = embedder
            .embed(&["text".to_string()], &deadline)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let embedder = embedder("");
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(embedder.embed(&[], &deadline).await.unwrap().is_empty());
    }
}
