//! On-premises embedding provider backed by an external process.
//!
//! Framing: the request `{"texts": [...]}` is written to the child's stdin,
//! which is then closed; the child prints a JSON array of vectors on stdout
//! and exits 0. Anything else is a provider failure.

use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use super::{l2_normalize, EmbeddingProvider};
use crate::config::LocalEmbeddingConfig;
use crate::deadline::Deadline;
use crate::error::{RagError, Result};

const PROVIDER: &str = "local";
const MAX_STDERR_CHARS: usize = 500;

#[derive(Serialize)]
struct LocalEmbedRequest<'a> {
    texts: &'a [String],
}

pub struct LocalEmbedder {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    // Bounds the number of embedder processes alive at once.
    permits: Arc<Semaphore>,
}

impl LocalEmbedder {
    pub fn new(config: &LocalEmbeddingConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    async fn run_process(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RagError::provider(PROVIDER, "embedder pool is closed"))?;

        let payload = serde_json::to_vec(&LocalEmbedRequest { texts })?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RagError::provider(PROVIDER, format!("failed to spawn '{}': {}", self.command, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RagError::provider(PROVIDER, "embedder stdin not available"))?;

        // stdout and stderr are drained while the request is still being written,
        // otherwise a child that logs before reading its input fills the pipe.
        let write_request = async move {
            match stdin.write_all(&payload).await {
                Ok(()) => Ok(()),
                // The child stopped reading; its exit status decides the outcome.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                Err(e) => Err(RagError::provider(
                    PROVIDER,
                    format!("failed to write request: {}", e),
                )),
            }
        };
        let collect_output = async {
            child
                .wait_with_output()
                .await
                .map_err(|e| RagError::provider(PROVIDER, format!("failed to wait for embedder: {}", e)))
        };
        let ((), output) = tokio::try_join!(write_request, collect_output)?;

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(RagError::provider(
                PROVIDER,
                format!("embedder exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        parse_vectors(&output.stdout, texts.len())
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, texts: &[String], deadline: &Deadline) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!("Embedding {} texts via local process '{}'", texts.len(), self.command);

        let timeout = self.timeout;
        deadline
            .run("local embedding", async {
                match tokio::time::timeout(timeout, self.run_process(texts)).await {
                    Ok(result) => result,
                    Err(_) => Err(RagError::provider(
                        PROVIDER,
                        format!("embedder timed out after {:?}", timeout),
                    )),
                }
            })
            .await
    }
}

fn parse_vectors(stdout: &[u8], expected: usize) -> Result<Vec<Vec<f32>>> {
    let vectors: Vec<Vec<f32>> = serde_json::from_slice(stdout).map_err(|e| {
        let preview: String = String::from_utf8_lossy(stdout).chars().take(200).collect();
        RagError::provider(PROVIDER, format!("malformed output: {}. Output: {}", e, preview))
    })?;

    if vectors.len() != expected {
        return Err(RagError::provider(
            PROVIDER,
            format!("returned {} vectors for {} texts", vectors.len(), expected),
        ));
    }

    Ok(vectors.into_iter().map(l2_normalize).collect())
}
