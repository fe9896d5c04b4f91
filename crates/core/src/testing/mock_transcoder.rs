//! Mock transcoder for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

use crate::transcoder::{Transcoder, TranscoderError, MANIFEST_NAME};

/// A recorded encode call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    pub job_id: String,
    pub input: PathBuf,
    /// Whether the input file existed when the encode started.
    pub input_existed: bool,
    pub audio_only: bool,
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Track encode calls for assertions
/// - Simulate success/failure
/// - Hold encodes until the test releases them
/// - Simulate encode duration
///
/// Successful encodes write a small fake DASH tree (`dash.mpd` plus two
/// segments) to a fresh directory under the system temp dir.
#[derive(Debug, Clone)]
pub struct MockTranscoder {
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    next_error: Arc<RwLock<Option<TranscoderError>>>,
    encode_duration_ms: Arc<RwLock<u64>>,
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    started: Arc<RwLock<usize>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            encodes: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            encode_duration_ms: Arc::new(RwLock::new(0)),
            gate: Arc::new(RwLock::new(None)),
            started: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded (finished) encodes.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Get the number of finished encodes.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Number of encodes that have started, finished or not.
    pub async fn started_count(&self) -> usize {
        *self.started.read().await
    }

    /// Configure the next encode to fail with the given error.
    pub async fn set_next_error(&self, error: TranscoderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated encode duration.
    pub async fn set_encode_duration(&self, duration: Duration) {
        *self.encode_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Block every subsequent encode until [`release`](Self::release) is called.
    pub async fn hold(&self) {
        *self.gate.write().await = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held encodes proceed.
    pub async fn release(&self, n: usize) {
        if let Some(gate) = self.gate.read().await.as_ref() {
            gate.add_permits(n);
        }
    }

    /// Stop holding encodes, releasing every waiting one.
    pub async fn release_all(&self) {
        if let Some(gate) = self.gate.write().await.take() {
            gate.close();
        }
    }

    async fn write_fake_output(job_id: &str) -> Result<PathBuf, TranscoderError> {
        let dir = tempfile::Builder::new()
            .prefix("mock-dash-")
            .tempdir()?
            .keep();
        tokio::fs::write(
            dir.join(MANIFEST_NAME),
            format!("<MPD><!-- {job_id} --></MPD>"),
        )
        .await?;
        tokio::fs::write(dir.join("init0.m4s"), b"init").await?;
        tokio::fs::write(dir.join("chunk0-00001.m4s"), b"chunk").await?;
        Ok(dir)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn encode(
        &self,
        job_id: &str,
        input: &Path,
        audio_only: bool,
    ) -> Result<PathBuf, TranscoderError> {
        *self.started.write().await += 1;
        let input_existed = tokio::fs::try_exists(input).await.unwrap_or(false);

        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            // A closed gate means the test released everything.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let duration_ms = *self.encode_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        let result = match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None if !input_existed => Err(TranscoderError::InputNotFound {
                path: input.to_path_buf(),
            }),
            None => Self::write_fake_output(job_id).await,
        };

        self.encodes.write().await.push(RecordedEncode {
            job_id: job_id.to_string(),
            input: input.to_path_buf(),
            input_existed,
            audio_only,
            success: result.is_ok(),
        });

        result
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        Ok(())
    }
}
