use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AnalysisError, EngineError, FleetError, JobError, JobServerError, QueueError, StoreError};
use crate::types::{QueueMessage, RecordingDescriptor, Segment, TranscriptReport, TranscriptionOutput};

/// Source of job messages with visibility-timeout semantics
#[async_trait::async_trait]
pub trait JobQueue: Send + Sync + 'static {
	/// Long-poll for up to `max_messages`, leasing each for `visibility`.
	async fn receive(&self, max_messages: usize, wait: Duration, visibility: Duration) -> Result<Vec<QueueMessage>, QueueError>;

	/// Acknowledge a message so it is never redelivered.
	async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + 'static {
	/// Fetch `key` into `dir`, returning the local file path.
	async fn download(&self, key: &str, dir: &Path) -> Result<PathBuf, StoreError>;

	/// Store `body` under `key`, replacing any previous object.
	async fn upload(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

	async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Remote owner of recording descriptors and transcripts
#[async_trait::async_trait]
pub trait JobServer: Send + Sync + 'static {
	async fn recording(&self, recording_id: &str) -> Result<RecordingDescriptor, JobServerError>;

	/// Previously stored transcript segments; `Ok(None)` when the server has none.
	async fn transcript(&self, recording_id: &str) -> Result<Option<Vec<Segment>>, JobServerError>;

	async fn report_transcript(&self, recording_id: &str, report: &TranscriptReport) -> Result<(), JobServerError>;

	async fn post_insights(&self, recording_id: &str, insights: &serde_json::Value) -> Result<(), JobServerError>;
}

/// Opaque speech-to-text engine. Times in the output are batch-local seconds.
#[async_trait::async_trait]
pub trait TranscriptionEngine: Send + Sync + 'static {
	async fn transcribe(&self, audio: &Path, diarization_hint: Option<&Path>) -> Result<TranscriptionOutput, EngineError>;
}

/// Autoscaling control plane the worker reports liveness to
#[async_trait::async_trait]
pub trait FleetControl: Send + Sync + 'static {
	async fn instance_id(&self) -> Result<String, FleetError>;

	/// Let a pending scale-in proceed (`CONTINUE`).
	async fn complete_lifecycle_action(&self, instance_id: &str, hook_name: &str) -> Result<(), FleetError>;

	/// Extend a pending scale-in while the worker is busy.
	async fn record_heartbeat(&self, instance_id: &str, hook_name: &str) -> Result<(), FleetError>;
}

#[async_trait::async_trait]
pub trait InsightAnalyzer: Send + Sync + 'static {
	async fn analyze(&self, segments: &serde_json::Value) -> Result<serde_json::Value, AnalysisError>;
}

/// What the manager runs for each queue message that carries a job id
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync + 'static {
	async fn handle(&self, message: &QueueMessage) -> Result<(), JobError>;
}
