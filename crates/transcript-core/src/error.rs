use std::path::PathBuf;

use crate::retry::RetryError;

/// Failures talking to the job queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("Error polling messages from queue: {0}")]
	Poll(String),

	#[error("Failed deleting queue message: {0}")]
	Delete(String),
}

/// Failures talking to the object store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Object {0} not found")]
	NotFound(String),

	#[error("Failed to download {key}: {message}")]
	Download { key: String, message: String },

	#[error("Failed to upload {key}: {message}")]
	Upload { key: String, message: String },

	#[error("Store I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Failures invoking the external transcription engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("Failed to start transcription engine: {0}")]
	Spawn(#[source] std::io::Error),

	#[error("Transcription engine failed with code {code:?}: {stderr}")]
	Exit { code: Option<i32>, stderr: String },

	#[error("Transcription result {path} could not be read: {source}")]
	MissingOutput {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Transcription result is not valid JSON: {0}")]
	InvalidOutput(#[from] serde_json::Error),

	#[error("Transcription engine unavailable: {0}")]
	Unavailable(String),
}

/// Failures talking to the job server HTTP API
#[derive(Debug, thiserror::Error)]
pub enum JobServerError {
	#[error("Job server request to {path} failed: {message}")]
	Request { path: String, message: String },

	#[error("Job server returned {status} for {path}")]
	Status { path: String, status: u16 },

	#[error("Job server response for {path} could not be decoded: {message}")]
	Decode { path: String, message: String },
}

/// Failures talking to the fleet control plane
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
	#[error("Failed to resolve instance id: {0}")]
	InstanceId(String),

	#[error("Error completing lifecycle action: {0}")]
	Complete(String),

	#[error("Error sending heartbeat to auto scaling group: {0}")]
	Heartbeat(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
	#[error("Analyzer failed: {0}")]
	Failed(String),

	#[error("Analyzer returned unusable insights: {0}")]
	Malformed(String),
}

/// Failure while processing a single batch
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
	#[error("download failed: {0}")]
	Download(#[source] StoreError),

	#[error("transcription failed: {0}")]
	Engine(#[from] EngineError),

	#[error("scratch directory unavailable: {0}")]
	Scratch(#[source] std::io::Error),
}

/// Failure of a whole job; any of these aborts the job and is logged by the manager
#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("Failed to fetch recording {recording_id}: {source}")]
	Descriptor {
		recording_id: String,
		#[source]
		source: JobServerError,
	},

	#[error("Error processing recording batch {} of {total} ({batch_id}): {source}", .index + 1)]
	Batch {
		index: usize,
		total: usize,
		batch_id: String,
		#[source]
		source: BatchError,
	},

	#[error("Failed to serialize transcript: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("Failed to upload transcript: {0}")]
	Upload(#[source] StoreError),

	#[error("Recording {0} has no stored transcript to analyze")]
	TranscriptMissing(String),

	#[error("Failed to fetch transcript for {recording_id}: {source}")]
	TranscriptFetch {
		recording_id: String,
		#[source]
		source: JobServerError,
	},

	#[error("Insight analysis failed: {0}")]
	Analysis(#[from] RetryError<AnalysisError>),
}

impl JobError {
	/// Zero-based position of the failing batch, if the job died inside one
	#[must_use]
	pub const fn batch_index(&self) -> Option<usize> {
		match self {
			Self::Batch { index, .. } => Some(*index),
			_ => None,
		}
	}
}
