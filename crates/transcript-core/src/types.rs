use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ANALYZE_PROCESSING_TYPE: &str = "analyze";

/// Speaker label used when the engine could not attribute a word
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// One audio sub-file of a recording, as described by the job server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(alias = "fileKey")]
	pub file_ref: String,
	/// Recording-relative start, seconds
	pub start: f64,
	/// Recording-relative end, seconds
	pub end: f64,
	#[serde(default, alias = "isTranscripted")]
	pub processed: bool,
	#[serde(default, alias = "doaKey", skip_serializing_if = "Option::is_none")]
	pub diarization_hint_ref: Option<String>,
}

impl Batch {
	/// Stable identifier used to match resumed segments; falls back to the file reference
	#[must_use]
	pub fn batch_id(&self) -> &str {
		self.id.as_deref().filter(|id| !id.is_empty()).unwrap_or(&self.file_ref)
	}

	/// Declared duration, never negative
	#[must_use]
	pub fn duration(&self) -> f64 {
		(self.end - self.start).max(0.0)
	}

	/// Recording timestamp embedded at the end of the file name (`.../<name>_<ts>.<ext>`)
	#[must_use]
	pub fn recorded_at(&self) -> u64 {
		timestamp_from_file_ref(&self.file_ref)
	}
}

/// Extract the trailing `_<number>` of a file reference; anything unparseable is zero.
#[must_use]
pub fn timestamp_from_file_ref(file_ref: &str) -> u64 {
	let file_name = file_ref.rsplit('/').next().unwrap_or_default();
	let tail = file_name.rsplit('_').next().unwrap_or_default();
	let stem = tail.split('.').next().unwrap_or_default();
	stem.parse().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDescriptor {
	#[serde(default)]
	pub batches: Vec<Batch>,
}

impl RecordingDescriptor {
	#[must_use]
	pub fn is_fully_processed(&self) -> bool {
		self.batches.iter().all(|batch| batch.processed)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
	#[serde(rename = "word", alias = "text")]
	pub text: String,
	pub start: f64,
	pub end: f64,
	#[serde(default)]
	pub batch_start: f64,
	#[serde(default)]
	pub batch_end: f64,
	#[serde(default = "unknown_speaker")]
	pub speaker: String,
}

fn unknown_speaker() -> String {
	UNKNOWN_SPEAKER.to_string()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
	!*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
	pub text: String,
	/// Job-relative start, seconds
	pub start: f64,
	/// Job-relative end, seconds
	pub end: f64,
	#[serde(default)]
	pub words: Vec<Word>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub speaker: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub batch_id: Option<String>,
	#[serde(default)]
	pub batch_start: f64,
	#[serde(default)]
	pub batch_end: f64,
	/// Placeholder standing in for a batch the engine found no speech in
	#[serde(default, skip_serializing_if = "is_false")]
	pub silence: bool,
}

impl Segment {
	/// Placeholder covering a whole silent batch
	#[must_use]
	pub fn silence(batch_id: &str, duration: f64, offset: f64) -> Self {
		Self {
			text: String::new(),
			start: offset,
			end: offset + duration,
			words: Vec::new(),
			speaker: None,
			batch_id: Some(batch_id.to_string()),
			batch_start: 0.0,
			batch_end: duration,
			silence: true,
		}
	}

	/// Re-anchor a stored segment onto the current timeline using its batch-local times
	#[must_use]
	pub fn rebased(mut self, offset: f64) -> Self {
		self.start = self.batch_start + offset;
		self.end = self.batch_end + offset;
		for word in &mut self.words {
			word.start = word.batch_start + offset;
			word.end = word.batch_end + offset;
		}
		self
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedTranscript {
	pub language: String,
	pub segments: Vec<Segment>,
}

/// Body of `POST /recording/{id}/transcript`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptReport {
	pub transcript_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_silent: Option<bool>,
}

impl TranscriptReport {
	#[must_use]
	pub fn uploaded(key: impl Into<String>) -> Self {
		Self {
			transcript_key: Some(key.into()),
			is_silent: None,
		}
	}

	#[must_use]
	pub const fn silent() -> Self {
		Self {
			transcript_key: None,
			is_silent: Some(true),
		}
	}
}

/// Raw engine word, batch-local times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineWord {
	pub word: String,
	pub start_time: f64,
	pub end_time: f64,
	#[serde(default)]
	pub speaker: Option<String>,
}

/// Raw engine segment, batch-local times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSegment {
	pub text: String,
	pub start_time: f64,
	pub end_time: f64,
	#[serde(default)]
	pub words: Vec<EngineWord>,
	/// Set by engines that diarize without word timestamps
	#[serde(default)]
	pub speaker: Option<String>,
}

/// What one engine run produced for one batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "EngineOutputShape")]
pub struct TranscriptionOutput {
	pub segments: Vec<EngineSegment>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EngineOutputShape {
	Wrapped { segments: Vec<EngineSegment> },
	Bare(Vec<EngineSegment>),
}

impl From<EngineOutputShape> for TranscriptionOutput {
	fn from(shape: EngineOutputShape) -> Self {
		match shape {
			EngineOutputShape::Wrapped { segments } | EngineOutputShape::Bare(segments) => Self { segments },
		}
	}
}

impl TranscriptionOutput {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}
}

/// How a queue message should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingKind {
	Transcribe,
	Analyze,
}

impl ProcessingKind {
	#[must_use]
	pub fn from_attribute(value: Option<&str>) -> Self {
		match value {
			Some(ANALYZE_PROCESSING_TYPE) => Self::Analyze,
			_ => Self::Transcribe,
		}
	}
}

/// A message pulled from the job queue
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueMessage {
	pub id: String,
	pub body: Option<String>,
	pub receipt_handle: Option<String>,
	pub processing_type: Option<String>,
}

impl QueueMessage {
	/// The job id carried in the body, if the body is not blank
	#[must_use]
	pub fn job_id(&self) -> Option<&str> {
		self.body.as_deref().map(str::trim).filter(|body| !body.is_empty())
	}

	#[must_use]
	pub fn kind(&self) -> ProcessingKind {
		ProcessingKind::from_attribute(self.processing_type.as_deref())
	}
}

/// Object key the consolidated transcript of `recording_id` is uploaded under
#[must_use]
pub fn transcript_key(prefix: &str, recording_id: &str) -> String {
	let prefix = prefix.trim_matches('/');
	if prefix.is_empty() {
		format!("{recording_id}_transcript.json")
	} else {
		format!("{prefix}/{recording_id}_transcript.json")
	}
}

/// File name an object is stored under locally
#[must_use]
pub fn local_file_name(key: &str) -> &str {
	Path::new(key).file_name().and_then(|name| name.to_str()).unwrap_or(key)
}
