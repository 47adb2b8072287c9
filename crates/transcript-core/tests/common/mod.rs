#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use transcript_core::{
	local_file_name, AnalysisError, Batch, EngineError, EngineSegment, EngineWord, FleetControl, FleetError, InsightAnalyzer, JobError, JobQueue,
	JobServer, JobServerError, MessageHandler, ObjectStore, QueueError, QueueMessage, RecordingDescriptor, Segment, StoreError, TranscriptReport,
	TranscriptionEngine, TranscriptionOutput,
};

pub fn batch(id: &str, file_ref: &str, start: f64, end: f64, processed: bool) -> Batch {
	Batch {
		id: Some(id.to_string()),
		file_ref: file_ref.to_string(),
		start,
		end,
		processed,
		diarization_hint_ref: None,
	}
}

pub fn spoken(text: &str, speaker: &str, start: f64, end: f64) -> EngineSegment {
	EngineSegment {
		text: text.to_string(),
		start_time: start,
		end_time: end,
		words: vec![EngineWord {
			word: text.to_string(),
			start_time: start,
			end_time: end,
			speaker: Some(speaker.to_string()),
		}],
		speaker: None,
	}
}

pub fn approx(a: f64, b: f64) -> bool {
	(a - b).abs() < 1e-9
}

// Job server

#[derive(Default)]
pub struct FakeServer {
	pub descriptors: Mutex<HashMap<String, RecordingDescriptor>>,
	pub transcripts: Mutex<HashMap<String, Vec<Segment>>>,
	pub transcript_fails: Mutex<bool>,
	pub report_fails: Mutex<bool>,
	pub reports: Mutex<Vec<(String, TranscriptReport)>>,
	pub insights: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeServer {
	pub fn with_recording(self, id: &str, batches: Vec<Batch>) -> Self {
		self.descriptors.lock().unwrap().insert(id.to_string(), RecordingDescriptor { batches });
		self
	}

	pub fn with_transcript(self, id: &str, segments: Vec<Segment>) -> Self {
		self.transcripts.lock().unwrap().insert(id.to_string(), segments);
		self
	}

	pub fn reports(&self) -> Vec<(String, TranscriptReport)> {
		self.reports.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl JobServer for FakeServer {
	async fn recording(&self, recording_id: &str) -> Result<RecordingDescriptor, JobServerError> {
		self.descriptors.lock().unwrap().get(recording_id).cloned().ok_or_else(|| JobServerError::Status {
			path: format!("/recording/{recording_id}"),
			status: 404,
		})
	}

	async fn transcript(&self, recording_id: &str) -> Result<Option<Vec<Segment>>, JobServerError> {
		if *self.transcript_fails.lock().unwrap() {
			return Err(JobServerError::Status {
				path: format!("/recording/{recording_id}/transcript"),
				status: 500,
			});
		}
		Ok(self.transcripts.lock().unwrap().get(recording_id).cloned())
	}

	async fn report_transcript(&self, recording_id: &str, report: &TranscriptReport) -> Result<(), JobServerError> {
		self.reports.lock().unwrap().push((recording_id.to_string(), report.clone()));
		if *self.report_fails.lock().unwrap() {
			return Err(JobServerError::Request {
				path: format!("/recording/{recording_id}/transcript"),
				message: "connection reset".to_string(),
			});
		}
		Ok(())
	}

	async fn post_insights(&self, recording_id: &str, insights: &serde_json::Value) -> Result<(), JobServerError> {
		self.insights.lock().unwrap().push((recording_id.to_string(), insights.clone()));
		Ok(())
	}
}

// Object store

#[derive(Default)]
pub struct FakeStore {
	pub objects: Mutex<HashMap<String, Vec<u8>>>,
	pub failing_downloads: Mutex<Vec<String>>,
	pub failing_lookups: Mutex<Vec<String>>,
	pub downloads: Mutex<Vec<String>>,
	pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
	pub upload_fails: Mutex<bool>,
	/// Directories downloads were written into
	pub scratch_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeStore {
	pub fn with_object(self, key: &str) -> Self {
		self.objects.lock().unwrap().insert(key.to_string(), key.as_bytes().to_vec());
		self
	}

	pub fn download_count(&self) -> usize {
		self.downloads.lock().unwrap().len()
	}

	pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
		self.uploads.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl ObjectStore for FakeStore {
	async fn download(&self, key: &str, dir: &Path) -> Result<PathBuf, StoreError> {
		self.downloads.lock().unwrap().push(key.to_string());
		self.scratch_dirs.lock().unwrap().push(dir.to_path_buf());

		if self.failing_downloads.lock().unwrap().iter().any(|k| k == key) {
			return Err(StoreError::Download {
				key: key.to_string(),
				message: "connection reset".to_string(),
			});
		}
		let body = self.objects.lock().unwrap().get(key).cloned().ok_or_else(|| StoreError::NotFound(key.to_string()))?;
		let path = dir.join(local_file_name(key));
		std::fs::write(&path, body)?;
		Ok(path)
	}

	async fn upload(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
		if *self.upload_fails.lock().unwrap() {
			return Err(StoreError::Upload {
				key: key.to_string(),
				message: "access denied".to_string(),
			});
		}
		self.uploads.lock().unwrap().push((key.to_string(), body));
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StoreError> {
		if self.failing_lookups.lock().unwrap().iter().any(|k| k == key) {
			return Err(StoreError::Io(std::io::Error::other("stale file handle")));
		}
		Ok(self.objects.lock().unwrap().contains_key(key))
	}
}

// Transcription engine

#[derive(Default)]
pub struct FakeEngine {
	/// Output per audio file name; unknown files transcribe to nothing
	pub outputs: Mutex<HashMap<String, TranscriptionOutput>>,
	pub failing: Mutex<Vec<String>>,
	/// (audio file name, hint file name) per call
	pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeEngine {
	pub fn with_output(self, file_name: &str, segments: Vec<EngineSegment>) -> Self {
		self.outputs.lock().unwrap().insert(file_name.to_string(), TranscriptionOutput { segments });
		self
	}

	pub fn failing_on(self, file_name: &str) -> Self {
		self.failing.lock().unwrap().push(file_name.to_string());
		self
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap().len()
	}
}

fn file_name(path: &Path) -> String {
	path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[async_trait::async_trait]
impl TranscriptionEngine for FakeEngine {
	async fn transcribe(&self, audio: &Path, diarization_hint: Option<&Path>) -> Result<TranscriptionOutput, EngineError> {
		assert!(audio.exists(), "audio must be downloaded before transcription");
		let name = file_name(audio);
		self.calls.lock().unwrap().push((name.clone(), diarization_hint.map(file_name)));

		if self.failing.lock().unwrap().contains(&name) {
			return Err(EngineError::Exit {
				code: Some(1),
				stderr: "CUDA out of memory".to_string(),
			});
		}
		Ok(self.outputs.lock().unwrap().get(&name).cloned().unwrap_or_default())
	}
}

// Queue

#[derive(Default)]
pub struct FakeQueue {
	/// One entry per poll; `None` simulates a poll failure. Exhausted script polls empty.
	pub script: Mutex<VecDeque<Option<Vec<QueueMessage>>>>,
	pub polls: AtomicUsize,
	pub deleted: Mutex<Vec<String>>,
}

impl FakeQueue {
	pub fn scripted(polls: Vec<Option<Vec<QueueMessage>>>) -> Self {
		Self {
			script: Mutex::new(polls.into()),
			..Self::default()
		}
	}

	pub fn deleted(&self) -> Vec<String> {
		self.deleted.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl JobQueue for FakeQueue {
	async fn receive(&self, max_messages: usize, _wait: Duration, _visibility: Duration) -> Result<Vec<QueueMessage>, QueueError> {
		self.polls.fetch_add(1, Ordering::SeqCst);
		match self.script.lock().unwrap().pop_front() {
			Some(Some(mut messages)) => {
				messages.truncate(max_messages);
				Ok(messages)
			}
			Some(None) => Err(QueueError::Poll("throttled".to_string())),
			None => Ok(Vec::new()),
		}
	}

	async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
		self.deleted.lock().unwrap().push(receipt_handle.to_string());
		Ok(())
	}
}

pub fn message(id: &str, body: Option<&str>) -> QueueMessage {
	QueueMessage {
		id: id.to_string(),
		body: body.map(str::to_string),
		receipt_handle: Some(format!("rh-{id}")),
		processing_type: None,
	}
}

/// Handler that sleeps, tracks peak concurrency and can fail or panic on demand
#[derive(Default)]
pub struct SlowHandler {
	pub delay: Duration,
	pub running: AtomicUsize,
	pub peak: AtomicUsize,
	pub handled: Mutex<Vec<String>>,
}

impl SlowHandler {
	pub fn new(delay: Duration) -> Self {
		Self { delay, ..Self::default() }
	}
}

#[async_trait::async_trait]
impl MessageHandler for SlowHandler {
	async fn handle(&self, message: &QueueMessage) -> Result<(), JobError> {
		let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
		tokio::time::sleep(self.delay).await;
		self.running.fetch_sub(1, Ordering::SeqCst);

		let body = message.job_id().unwrap_or_default().to_string();
		self.handled.lock().unwrap().push(body.clone());

		match body.as_str() {
			"panic" => panic!("handler blew up"),
			"fail" => Err(JobError::TranscriptMissing(body)),
			_ => Ok(()),
		}
	}
}

// Fleet

#[derive(Default)]
pub struct FakeFleet {
	pub instance_failures: Mutex<u32>,
	pub instance_lookups: AtomicUsize,
	pub complete_fails: Mutex<bool>,
	pub heartbeat_fails: Mutex<bool>,
	pub completions: Mutex<Vec<(String, String)>>,
	pub heartbeats: Mutex<Vec<(String, String)>>,
}

impl FakeFleet {
	pub fn completions(&self) -> usize {
		self.completions.lock().unwrap().len()
	}

	pub fn heartbeats(&self) -> usize {
		self.heartbeats.lock().unwrap().len()
	}
}

#[async_trait::async_trait]
impl FleetControl for FakeFleet {
	async fn instance_id(&self) -> Result<String, FleetError> {
		self.instance_lookups.fetch_add(1, Ordering::SeqCst);
		let mut failures = self.instance_failures.lock().unwrap();
		if *failures > 0 {
			*failures -= 1;
			return Err(FleetError::InstanceId("metadata timeout".to_string()));
		}
		Ok("i-0abc".to_string())
	}

	async fn complete_lifecycle_action(&self, instance_id: &str, hook_name: &str) -> Result<(), FleetError> {
		if *self.complete_fails.lock().unwrap() {
			return Err(FleetError::Complete("no active lifecycle action".to_string()));
		}
		self.completions.lock().unwrap().push((instance_id.to_string(), hook_name.to_string()));
		Ok(())
	}

	async fn record_heartbeat(&self, instance_id: &str, hook_name: &str) -> Result<(), FleetError> {
		if *self.heartbeat_fails.lock().unwrap() {
			return Err(FleetError::Heartbeat("throttled".to_string()));
		}
		self.heartbeats.lock().unwrap().push((instance_id.to_string(), hook_name.to_string()));
		Ok(())
	}
}

// Analyzer

pub struct FlakyAnalyzer {
	pub failures_left: Mutex<u32>,
	pub calls: AtomicUsize,
}

impl FlakyAnalyzer {
	pub fn failing(times: u32) -> Self {
		Self {
			failures_left: Mutex::new(times),
			calls: AtomicUsize::new(0),
		}
	}
}

#[async_trait::async_trait]
impl InsightAnalyzer for FlakyAnalyzer {
	async fn analyze(&self, segments: &serde_json::Value) -> Result<serde_json::Value, AnalysisError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let mut left = self.failures_left.lock().unwrap();
		if *left > 0 {
			*left -= 1;
			return Err(AnalysisError::Failed("model overloaded".to_string()));
		}
		let count = segments.as_array().map_or(0, Vec::len);
		Ok(serde_json::json!({ "summary": "ok", "segments": count }))
	}
}

pub fn shared<T>(value: T) -> Arc<T> {
	Arc::new(value)
}
