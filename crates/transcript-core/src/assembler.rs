mod ordering;
mod scratch;

pub use scratch::BatchScratch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::AssemblerConfig;
use crate::delivery::Delivery;
use crate::error::{BatchError, JobError};
use crate::merge::consolidate;
use crate::state::WorkerState;
use crate::traits::{JobServer, ObjectStore, TranscriptionEngine};
use crate::types::{transcript_key, Batch, ConsolidatedTranscript, Segment, TranscriptReport, TranscriptionOutput, Word, UNKNOWN_SPEAKER};

/// What happened to a transcription job that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
	/// Every batch was already processed; nothing was touched.
	AlreadyProcessed,
	/// No speech anywhere; reported as silent, nothing uploaded.
	Silent { report: Delivery },
	Transcribed {
		transcript_key: String,
		segment_count: usize,
		transcribed_batches: usize,
		resumed_batches: usize,
		report: Delivery,
	},
}

/// Turns a recording's batches into one consolidated transcript
pub struct TranscriptAssembler {
	server: Arc<dyn JobServer>,
	store: Arc<dyn ObjectStore>,
	engine: Arc<dyn TranscriptionEngine>,
	config: AssemblerConfig,
	state: Arc<WorkerState>,
}

impl TranscriptAssembler {
	pub fn new(
		server: Arc<dyn JobServer>,
		store: Arc<dyn ObjectStore>,
		engine: Arc<dyn TranscriptionEngine>,
		config: AssemblerConfig,
		state: Arc<WorkerState>,
	) -> Self {
		Self {
			server,
			store,
			engine,
			config,
			state,
		}
	}

	/// Transcribe every unprocessed batch of `recording_id`, reuse stored segments for the
	/// processed ones, then upload and report the consolidated transcript.
	///
	/// # Errors
	/// Fails when the descriptor cannot be fetched, any batch fails, or the upload fails.
	/// Report failures are logged and surface only as [`Delivery::Dropped`].
	#[instrument(name = "assemble_transcript", skip(self), fields(otel.kind = "internal"))]
	pub async fn process(&self, recording_id: &str) -> Result<JobOutcome, JobError> {
		let descriptor = self.server.recording(recording_id).await.map_err(|source| JobError::Descriptor {
			recording_id: recording_id.to_string(),
			source,
		})?;

		if descriptor.is_fully_processed() {
			info!(recording_id, batches = descriptor.batches.len(), "⏭️ All batches already processed");
			return Ok(JobOutcome::AlreadyProcessed);
		}

		let prior = self.prior_segments(recording_id).await;
		let batches = ordering::chronological(descriptor.batches);
		let total = batches.len();

		let mut segments: Vec<Segment> = Vec::new();
		let mut previous_end = 0.0_f64;
		let mut transcribed_batches = 0usize;
		let mut resumed_batches = 0usize;

		for (index, batch) in batches.iter().enumerate() {
			let batch_id = batch.batch_id();
			let stored: Vec<&Segment> = if batch.processed {
				prior.iter().filter(|s| s.batch_id.as_deref() == Some(batch_id)).collect()
			} else {
				Vec::new()
			};

			if stored.is_empty() {
				if batch.processed {
					warn!(recording_id, batch_id, "⚠️ Processed batch missing from stored transcript, transcribing again");
				}
				info!(recording_id, batch = index + 1, total, batch_id, "🎙️ Transcribing batch");
				let fresh = self.transcribe_batch(batch, previous_end).await.map_err(|source| JobError::Batch {
					index,
					total,
					batch_id: batch_id.to_string(),
					source,
				})?;
				segments.extend(fresh);
				transcribed_batches += 1;
			} else {
				debug!(recording_id, batch_id, segments = stored.len(), "♻️ Resuming batch from stored transcript");
				segments.extend(stored.into_iter().map(|s| s.clone().rebased(previous_end)));
				resumed_batches += 1;
			}

			previous_end += batch.duration();
		}

		self.state.record_batches(transcribed_batches as u64, resumed_batches as u64);

		if segments.iter().all(|s| s.silence) {
			info!(recording_id, "🔇 No speech detected, reporting silent recording");
			self.state.increment_silent_jobs();
			let report = Delivery::best_effort("report_transcript", self.server.report_transcript(recording_id, &TranscriptReport::silent())).await;
			return Ok(JobOutcome::Silent { report });
		}

		let segments = if self.config.merge_speakers { consolidate(segments) } else { segments };
		let segment_count = segments.len();
		let transcript = ConsolidatedTranscript {
			language: self.config.language.clone(),
			segments,
		};
		let body = serde_json::to_vec(&transcript)?;

		let key = transcript_key(&self.config.transcript_prefix, recording_id);
		self.store.upload(&key, body).await.map_err(JobError::Upload)?;
		info!(recording_id, key = %key, segment_count, transcribed_batches, resumed_batches, "📤 Transcript uploaded");

		let report = Delivery::best_effort("report_transcript", self.server.report_transcript(recording_id, &TranscriptReport::uploaded(key.clone()))).await;

		Ok(JobOutcome::Transcribed {
			transcript_key: key,
			segment_count,
			transcribed_batches,
			resumed_batches,
			report,
		})
	}

	async fn prior_segments(&self, recording_id: &str) -> Vec<Segment> {
		match self.server.transcript(recording_id).await {
			Ok(Some(segments)) => segments,
			Ok(None) => Vec::new(),
			Err(e) => {
				warn!(recording_id, error = %e, "⚠️ Could not fetch stored transcript, resuming nothing");
				Vec::new()
			}
		}
	}

	async fn transcribe_batch(&self, batch: &Batch, offset: f64) -> Result<Vec<Segment>, BatchError> {
		let scratch = BatchScratch::create(self.config.scratch_root.as_deref()).await.map_err(BatchError::Scratch)?;

		let audio = self.store.download(&batch.file_ref, scratch.path()).await.map_err(BatchError::Download)?;
		let hint = self.diarization_hint(batch, scratch.path()).await;

		let output = self.engine.transcribe(&audio, hint.as_deref()).await?;
		Ok(to_segments(output, batch, offset))
	}

	/// Best-effort: a missing or broken hint only costs speaker quality
	async fn diarization_hint(&self, batch: &Batch, dir: &Path) -> Option<PathBuf> {
		let key = batch.diarization_hint_ref.as_deref()?;

		match self.store.exists(key).await {
			Ok(true) => {}
			Ok(false) => {
				warn!(key, "⚠️ Diarization hint not found, continuing without it");
				return None;
			}
			Err(e) => {
				warn!(key, error = %e, "⚠️ Diarization hint lookup failed, continuing without it");
				return None;
			}
		}

		match self.store.download(key, dir).await {
			Ok(path) => Some(path),
			Err(e) => {
				warn!(key, error = %e, "⚠️ Diarization hint download failed, continuing without it");
				None
			}
		}
	}
}

/// Shift engine output onto the recording timeline, keeping batch-local times for resume
fn to_segments(output: TranscriptionOutput, batch: &Batch, offset: f64) -> Vec<Segment> {
	let batch_id = batch.batch_id();

	if output.is_empty() {
		return vec![Segment::silence(batch_id, batch.duration(), offset)];
	}

	output
		.segments
		.into_iter()
		.map(|segment| Segment {
			text: segment.text,
			start: segment.start_time + offset,
			end: segment.end_time + offset,
			words: segment
				.words
				.into_iter()
				.map(|word| Word {
					text: word.word,
					start: word.start_time + offset,
					end: word.end_time + offset,
					batch_start: word.start_time,
					batch_end: word.end_time,
					speaker: word.speaker.unwrap_or_else(|| UNKNOWN_SPEAKER.to_string()),
				})
				.collect(),
			speaker: segment.speaker,
			batch_id: Some(batch_id.to_string()),
			batch_start: segment.start_time,
			batch_end: segment.end_time,
			silence: false,
		})
		.collect()
}
