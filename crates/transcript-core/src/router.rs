use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::InsightForwarder;
use crate::assembler::{JobOutcome, TranscriptAssembler};
use crate::error::JobError;
use crate::traits::MessageHandler;
use crate::types::{ProcessingKind, QueueMessage};

/// Sends each message to the pipeline its processing type asks for
pub struct JobRouter {
	assembler: Arc<TranscriptAssembler>,
	insights: Option<Arc<InsightForwarder>>,
}

impl JobRouter {
	/// Analyze messages are acknowledged and skipped until an analyzer is added with [`Self::with_insights`].
	pub fn new(assembler: Arc<TranscriptAssembler>) -> Self {
		Self { assembler, insights: None }
	}

	#[must_use]
	pub fn with_insights(mut self, insights: Arc<InsightForwarder>) -> Self {
		self.insights = Some(insights);
		self
	}
}

#[async_trait::async_trait]
impl MessageHandler for JobRouter {
	async fn handle(&self, message: &QueueMessage) -> Result<(), JobError> {
		let Some(recording_id) = message.job_id() else {
			return Ok(());
		};

		match message.kind() {
			ProcessingKind::Transcribe => {
				match self.assembler.process(recording_id).await? {
					JobOutcome::AlreadyProcessed => info!(recording_id, "⏭️ Nothing to transcribe"),
					JobOutcome::Silent { report } => info!(recording_id, reported = report.is_delivered(), "🔇 Silent recording"),
					JobOutcome::Transcribed {
						transcript_key,
						segment_count,
						report,
						..
					} => info!(recording_id, transcript_key = %transcript_key, segment_count, reported = report.is_delivered(), "📝 Recording transcribed"),
				}
				Ok(())
			}
			ProcessingKind::Analyze => {
				let Some(insights) = &self.insights else {
					warn!(recording_id, "⚠️ No insight analyzer configured, skipping analyze message");
					return Ok(());
				};
				let delivery = insights.process(recording_id).await?;
				info!(recording_id, posted = delivery.is_delivered(), "🧠 Recording analyzed");
				Ok(())
			}
		}
	}
}
