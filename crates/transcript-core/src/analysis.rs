use std::sync::Arc;
use tracing::{info, instrument};

use crate::delivery::Delivery;
use crate::error::JobError;
use crate::retry::retry;
use crate::traits::{InsightAnalyzer, JobServer};

/// Extra attempts granted to the analyzer before the job fails
pub const ANALYSIS_RETRIES: u32 = 4;

/// Feeds a stored transcript to the insight analyzer and posts what it finds
pub struct InsightForwarder {
	server: Arc<dyn JobServer>,
	analyzer: Arc<dyn InsightAnalyzer>,
	retries: u32,
}

impl InsightForwarder {
	pub fn new(server: Arc<dyn JobServer>, analyzer: Arc<dyn InsightAnalyzer>) -> Self {
		Self {
			server,
			analyzer,
			retries: ANALYSIS_RETRIES,
		}
	}

	#[must_use]
	pub const fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;
		self
	}

	/// # Errors
	/// Fails when the transcript is missing or unreadable, or the analyzer keeps failing.
	/// Posting the insights is best-effort.
	#[instrument(name = "forward_insights", skip(self), fields(otel.kind = "internal"))]
	pub async fn process(&self, recording_id: &str) -> Result<Delivery, JobError> {
		let segments = self
			.server
			.transcript(recording_id)
			.await
			.map_err(|source| JobError::TranscriptFetch {
				recording_id: recording_id.to_string(),
				source,
			})?
			.filter(|segments| !segments.is_empty())
			.ok_or_else(|| JobError::TranscriptMissing(recording_id.to_string()))?;

		let payload = serde_json::to_value(&segments)?;
		let analyzer = Arc::clone(&self.analyzer);
		let insights = retry("insight_analysis", self.retries, || analyzer.analyze(&payload)).await?;

		info!(recording_id, "🧠 Insights extracted");
		Ok(Delivery::best_effort("post_insights", self.server.post_insights(recording_id, &insights)).await)
	}
}
