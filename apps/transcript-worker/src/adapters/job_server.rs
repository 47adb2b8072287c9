use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use transcript_core::{JobServer, JobServerError, RecordingDescriptor, Segment, TranscriptReport};

/// Every job server response is wrapped in `{ "data": ... }`
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
	data: T,
}

#[derive(Debug, Default, Deserialize)]
struct StoredTranscript {
	#[serde(default)]
	segments: Vec<Segment>,
}

#[derive(Debug, Serialize)]
struct InsightsBody<'a> {
	insights: &'a serde_json::Value,
}

/// reqwest client for the job server's `/worker` API
pub struct HttpJobServer {
	client: Client,
	base_url: String,
}

impl HttpJobServer {
	pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
		let mut headers = HeaderMap::new();
		let mut key = HeaderValue::from_str(api_key)?;
		key.set_sensitive(true);
		headers.insert("x-api-key", key);

		let client = Client::builder().default_headers(headers).timeout(timeout).build()?;
		Ok(Self {
			client,
			base_url: format!("{}/worker", endpoint.trim_end_matches('/')),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}

	async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, JobServerError> {
		let response = self.client.get(self.url(path)).send().await.map_err(|e| request_error(path, &e))?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let response = check_status(path, response)?;
		let envelope: DataEnvelope<T> = response.json().await.map_err(|e| JobServerError::Decode {
			path: path.to_string(),
			message: e.to_string(),
		})?;
		Ok(Some(envelope.data))
	}

	async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), JobServerError> {
		let response = self.client.post(self.url(path)).json(body).send().await.map_err(|e| request_error(path, &e))?;
		check_status(path, response)?;
		debug!(path, "📨 Posted to job server");
		Ok(())
	}
}

fn request_error(path: &str, e: &reqwest::Error) -> JobServerError {
	JobServerError::Request {
		path: path.to_string(),
		message: e.to_string(),
	}
}

fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response, JobServerError> {
	let status = response.status();
	if status.is_success() {
		Ok(response)
	} else {
		Err(JobServerError::Status {
			path: path.to_string(),
			status: status.as_u16(),
		})
	}
}

#[async_trait::async_trait]
impl JobServer for HttpJobServer {
	async fn recording(&self, recording_id: &str) -> Result<RecordingDescriptor, JobServerError> {
		let path = format!("/recording/{recording_id}");
		self.get::<RecordingDescriptor>(&path).await?.ok_or(JobServerError::Status { path, status: 404 })
	}

	async fn transcript(&self, recording_id: &str) -> Result<Option<Vec<Segment>>, JobServerError> {
		let path = format!("/recording/{recording_id}/transcript");
		let stored = self.get::<Option<StoredTranscript>>(&path).await?.flatten();
		Ok(stored.map(|t| t.segments))
	}

	async fn report_transcript(&self, recording_id: &str, report: &TranscriptReport) -> Result<(), JobServerError> {
		self.post(&format!("/recording/{recording_id}/transcript"), report).await
	}

	async fn post_insights(&self, recording_id: &str, insights: &serde_json::Value) -> Result<(), JobServerError> {
		self.post(&format!("/recording/{recording_id}/insights"), &InsightsBody { insights }).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_base_url_targets_worker_api() {
		let server = HttpJobServer::new("http://jobs.local/", "secret", Duration::from_secs(5)).unwrap();
		assert_eq!(server.url("/recording/r1"), "http://jobs.local/worker/recording/r1");
	}

	#[test]
	fn test_rejects_unprintable_api_key() {
		assert!(HttpJobServer::new("http://jobs.local", "bad\nkey", Duration::from_secs(5)).is_err());
	}

	#[test]
	fn test_descriptor_envelope_decodes_legacy_fields() {
		let json = r#"{"data":{"id":"rec-1","batches":[{"fileKey":"rec/a_2.wav","start":0,"end":30,"isTranscripted":false,"fileURL":"https://signed"}]}}"#;
		let envelope: DataEnvelope<RecordingDescriptor> = serde_json::from_str(json).unwrap();

		assert_eq!(envelope.data.batches.len(), 1);
		assert_eq!(envelope.data.batches[0].file_ref, "rec/a_2.wav");
	}

	#[test]
	fn test_transcript_envelope_allows_null() {
		let empty: DataEnvelope<Option<StoredTranscript>> = serde_json::from_str(r#"{"data":null}"#).unwrap();
		assert!(empty.data.is_none());

		let stored: DataEnvelope<Option<StoredTranscript>> =
			serde_json::from_str(r#"{"data":{"language":"en","segments":[{"text":"hi","start":0.0,"end":1.0,"batchId":"b1","batchStart":0.0,"batchEnd":1.0}]}}"#).unwrap();
		let segments = stored.data.unwrap().segments;
		assert_eq!(segments[0].batch_id.as_deref(), Some("b1"));
	}

	#[test]
	fn test_insights_body_shape() {
		let insights = serde_json::json!({"summary": "busy morning"});
		let body = serde_json::to_value(InsightsBody { insights: &insights }).unwrap();
		assert_eq!(body, serde_json::json!({"insights": {"summary": "busy morning"}}));
	}
}
