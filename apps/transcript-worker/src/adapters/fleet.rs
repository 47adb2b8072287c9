use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use transcript_core::{FleetControl, FleetError};

const METADATA_TIMEOUT: Duration = Duration::from_secs(1);
const CONTINUE: &str = "CONTINUE";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LifecycleRequest<'a> {
	auto_scaling_group_name: &'a str,
	lifecycle_hook_name: &'a str,
	instance_id: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	lifecycle_action_result: Option<&'a str>,
}

/// Autoscaling control over HTTP: instance metadata for the id, a lifecycle endpoint for the rest
pub struct HttpFleetControl {
	client: Client,
	endpoint: String,
	group_name: String,
	metadata_url: String,
}

impl HttpFleetControl {
	pub fn new(endpoint: &str, group_name: &str, metadata_url: &str, timeout: Duration) -> anyhow::Result<Self> {
		Ok(Self {
			client: Client::builder().timeout(timeout).build()?,
			endpoint: endpoint.trim_end_matches('/').to_string(),
			group_name: group_name.to_string(),
			metadata_url: metadata_url.to_string(),
		})
	}

	fn request<'a>(&'a self, instance_id: &'a str, hook_name: &'a str, result: Option<&'a str>) -> LifecycleRequest<'a> {
		LifecycleRequest {
			auto_scaling_group_name: &self.group_name,
			lifecycle_hook_name: hook_name,
			instance_id,
			lifecycle_action_result: result,
		}
	}

	async fn send(&self, action: &str, body: &LifecycleRequest<'_>) -> Result<(), String> {
		let response = self
			.client
			.post(format!("{}/lifecycle/{action}", self.endpoint))
			.json(body)
			.send()
			.await
			.map_err(|e| e.to_string())?;
		response.error_for_status().map(drop).map_err(|e| e.to_string())
	}
}

#[async_trait::async_trait]
impl FleetControl for HttpFleetControl {
	async fn instance_id(&self) -> Result<String, FleetError> {
		let response = self
			.client
			.get(&self.metadata_url)
			.timeout(METADATA_TIMEOUT)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(|e| FleetError::InstanceId(e.to_string()))?;
		let id = response.text().await.map_err(|e| FleetError::InstanceId(e.to_string()))?;

		let id = id.trim();
		if id.is_empty() {
			return Err(FleetError::InstanceId("metadata returned an empty instance id".to_string()));
		}
		Ok(id.to_string())
	}

	async fn complete_lifecycle_action(&self, instance_id: &str, hook_name: &str) -> Result<(), FleetError> {
		let body = self.request(instance_id, hook_name, Some(CONTINUE));
		self.send("complete", &body).await.map_err(FleetError::Complete)
	}

	async fn record_heartbeat(&self, instance_id: &str, hook_name: &str) -> Result<(), FleetError> {
		let body = self.request(instance_id, hook_name, None);
		self.send("heartbeat", &body).await.map_err(FleetError::Heartbeat)
	}
}
