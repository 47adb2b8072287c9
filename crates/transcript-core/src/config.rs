use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
	pub max_concurrency: usize,
	pub max_messages: usize,
	pub wait: Duration,
	pub visibility_timeout: Duration,
	/// Consecutive idle polls after which the manager stops
	pub max_empty_attempts: u32,
	pub backoff_step: Duration,
	pub backoff_cap: Duration,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			max_concurrency: 2,
			max_messages: 2,
			wait: Duration::from_secs(20),
			visibility_timeout: Duration::from_secs(300),
			max_empty_attempts: 100,
			backoff_step: Duration::from_millis(2000),
			backoff_cap: Duration::from_millis(150_000),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
	pub language: String,
	pub merge_speakers: bool,
	pub transcript_prefix: String,
	/// Parent for per-batch scratch directories; system temp dir when unset
	pub scratch_root: Option<PathBuf>,
}

impl Default for AssemblerConfig {
	fn default() -> Self {
		Self {
			language: "en".to_string(),
			merge_speakers: true,
			transcript_prefix: "tmp".to_string(),
			scratch_root: None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
	pub interval: Duration,
	pub hook_name: String,
	/// Extra attempts when resolving the instance id
	pub instance_id_retries: u32,
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(60),
			hook_name: "pause_instance_termination".to_string(),
			instance_id_retries: 1,
		}
	}
}
