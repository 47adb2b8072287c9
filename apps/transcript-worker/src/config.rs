use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use transcript_core::{AssemblerConfig, LifecycleConfig, ManagerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "transcript-worker")]
#[command(about = "Queue-driven recording transcription worker", long_about = None)]
pub struct Config {
	/// Redis URL backing the job queue
	#[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
	pub redis_url: String,

	/// Queue name; keys are `<name>:pending`, `<name>:inflight`, `<name>:leases`
	#[arg(long, env = "QUEUE_NAME", default_value = "recordings")]
	pub queue_name: String,

	#[arg(long, env = "QUEUE_MAX_MESSAGES", default_value = "2")]
	pub queue_max_messages: usize,

	/// Long-poll wait per receive
	#[arg(long, env = "QUEUE_WAIT_SECS", default_value = "20")]
	pub queue_wait_secs: u64,

	/// Lease length of a received message
	#[arg(long, env = "QUEUE_VISIBILITY_SECS", default_value = "300")]
	pub queue_visibility_secs: u64,

	#[arg(long, env = "MAX_CONCURRENCY", default_value = "2")]
	pub max_concurrency: usize,

	/// Consecutive empty polls before the worker exits
	#[arg(long, env = "MAX_EMPTY_ATTEMPTS", default_value = "100")]
	pub max_empty_attempts: u32,

	#[arg(long, env = "BACKOFF_STEP_MS", default_value = "2000")]
	pub backoff_step_ms: u64,

	#[arg(long, env = "BACKOFF_CAP_MS", default_value = "150000")]
	pub backoff_cap_ms: u64,

	/// Job server base URL; requests go to `<endpoint>/worker`
	#[arg(long, env = "MAIN_SERVER_ENDPOINT")]
	pub main_server_endpoint: String,

	#[arg(long, env = "API_KEY", hide_env_values = true)]
	pub api_key: String,

	#[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "30")]
	pub http_timeout_secs: u64,

	/// Root directory of the object store (mounted bucket or shared volume)
	#[arg(long, env = "OBJECT_STORE_ROOT")]
	pub object_store_root: PathBuf,

	/// Parent for per-batch scratch directories
	#[arg(long, env = "SCRATCH_DIR")]
	pub scratch_dir: Option<PathBuf>,

	#[arg(long, env = "TRANSCRIPT_PREFIX", default_value = "tmp")]
	pub transcript_prefix: String,

	#[arg(long, env = "TRANSCRIPT_LANGUAGE", default_value = "en")]
	pub transcript_language: String,

	#[arg(long, env = "MERGE_SPEAKERS", default_value_t = true, action = clap::ArgAction::Set)]
	pub merge_speakers: bool,

	/// Transcription engine executable
	#[arg(long, env = "ENGINE_PROGRAM", default_value = "python3")]
	pub engine_program: String,

	/// Arguments placed before the audio path
	#[arg(long, env = "ENGINE_ARGS", value_delimiter = ' ', default_value = "whisper.py")]
	pub engine_args: Vec<String>,

	/// Prefix of the result file the engine writes next to the audio
	#[arg(long, env = "ENGINE_OUTPUT_PREFIX", default_value = "0_")]
	pub engine_output_prefix: String,

	/// Engine processes allowed to run at once
	#[arg(long, env = "ENGINE_SLOTS", default_value = "2")]
	pub engine_slots: usize,

	/// Command that must print READY before the worker starts
	#[arg(long, env = "ENGINE_PREFLIGHT")]
	pub engine_preflight: Option<String>,

	/// Lifecycle control endpoint; fleet reporting is off when unset
	#[arg(long, env = "FLEET_ENDPOINT")]
	pub fleet_endpoint: Option<String>,

	#[arg(long, env = "AUTOSCALING_GROUP", default_value = "transcript-workers")]
	pub autoscaling_group: String,

	#[arg(long, env = "LIFECYCLE_HOOK", default_value = "pause_instance_termination")]
	pub lifecycle_hook: String,

	#[arg(long, env = "LIFECYCLE_INTERVAL_SECS", default_value = "60")]
	pub lifecycle_interval_secs: u64,

	#[arg(long, env = "INSTANCE_METADATA_URL", default_value = "http://169.254.169.254/latest/meta-data/instance-id")]
	pub instance_metadata_url: String,

	/// Service name for observability
	#[arg(long, env = "OTEL_SERVICE_NAME", default_value = "transcript-worker")]
	pub service_name: String,

	/// Export traces and metrics over OTLP
	#[arg(long, env = "OTEL_ENABLED", default_value_t = false, action = clap::ArgAction::Set)]
	pub otel_enabled: bool,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.max_concurrency == 0 {
			return Err("max_concurrency must be at least 1".to_string());
		}

		if self.queue_max_messages == 0 {
			return Err("queue_max_messages must be at least 1".to_string());
		}

		// A zero wait makes the blocking receive wait forever and never see shutdown
		if self.queue_wait_secs == 0 {
			return Err("queue_wait_secs must be greater than 0".to_string());
		}

		if self.max_empty_attempts == 0 {
			return Err("max_empty_attempts must be greater than 0".to_string());
		}

		if self.lifecycle_interval_secs == 0 {
			return Err("lifecycle_interval_secs must be greater than 0".to_string());
		}

		if self.engine_slots == 0 {
			return Err("engine_slots must be at least 1".to_string());
		}

		if self.engine_program.trim().is_empty() {
			return Err("engine_program must not be empty".to_string());
		}

		if self.main_server_endpoint.trim().is_empty() {
			return Err("main_server_endpoint must not be empty".to_string());
		}

		Ok(())
	}

	pub fn manager(&self) -> ManagerConfig {
		ManagerConfig {
			max_concurrency: self.max_concurrency,
			max_messages: self.queue_max_messages,
			wait: Duration::from_secs(self.queue_wait_secs),
			visibility_timeout: Duration::from_secs(self.queue_visibility_secs),
			max_empty_attempts: self.max_empty_attempts,
			backoff_step: Duration::from_millis(self.backoff_step_ms),
			backoff_cap: Duration::from_millis(self.backoff_cap_ms),
		}
	}

	pub fn assembler(&self) -> AssemblerConfig {
		AssemblerConfig {
			language: self.transcript_language.clone(),
			merge_speakers: self.merge_speakers,
			transcript_prefix: self.transcript_prefix.clone(),
			scratch_root: self.scratch_dir.clone(),
		}
	}

	pub fn lifecycle(&self) -> LifecycleConfig {
		LifecycleConfig {
			interval: Duration::from_secs(self.lifecycle_interval_secs),
			hook_name: self.lifecycle_hook.clone(),
			..LifecycleConfig::default()
		}
	}

	/// Engine args with blanks from the space-delimited env value removed
	pub fn engine_args(&self) -> Vec<String> {
		self.engine_args.iter().filter(|arg| !arg.is_empty()).cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> Config {
		let base = ["transcript-worker", "--main-server-endpoint", "http://jobs.local", "--api-key", "k", "--object-store-root", "/data"];
		Config::parse_from(base.iter().chain(args.iter()).copied())
	}

	#[test]
	fn test_defaults_match_worker_constants() {
		let config = parse(&[]);
		assert!(config.validate().is_ok());

		let manager = config.manager();
		assert_eq!(manager.max_concurrency, 2);
		assert_eq!(manager.max_messages, 2);
		assert_eq!(manager.wait, Duration::from_secs(20));
		assert_eq!(manager.visibility_timeout, Duration::from_secs(300));
		assert_eq!(manager.max_empty_attempts, 100);
		assert_eq!(manager.backoff_cap, Duration::from_millis(150_000));

		let assembler = config.assembler();
		assert_eq!(assembler.language, "en");
		assert_eq!(assembler.transcript_prefix, "tmp");
		assert!(assembler.merge_speakers);

		assert_eq!(config.lifecycle().hook_name, "pause_instance_termination");
		assert_eq!(config.engine_args(), vec!["whisper.py"]);
		assert!(!config.otel_enabled);
	}

	#[test]
	fn test_flags_override_defaults() {
		let config = parse(&["--max-concurrency", "4", "--merge-speakers", "false", "--engine-args", "run.py --fast"]);

		assert_eq!(config.manager().max_concurrency, 4);
		assert!(!config.assembler().merge_speakers);
		assert_eq!(config.engine_args(), vec!["run.py", "--fast"]);
	}

	#[test]
	fn test_validate_rejects_zero_limits() {
		assert!(parse(&["--max-concurrency", "0"]).validate().is_err());
		assert!(parse(&["--max-empty-attempts", "0"]).validate().is_err());
		assert!(parse(&["--queue-wait-secs", "0"]).validate().is_err());
		assert!(parse(&["--lifecycle-interval-secs", "0"]).validate().is_err());
		assert!(parse(&["--engine-slots", "0"]).validate().is_err());
		assert!(parse(&["--engine-program", " "]).validate().is_err());
	}
}
