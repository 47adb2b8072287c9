mod adapters;
mod config;
mod observability;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use transcript_core::{FleetLifecycleReporter, JobRouter, JobServer, QueueWorkerManager, TranscriptAssembler, WorkerState};

use adapters::{subprocess_engine, HttpFleetControl, HttpJobServer, LocalObjectStore, RedisJobQueue, SubprocessEngine};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;

	let otel = observability::init_with_fallback(&config.service_name, config.otel_enabled);

	info!(
		service = %config.service_name,
		queue = %config.queue_name,
		max_concurrency = config.max_concurrency,
		engine = %config.engine_program,
		"🎯 Starting transcript worker"
	);

	let state = WorkerState::new();
	observability::register_gauges(&state);

	if let Some(check) = &config.engine_preflight {
		subprocess_engine::preflight(check).await.context("transcription engine is not ready")?;
	}

	let queue = Arc::new(RedisJobQueue::connect(&config.redis_url, &config.queue_name).await.context("failed to connect to the job queue")?);
	let server: Arc<dyn JobServer> = Arc::new(HttpJobServer::new(&config.main_server_endpoint, &config.api_key, Duration::from_secs(config.http_timeout_secs))?);
	let store = Arc::new(LocalObjectStore::new(config.object_store_root.clone()));
	let engine = Arc::new(SubprocessEngine::new(
		config.engine_program.clone(),
		config.engine_args(),
		config.engine_output_prefix.clone(),
		config.engine_slots,
	));

	let assembler = Arc::new(TranscriptAssembler::new(server, store, engine, config.assembler(), Arc::clone(&state)));
	let router = Arc::new(JobRouter::new(assembler));
	let manager = QueueWorkerManager::new(queue, router, config.manager(), Arc::clone(&state));

	let cancel = CancellationToken::new();
	let reporter = spawn_lifecycle_reporter(&config, &state, &cancel)?;

	let signal_cancel = cancel.clone();
	tokio::spawn(async move {
		wait_for_shutdown_signal().await;
		info!("🛑 Shutdown signal received (SIGTERM/SIGINT), finishing in-flight jobs");
		signal_cancel.cancel();
	});

	let exit = manager.run(cancel.clone()).await;
	cancel.cancel();

	if let Some(reporter) = reporter {
		if let Err(e) = reporter.await {
			warn!(error = %e, "⚠️ Lifecycle reporter task ended abnormally");
		}
	}

	let snapshot = state.snapshot();
	info!(?exit, succeeded = snapshot.jobs_succeeded, failed = snapshot.jobs_failed, deleted = snapshot.messages_deleted, "✅ Transcript worker exiting");

	if let Some(guard) = otel {
		if let Err(e) = guard.shutdown() {
			error!(error = %e, "❌ Failed to flush telemetry");
		}
	}

	Ok(())
}

fn spawn_lifecycle_reporter(config: &Config, state: &Arc<WorkerState>, cancel: &CancellationToken) -> Result<Option<JoinHandle<()>>> {
	let Some(endpoint) = config.fleet_endpoint.as_deref() else {
		info!("ℹ️ No fleet endpoint configured, lifecycle reporting disabled");
		return Ok(None);
	};

	let fleet = HttpFleetControl::new(
		endpoint,
		&config.autoscaling_group,
		&config.instance_metadata_url,
		Duration::from_secs(config.http_timeout_secs),
	)?;
	let reporter = FleetLifecycleReporter::new(Arc::new(fleet), Arc::clone(state), config.lifecycle());
	Ok(Some(tokio::spawn(reporter.run(cancel.clone()))))
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
			() = ctrl_c => {},
			() = terminate => {},
	}
}
