use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
	metrics::{PeriodicReader, SdkMeterProvider},
	trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
	Resource,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use transcript_core::WorkerState;

const DEFAULT_FILTER: &str = "info,transcript_worker=debug,transcript_core=debug";

#[derive(Error, Debug)]
pub enum ObservabilityError {
	#[error("Failed to initialize OTLP exporter: {0}")]
	ExporterInit(#[from] opentelemetry_otlp::ExporterBuildError),

	#[error("Failed to install tracing subscriber: {0}")]
	Subscriber(String),

	#[error("OpenTelemetry error: {0}")]
	OpenTelemetry(String),
}

/// Keeps the OTLP providers alive until shutdown
pub struct OtelGuard {
	tracer_provider: SdkTracerProvider,
	meter_provider: SdkMeterProvider,
}

impl OtelGuard {
	/// Install the subscriber with an OTLP layer and register the global meter provider.
	pub fn init(service_name: &str) -> Result<Self, ObservabilityError> {
		let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| "http://localhost:4317".to_string());
		let export_interval = std::env::var("OTEL_METRIC_EXPORT_INTERVAL").ok().and_then(|s| s.parse().ok()).unwrap_or(60);

		let resource = Resource::builder()
			.with_service_name(service_name.to_string())
			.with_attributes(vec![KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
			.build();

		let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.with_endpoint(&otlp_endpoint)
			.with_timeout(Duration::from_secs(3))
			.build()?;

		let tracer_provider = SdkTracerProvider::builder()
			.with_resource(resource.clone())
			.with_sampler(Sampler::AlwaysOn)
			.with_id_generator(RandomIdGenerator::default())
			.with_batch_exporter(trace_exporter)
			.build();

		let tracer = tracer_provider.tracer(service_name.to_string());
		global::set_tracer_provider(tracer_provider.clone());

		let metrics_exporter = opentelemetry_otlp::MetricExporter::builder()
			.with_tonic()
			.with_endpoint(&otlp_endpoint)
			.with_timeout(Duration::from_secs(10))
			.build()?;

		let reader = PeriodicReader::builder(metrics_exporter).with_interval(Duration::from_secs(export_interval)).build();
		let meter_provider = SdkMeterProvider::builder().with_resource(resource).with_reader(reader).build();
		global::set_meter_provider(meter_provider.clone());

		let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

		tracing_subscriber::registry()
			.with(env_filter())
			.with(telemetry_layer)
			.with(tracing_subscriber::fmt::layer().with_target(true))
			.try_init()
			.map_err(|e| ObservabilityError::Subscriber(e.to_string()))?;

		info!(service = %service_name, otlp_endpoint = %otlp_endpoint, export_interval, "✅ OpenTelemetry initialized");

		Ok(Self { tracer_provider, meter_provider })
	}

	/// Flush and stop both providers
	pub fn shutdown(self) -> Result<(), ObservabilityError> {
		self.tracer_provider.shutdown().map_err(|e| ObservabilityError::OpenTelemetry(e.to_string()))?;
		self.meter_provider.shutdown().map_err(|e| ObservabilityError::OpenTelemetry(e.to_string()))?;
		Ok(())
	}
}

fn env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Plain stdout logging when OTLP is disabled or failed to start
pub fn init_local_logging() {
	let _ = tracing_subscriber::registry()
		.with(env_filter())
		.with(tracing_subscriber::fmt::layer().with_target(true))
		.try_init();
}

/// Set up logging, exporting over OTLP when enabled and falling back to local-only output
pub fn init_with_fallback(service_name: &str, otel_enabled: bool) -> Option<OtelGuard> {
	if !otel_enabled {
		init_local_logging();
		return None;
	}

	// Exporters retry on their own; one init attempt is enough
	match OtelGuard::init(service_name) {
		Ok(guard) => Some(guard),
		Err(e) => {
			init_local_logging();
			tracing::warn!(error = %e, "⚠️ OTLP observability failed to initialize, falling back to local logging only");
			None
		}
	}
}

/// Observable instruments over the worker's live counters
pub fn register_gauges(state: &Arc<WorkerState>) {
	let meter = global::meter("transcript-worker");

	let s = Arc::clone(state);
	let _active = meter
		.u64_observable_gauge("worker.jobs.active")
		.with_description("Jobs currently in flight")
		.with_callback(move |observer| observer.observe(s.active_jobs() as u64, &[]))
		.build();

	let s = Arc::clone(state);
	let _pending = meter
		.u64_observable_gauge("worker.messages.pending")
		.with_description("Received messages waiting for a free slot")
		.with_callback(move |observer| observer.observe(s.pending_messages.load(Ordering::Relaxed) as u64, &[]))
		.build();

	let s = Arc::clone(state);
	let _empty = meter
		.u64_observable_gauge("worker.polls.empty_streak")
		.with_description("Consecutive empty queue polls")
		.with_callback(move |observer| observer.observe(u64::from(s.empty_attempts.load(Ordering::Relaxed)), &[]))
		.build();

	let s = Arc::clone(state);
	let _jobs = meter
		.u64_observable_counter("worker.jobs")
		.with_description("Jobs by result")
		.with_callback(move |observer| {
			observer.observe(s.jobs_started.load(Ordering::Relaxed), &[KeyValue::new("result", "started")]);
			observer.observe(s.jobs_succeeded.load(Ordering::Relaxed), &[KeyValue::new("result", "succeeded")]);
			observer.observe(s.jobs_failed.load(Ordering::Relaxed), &[KeyValue::new("result", "failed")]);
			observer.observe(s.silent_jobs.load(Ordering::Relaxed), &[KeyValue::new("result", "silent")]);
		})
		.build();

	let s = Arc::clone(state);
	let _deleted = meter
		.u64_observable_counter("worker.messages.deleted")
		.with_description("Queue messages acknowledged")
		.with_callback(move |observer| observer.observe(s.messages_deleted.load(Ordering::Relaxed), &[]))
		.build();

	let s = Arc::clone(state);
	let _batches = meter
		.u64_observable_counter("worker.batches")
		.with_description("Batches by how they were handled")
		.with_callback(move |observer| {
			observer.observe(s.batches_transcribed.load(Ordering::Relaxed), &[KeyValue::new("mode", "transcribed")]);
			observer.observe(s.batches_resumed.load(Ordering::Relaxed), &[KeyValue::new("mode", "resumed")]);
		})
		.build();
}
