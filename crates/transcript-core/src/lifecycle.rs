use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::LifecycleConfig;
use crate::retry::retry;
use crate::state::WorkerState;
use crate::traits::FleetControl;

/// What the control plane was last told
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	None,
	IdleNotified,
	Busy,
}

/// Periodically tells the autoscaling control plane whether this worker may be scaled in
pub struct FleetLifecycleReporter {
	fleet: Arc<dyn FleetControl>,
	state: Arc<WorkerState>,
	config: LifecycleConfig,
	instance_id: Option<String>,
	lifecycle: LifecycleState,
}

impl FleetLifecycleReporter {
	pub fn new(fleet: Arc<dyn FleetControl>, state: Arc<WorkerState>, config: LifecycleConfig) -> Self {
		Self {
			fleet,
			state,
			config,
			instance_id: None,
			lifecycle: LifecycleState::None,
		}
	}

	#[must_use]
	pub const fn lifecycle(&self) -> LifecycleState {
		self.lifecycle
	}

	/// One reporting round. Nothing is sent before the first job has started.
	pub async fn tick(&mut self) -> LifecycleState {
		if !self.state.has_started() {
			return self.lifecycle;
		}

		let Some(instance_id) = self.instance_id().await else {
			return self.lifecycle;
		};
		let hook = self.config.hook_name.as_str();
		let active = self.state.active_jobs();

		if active == 0 {
			if self.lifecycle != LifecycleState::IdleNotified {
				match self.fleet.complete_lifecycle_action(&instance_id, hook).await {
					Ok(()) => {
						info!(instance_id = %instance_id, hook, "💤 Worker idle, lifecycle action completed");
						self.lifecycle = LifecycleState::IdleNotified;
					}
					Err(e) => error!(instance_id = %instance_id, error = %e, "❌ Failed to complete lifecycle action"),
				}
			}
		} else {
			match self.fleet.record_heartbeat(&instance_id, hook).await {
				Ok(()) => debug!(instance_id = %instance_id, active, "💓 Lifecycle heartbeat recorded"),
				Err(e) => error!(instance_id = %instance_id, error = %e, "❌ Failed to record lifecycle heartbeat"),
			}
			// Busy even when the heartbeat failed, so the next idle tick completes again.
			self.lifecycle = LifecycleState::Busy;
		}

		self.lifecycle
	}

	/// Tick every interval, the first one interval after start, until `cancel` fires.
	pub async fn run(mut self, cancel: CancellationToken) {
		let period = self.config.interval;
		let mut ticker = interval_at(Instant::now() + period, period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		info!(interval_secs = period.as_secs(), hook = %self.config.hook_name, "⏱️ Lifecycle reporter started");
		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				_ = ticker.tick() => {
					self.tick().await;
				}
			}
		}
		info!("🛑 Lifecycle reporter stopped");
	}

	async fn instance_id(&mut self) -> Option<String> {
		if let Some(id) = &self.instance_id {
			return Some(id.clone());
		}

		let fleet = Arc::clone(&self.fleet);
		match retry("resolve_instance_id", self.config.instance_id_retries, || fleet.instance_id()).await {
			Ok(id) => {
				info!(instance_id = %id, "🪪 Instance id resolved");
				self.instance_id = Some(id.clone());
				Some(id)
			}
			Err(e) => {
				error!(error = %e, "❌ Could not resolve instance id");
				None
			}
		}
	}
}
