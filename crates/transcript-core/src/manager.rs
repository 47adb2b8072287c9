use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::state::WorkerState;
use crate::traits::{JobQueue, MessageHandler};
use crate::types::QueueMessage;

/// Why the manager loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerExit {
	/// The empty-poll ceiling was reached with nothing in flight.
	Exhausted,
	/// Shutdown was requested; in-flight jobs were drained first.
	Cancelled,
}

/// Result of one spawned message task
#[derive(Debug)]
struct Settled {
	message_id: String,
	succeeded: bool,
}

/// Delay before the next poll after `empty_attempts` consecutive idle polls
#[must_use]
pub fn backoff_delay(empty_attempts: u32, step: Duration, cap: Duration) -> Duration {
	step.saturating_mul(empty_attempts).min(cap)
}

/// Pulls messages from the queue and runs at most `max_concurrency` of them at once
pub struct QueueWorkerManager<Q, H> {
	queue: Arc<Q>,
	handler: Arc<H>,
	config: ManagerConfig,
	state: Arc<WorkerState>,
}

impl<Q, H> QueueWorkerManager<Q, H>
where
	Q: JobQueue,
	H: MessageHandler,
{
	pub fn new(queue: Arc<Q>, handler: Arc<H>, config: ManagerConfig, state: Arc<WorkerState>) -> Self {
		Self { queue, handler, config, state }
	}

	pub fn state(&self) -> &Arc<WorkerState> {
		&self.state
	}

	/// Run until the queue stays empty for `max_empty_attempts` polls or `cancel` fires.
	pub async fn run(&self, cancel: CancellationToken) -> ManagerExit {
		let max_concurrency = self.config.max_concurrency.max(1);
		let mut pending: VecDeque<QueueMessage> = VecDeque::new();
		let mut in_flight: JoinSet<Settled> = JoinSet::new();
		let mut empty_attempts = 0u32;

		info!(max_concurrency, max_messages = self.config.max_messages, "🚀 Queue worker manager started");

		let exit = loop {
			if cancel.is_cancelled() {
				break ManagerExit::Cancelled;
			}

			while in_flight.len() < max_concurrency {
				let Some(message) = pending.pop_front() else {
					break;
				};
				if self.dispatch(message, &mut in_flight).await {
					empty_attempts = 0;
				}
			}
			self.publish(&pending, &in_flight, empty_attempts);

			if in_flight.len() >= max_concurrency {
				if let Some(joined) = in_flight.join_next().await {
					self.settle(joined);
				}
				empty_attempts = 0;
				continue;
			}

			match self.poll().await {
				Some(messages) if !messages.is_empty() => {
					debug!(count = messages.len(), "📥 Received messages");
					empty_attempts = 0;
					pending.extend(messages);
					continue;
				}
				_ => {}
			}

			if !in_flight.is_empty() {
				if let Some(joined) = in_flight.join_next().await {
					self.settle(joined);
				}
				empty_attempts = 0;
				continue;
			}

			empty_attempts += 1;
			self.publish(&pending, &in_flight, empty_attempts);
			if empty_attempts >= self.config.max_empty_attempts {
				info!(empty_attempts, "🏁 Queue stayed empty, stopping manager");
				break ManagerExit::Exhausted;
			}

			let delay = backoff_delay(empty_attempts, self.config.backoff_step, self.config.backoff_cap);
			debug!(empty_attempts, delay_ms = delay.as_millis(), "💤 Queue empty, backing off");
			tokio::select! {
				() = cancel.cancelled() => break ManagerExit::Cancelled,
				() = tokio::time::sleep(delay) => {}
			}
		};

		if !in_flight.is_empty() {
			info!(in_flight = in_flight.len(), "⏳ Waiting for in-flight jobs to finish");
		}
		while let Some(joined) = in_flight.join_next().await {
			self.settle(joined);
		}
		self.publish(&pending, &in_flight, empty_attempts);

		if !pending.is_empty() {
			info!(pending = pending.len(), "↩️ Leaving undispatched messages to the visibility timeout");
		}
		info!(?exit, "👋 Queue worker manager stopped");
		exit
	}

	/// A failed poll is logged and treated like an empty one.
	async fn poll(&self) -> Option<Vec<QueueMessage>> {
		match self.queue.receive(self.config.max_messages, self.config.wait, self.config.visibility_timeout).await {
			Ok(messages) => Some(messages),
			Err(e) => {
				error!(error = %e, "❌ Queue poll failed");
				None
			}
		}
	}

	/// Spawn the handler for `message`, or acknowledge it directly when it carries no job.
	/// Returns whether a task was started.
	async fn dispatch(&self, message: QueueMessage, in_flight: &mut JoinSet<Settled>) -> bool {
		if message.job_id().is_none() {
			warn!(message_id = %message.id, "⚠️ Message has no body, deleting without processing");
			acknowledge(self.queue.as_ref(), &self.state, &message).await;
			return false;
		}

		self.state.mark_started();
		let queue = Arc::clone(&self.queue);
		let handler = Arc::clone(&self.handler);
		let state = Arc::clone(&self.state);
		in_flight.spawn(async move { run_message(queue.as_ref(), handler.as_ref(), &state, message).await });
		self.state.set_active_jobs(in_flight.len());
		true
	}

	fn settle(&self, joined: Result<Settled, JoinError>) {
		match joined {
			Ok(settled) => {
				self.state.record_job_result(settled.succeeded);
				debug!(message_id = %settled.message_id, succeeded = settled.succeeded, "✔️ Message settled");
			}
			Err(e) => {
				self.state.record_job_result(false);
				error!(error = %e, "❌ Message task aborted");
			}
		}
	}

	fn publish(&self, pending: &VecDeque<QueueMessage>, in_flight: &JoinSet<Settled>, empty_attempts: u32) {
		self.state.set_active_jobs(in_flight.len());
		self.state.set_pending_messages(pending.len());
		self.state.set_empty_attempts(empty_attempts);
	}
}

async fn run_message<Q, H>(queue: &Q, handler: &H, state: &WorkerState, message: QueueMessage) -> Settled
where
	Q: JobQueue,
	H: MessageHandler,
{
	let job_id = message.job_id().unwrap_or_default().to_string();
	info!(message_id = %message.id, job_id = %job_id, kind = ?message.kind(), "▶️ Processing message");

	let succeeded = match AssertUnwindSafe(handler.handle(&message)).catch_unwind().await {
		Ok(Ok(())) => {
			info!(message_id = %message.id, job_id = %job_id, "✅ Message processed");
			true
		}
		Ok(Err(e)) => {
			error!(message_id = %message.id, job_id = %job_id, error = %e, "❌ Message processing failed");
			false
		}
		Err(_) => {
			error!(message_id = %message.id, job_id = %job_id, "💥 Message handler panicked");
			false
		}
	};

	acknowledge(queue, state, &message).await;

	Settled {
		message_id: message.id,
		succeeded,
	}
}

async fn acknowledge<Q: JobQueue + ?Sized>(queue: &Q, state: &WorkerState, message: &QueueMessage) {
	let Some(receipt) = message.receipt_handle.as_deref() else {
		warn!(message_id = %message.id, "⚠️ Message has no receipt handle, cannot delete");
		return;
	};

	match queue.delete(receipt).await {
		Ok(()) => {
			state.increment_messages_deleted();
			debug!(message_id = %message.id, "🗑️ Message deleted");
		}
		Err(e) => error!(message_id = %message.id, error = %e, "❌ Failed to delete message"),
	}
}
