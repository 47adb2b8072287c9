use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Live worker status shared between the manager, the lifecycle reporter and the metrics layer.
///
/// `active_jobs`, `pending_messages`, `empty_attempts` and `has_started` are written only
/// by the manager loop; everything else is a monotonically increasing counter.
#[derive(Debug, Default)]
pub struct WorkerState {
	pub active_jobs: AtomicUsize,
	pub pending_messages: AtomicUsize,
	pub empty_attempts: AtomicU32,
	pub has_started: AtomicBool,

	// Job counters
	pub jobs_started: AtomicU64,
	pub jobs_succeeded: AtomicU64,
	pub jobs_failed: AtomicU64,
	pub silent_jobs: AtomicU64,
	pub messages_deleted: AtomicU64,

	// Batch counters
	pub batches_transcribed: AtomicU64,
	pub batches_resumed: AtomicU64,
}

impl WorkerState {
	#[must_use]
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	#[must_use]
	pub fn active_jobs(&self) -> usize {
		self.active_jobs.load(Ordering::Acquire)
	}

	#[must_use]
	pub fn has_started(&self) -> bool {
		self.has_started.load(Ordering::Acquire)
	}

	pub fn set_active_jobs(&self, count: usize) {
		self.active_jobs.store(count, Ordering::Release);
	}

	pub fn set_pending_messages(&self, count: usize) {
		self.pending_messages.store(count, Ordering::Relaxed);
	}

	pub fn set_empty_attempts(&self, count: u32) {
		self.empty_attempts.store(count, Ordering::Relaxed);
	}

	pub fn mark_started(&self) {
		self.has_started.store(true, Ordering::Release);
		self.jobs_started.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_job_result(&self, succeeded: bool) {
		let counter = if succeeded { &self.jobs_succeeded } else { &self.jobs_failed };
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn increment_silent_jobs(&self) {
		self.silent_jobs.fetch_add(1, Ordering::Relaxed);
	}

	pub fn increment_messages_deleted(&self) {
		self.messages_deleted.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_batches(&self, transcribed: u64, resumed: u64) {
		self.batches_transcribed.fetch_add(transcribed, Ordering::Relaxed);
		self.batches_resumed.fetch_add(resumed, Ordering::Relaxed);
	}

	/// Point-in-time copy for logging
	#[must_use]
	pub fn snapshot(&self) -> WorkerSnapshot {
		WorkerSnapshot {
			active_jobs: self.active_jobs(),
			pending_messages: self.pending_messages.load(Ordering::Relaxed),
			jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
			jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
			messages_deleted: self.messages_deleted.load(Ordering::Relaxed),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSnapshot {
	pub active_jobs: usize,
	pub pending_messages: usize,
	pub jobs_succeeded: u64,
	pub jobs_failed: u64,
	pub messages_deleted: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_started_flag_is_sticky() {
		let state = WorkerState::new();
		assert!(!state.has_started());

		state.mark_started();
		state.set_active_jobs(0);
		assert!(state.has_started());
		assert_eq!(state.jobs_started.load(Ordering::Relaxed), 1);
	}

	#[test]
	fn test_snapshot_reflects_counters() {
		let state = WorkerState::new();
		state.set_active_jobs(2);
		state.set_pending_messages(3);
		state.record_job_result(true);
		state.record_job_result(false);
		state.record_job_result(true);
		state.increment_messages_deleted();

		assert_eq!(
			state.snapshot(),
			WorkerSnapshot {
				active_jobs: 2,
				pending_messages: 3,
				jobs_succeeded: 2,
				jobs_failed: 1,
				messages_deleted: 1,
			}
		);
	}
}
