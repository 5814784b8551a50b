// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the request dispatcher.
#[derive(Debug, Default)]
pub struct QueueMetrics {
	submitted: AtomicU64,
	completed: AtomicU64,
	failed: AtomicU64,
	skipped: AtomicU64,
}
impl QueueMetrics {
	/// Returns the number of requests accepted by the dispatcher.
	pub fn submitted(&self) -> u64 {
		self.submitted.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that produced a normalized response.
	pub fn completed(&self) -> u64 {
		self.completed.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that resolved with an error.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of requests dropped by their caller before they started.
	pub fn skipped(&self) -> u64 {
		self.skipped.load(Ordering::Relaxed)
	}

	pub(crate) fn record_submitted(&self) {
		self.submitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_skipped(&self) {
		self.skipped.fetch_add(1, Ordering::Relaxed);
	}
}
