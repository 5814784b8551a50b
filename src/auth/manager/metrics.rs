// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential renewals.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	superseded: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the total number of renewal callback invocations.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that installed a new credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed renewals, scheduled or manual.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of scheduled renewals skipped because a newer credential landed first.
	pub fn superseded(&self) -> u64 {
		self.superseded.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_superseded(&self) {
		self.superseded.fetch_add(1, Ordering::Relaxed);
	}
}
