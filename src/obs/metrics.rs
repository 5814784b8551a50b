// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"serial_rest_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Publishes the number of requests waiting in the dispatcher (when enabled).
pub fn record_queue_depth(depth: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::gauge!("serial_rest_queue_depth").set(depth as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = depth;
	}
}
