//! Observability helpers shared by the facade, the dispatcher, and the credential manager.
//!
//! # Feature Flags
//!
//! - Spans named `serial_rest.op` carry the `op` (direct/queued/renewal) and `stage` (call site)
//!   fields, plus `method` and `url` once a request is built.
//! - Enable `metrics` to increment the `serial_rest_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and to publish the
//!   `serial_rest_queue_depth` gauge.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Operation kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Request executed immediately, bypassing the queue.
	Direct,
	/// Request routed through the serialized dispatcher.
	Queued,
	/// Credential renewal.
	Renewal,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Direct => "direct",
			OpKind::Queued => "queued",
			OpKind::Renewal => "renewal",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
