// crates.io
use tracing::{Instrument, Span, field, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::OpKind, request::RequestDescriptor};

/// A span builder used around client operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	span: Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"serial_rest.op",
			op = kind.as_str(),
			stage,
			method = field::Empty,
			url = field::Empty,
		);

		Self { span }
	}

	/// Records the request line on the span.
	pub fn record_request(&self, request: &RequestDescriptor) {
		self.span.record("method", request.method().as_str());
		self.span.record("url", request.url().as_str());
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
