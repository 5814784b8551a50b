//! Serialized, single-flight request dispatcher.
//!
//! Requests submitted to a [`RequestQueue`] are executed one at a time, in submission order.
//! A worker task is spawned when the first request arrives at an idle dispatcher and keeps
//! draining the chain until it finds no successor; the check for a successor and the reset to
//! idle happen under the same lock that [`RequestQueue::submit`] takes, so a request racing
//! the reset either joins the running worker or starts the next one.

mod metrics;

pub use self::metrics::QueueMetrics;

// std
use std::task::{Context, Poll};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{self, HttpResponse, HttpTransport},
	obs::{self, OpKind, OpSpan},
	request::RequestDescriptor,
};

struct QueueNode {
	request: RequestDescriptor,
	reply: oneshot::Sender<Result<HttpResponse>>,
}

#[derive(Default)]
struct DispatcherState {
	busy: bool,
	pending: VecDeque<QueueNode>,
}

struct Shared {
	transport: Arc<dyn HttpTransport>,
	state: Mutex<DispatcherState>,
	metrics: QueueMetrics,
}

/// FIFO dispatcher that keeps at most one request in flight.
///
/// Cloning yields another handle to the same dispatcher.
#[derive(Clone)]
pub struct RequestQueue {
	shared: Arc<Shared>,
}
impl RequestQueue {
	/// Creates an idle dispatcher sending through `transport`.
	pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
		Self {
			shared: Arc::new(Shared {
				transport,
				state: Default::default(),
				metrics: Default::default(),
			}),
		}
	}

	/// Appends `request` to the chain and returns its completion handle.
	///
	/// Processing starts immediately when the dispatcher is idle; otherwise the request waits
	/// for every earlier one to settle. Must be called from within a Tokio runtime.
	pub fn submit(&self, request: RequestDescriptor) -> Result<ResponseHandle> {
		let runtime =
			tokio::runtime::Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let (reply, receiver) = oneshot::channel();
		let node = QueueNode { request, reply };
		let mut state = self.shared.state.lock();

		self.shared.metrics.record_submitted();

		if state.busy {
			state.pending.push_back(node);
			obs::record_queue_depth(state.pending.len());

			return Ok(ResponseHandle { receiver });
		}

		state.busy = true;

		drop(state);

		let guard = WorkerGuard { shared: self.shared.clone(), armed: true };

		runtime.spawn(drain(guard, node));

		Ok(ResponseHandle { receiver })
	}

	/// Submits `request` and waits for its response.
	pub async fn enqueue(&self, request: RequestDescriptor) -> Result<HttpResponse> {
		self.submit(request)?.await
	}

	/// Returns `true` when no request is running or waiting.
	pub fn is_empty(&self) -> bool {
		!self.shared.state.lock().busy
	}

	/// Returns the number of requests waiting behind the one in flight.
	pub fn len(&self) -> usize {
		self.shared.state.lock().pending.len()
	}

	/// Dispatcher counters.
	pub fn metrics(&self) -> &QueueMetrics {
		&self.shared.metrics
	}
}
impl Debug for RequestQueue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.shared.state.lock();

		f.debug_struct("RequestQueue")
			.field("busy", &state.busy)
			.field("pending", &state.pending.len())
			.finish()
	}
}

/// Completion handle for a queued request.
///
/// Resolves with the request's own outcome. Dropping the handle before the request starts
/// removes it from the chain; a request already in flight runs to completion regardless.
#[must_use = "dropping the handle cancels the request unless it already started"]
#[derive(Debug)]
pub struct ResponseHandle {
	receiver: oneshot::Receiver<Result<HttpResponse>>,
}
impl Future for ResponseHandle {
	type Output = Result<HttpResponse>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.receiver)
			.poll(cx)
			.map(|received| received.unwrap_or_else(|_| Err(Error::QueueClosed)))
	}
}

// Resets the dispatcher if the worker goes away without finishing its chain, either because
// the runtime dropped the task or because the transport panicked. Pending senders are dropped,
// which resolves their handles with `Error::QueueClosed`.
struct WorkerGuard {
	shared: Arc<Shared>,
	armed: bool,
}
impl Drop for WorkerGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let abandoned = {
			let mut state = self.shared.state.lock();

			state.busy = false;

			std::mem::take(&mut state.pending)
		};

		tracing::warn!(abandoned = abandoned.len(), "Request queue worker stopped early.");
		obs::record_queue_depth(0);
	}
}

async fn drain(mut guard: WorkerGuard, first: QueueNode) {
	let shared = guard.shared.clone();
	let mut next = Some(first);

	while let Some(node) = next {
		dispatch(&shared, node).await;

		next = {
			let mut state = shared.state.lock();
			let successor = state.pending.pop_front();

			if successor.is_none() {
				state.busy = false;
			}

			obs::record_queue_depth(state.pending.len());

			successor
		};
	}

	guard.armed = false;
}

async fn dispatch(shared: &Shared, node: QueueNode) {
	let QueueNode { request, reply } = node;

	if reply.is_closed() {
		tracing::debug!(url = %request.url(), "Skipping queued request dropped by its caller.");
		shared.metrics.record_skipped();

		return;
	}

	let span = OpSpan::new(OpKind::Queued, "dispatch");

	span.record_request(&request);

	let result = span.instrument(http::execute(shared.transport.as_ref(), &request)).await;

	match &result {
		Ok(_) => shared.metrics.record_completed(),
		Err(e) => {
			tracing::debug!(error = %e, "Queued request failed.");
			shared.metrics.record_failed();
		},
	}

	// The caller may have stopped waiting while the request was in flight.
	let _ = reply.send(result);
}
