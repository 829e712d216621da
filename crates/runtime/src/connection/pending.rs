//! Pending-request table.
//!
//! Tracks every in-flight request id awaiting a correlated response. The router
//! resolves entries, the command layer removes them when it stops waiting (the
//! [`CancelGuard`] in [`PendingResponse`]), and terminate clears them all.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pagewatch_protocol::{Capability, Response};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Why a request was issued. Determines which id range it draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPurpose {
	/// Capability enable, part of the barrier.
	Enable(Capability),
	/// A command's own request.
	Command,
	/// One evaluation of a condition poll.
	Poll,
	/// `Network.getResponseBody` issued by the monitor.
	ResponseBody,
}

impl fmt::Display for RequestPurpose {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RequestPurpose::Enable(capability) => write!(f, "enable-{}", capability.domain().to_lowercase()),
			RequestPurpose::Command => f.write_str("command"),
			RequestPurpose::Poll => f.write_str("poll"),
			RequestPurpose::ResponseBody => f.write_str("response-body"),
		}
	}
}

/// An outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
	pub id: u64,
	pub method: String,
	pub issued_at: Instant,
	pub purpose: RequestPurpose,
}

struct Entry {
	request: PendingRequest,
	reply: oneshot::Sender<Result<Value>>,
}

/// Table of in-flight requests keyed by id.
#[derive(Clone, Default)]
pub struct PendingTable {
	entries: Arc<Mutex<HashMap<u64, Entry>>>,
}

impl PendingTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `id` and returns the receiver its reply will be delivered on.
	///
	/// An id may have at most one registration at a time.
	pub fn register(
		&self,
		id: u64,
		method: &str,
		purpose: RequestPurpose,
	) -> Result<oneshot::Receiver<Result<Value>>> {
		let mut entries = self.entries.lock();
		if entries.contains_key(&id) {
			return Err(Error::Protocol(format!("request id {id} is already pending")));
		}

		let (reply, rx) = oneshot::channel();
		entries.insert(
			id,
			Entry {
				request: PendingRequest {
					id,
					method: method.to_string(),
					issued_at: Instant::now(),
					purpose,
				},
				reply,
			},
		);
		Ok(rx)
	}

	/// Resolves the registration matching `response.id`.
	///
	/// Returns `false` when no registration exists; such responses are dropped.
	pub fn resolve(&self, response: Response) -> bool {
		let Some(entry) = self.entries.lock().remove(&response.id) else {
			return false;
		};

		let elapsed = entry.request.issued_at.elapsed();
		tracing::debug!(
			target = "pagewatch.router",
			id = response.id,
			method = %entry.request.method,
			purpose = %entry.request.purpose,
			elapsed_ms = elapsed.as_millis() as u64,
			"response correlated"
		);

		let result = match response.error {
			Some(error) => Err(Error::Remote {
				method: entry.request.method,
				code: error.code,
				message: error.message,
			}),
			None => Ok(response.result.unwrap_or(Value::Null)),
		};
		// The waiter may have given up already; that is not an error.
		let _ = entry.reply.send(result);
		true
	}

	/// Removes a registration without resolving it.
	pub fn cancel(&self, id: u64) -> bool {
		self.entries.lock().remove(&id).is_some()
	}

	pub fn contains(&self, id: u64) -> bool {
		self.entries.lock().contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Copies of every outstanding request, oldest first.
	pub fn snapshot(&self) -> Vec<PendingRequest> {
		let mut requests: Vec<_> = self
			.entries
			.lock()
			.values()
			.map(|entry| entry.request.clone())
			.collect();
		requests.sort_by_key(|request| (request.issued_at, request.id));
		requests
	}

	/// Drops every registration. Waiters observe [`Error::ChannelClosed`].
	pub fn clear(&self) {
		self.entries.lock().clear();
	}
}

/// RAII guard removing a registration when its waiter goes away unresolved.
struct CancelGuard {
	id: u64,
	table: PendingTable,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.table.cancel(self.id) {
			tracing::debug!(target = "pagewatch.router", id = self.id, "cancelled pending request");
		}
	}
}

/// Future resolving to the correlated response of one request.
///
/// Dropping it before resolution removes the registration, so a late reply is
/// treated as an unknown id.
pub struct PendingResponse {
	id: u64,
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl PendingResponse {
	pub(crate) fn new(id: u64, rx: oneshot::Receiver<Result<Value>>, table: PendingTable) -> Self {
		Self {
			id,
			rx,
			guard: CancelGuard {
				id,
				table,
				completed: false,
			},
		}
	}

	/// Id this response is correlated by.
	pub fn id(&self) -> u64 {
		self.id
	}
}

impl Future for PendingResponse {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}
