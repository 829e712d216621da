//! Request/response correlation and event routing over one transport.
//!
//! A [`Connection`] owns the transport's read and write pumps. Outbound
//! requests are registered in the [`PendingTable`] before they are written;
//! inbound frames are handed to [`Connection::dispatch`] by the session loop,
//! which resolves correlated responses and returns events for classification.
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] with a method, params and purpose
//! 2. An id is allocated and registered, then the frame is queued to the writer task
//! 3. The reader task pushes inbound frames to [`Inbound`]
//! 4. The session loop feeds each frame to [`Connection::dispatch`]
//! 5. A response with a registered id resolves the caller's [`PendingResponse`]
//! 6. A frame with a method and no id comes back as an [`Event`]
//!
//! No ordering is assumed across distinct ids; each id is satisfied at most once.

mod ids;
mod pending;


use std::sync::Arc;
use std::time::Duration;

pub use ids::{ENABLE_BLOCK_START, FIRST_SEQUENTIAL_ID, IdAllocator};
use pagewatch_protocol::{Capability, Event, InboundMessage, Request};
use parking_lot::Mutex;
pub use pending::{PendingRequest, PendingResponse, PendingTable, RequestPurpose};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::transport::{TransportEvent, TransportParts};

/// How long terminate waits for already-queued frames to reach the socket.
const FLUSH_GRACE: Duration = Duration::from_millis(250);

enum Outbound {
	Frame(String),
	Close,
	Terminate,
}

/// Inbound side of a connection, consumed by the session loop.
pub struct Inbound {
	events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Inbound {
	/// Next transport event. A vanished reader counts as a close.
	pub async fn recv(&mut self) -> TransportEvent {
		self.events.recv().await.unwrap_or(TransportEvent::Closed)
	}
}

/// One open transport plus the correlation state that lives as long as it does.
pub struct Connection {
	ids: Arc<IdAllocator>,
	pending: PendingTable,
	outbound: mpsc::UnboundedSender<Outbound>,
	enabled: Mutex<Vec<Capability>>,
	reader: JoinHandle<()>,
	writer: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
	/// Starts the read and write pumps for `parts`.
	///
	/// Must be called from within a tokio runtime.
	pub fn open(parts: TransportParts, ids: Arc<IdAllocator>) -> (Self, Inbound) {
		let TransportParts {
			mut sender,
			receiver,
			events,
		} = parts;
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

		let reader = tokio::spawn(receiver.run());
		let writer = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				match message {
					Outbound::Frame(frame) => {
						if let Err(e) = sender.send(frame).await {
							tracing::error!(target = "pagewatch.transport", error = %e, "transport write error");
							break;
						}
					}
					Outbound::Close => {
						if let Err(e) = sender.close().await {
							tracing::debug!(target = "pagewatch.transport", error = %e, "close handshake failed");
						}
						break;
					}
					Outbound::Terminate => break,
				}
			}
		});

		let connection = Self {
			ids,
			pending: PendingTable::new(),
			outbound,
			enabled: Mutex::new(Vec::new()),
			reader,
			writer: Mutex::new(Some(writer)),
		};
		(connection, Inbound { events })
	}

	/// Registers and writes a request, returning the future of its response.
	pub fn send(&self, method: &str, params: Option<Value>, purpose: RequestPurpose) -> Result<PendingResponse> {
		let id = self.ids.allocate(purpose);
		let rx = self.pending.register(id, method, purpose)?;
		let response = PendingResponse::new(id, rx, self.pending.clone());

		tracing::debug!(target = "pagewatch.router", id, method, %purpose, "sending request");
		self.write(&Request::new(id, method, params))?;
		Ok(response)
	}

	/// Sends a request and waits for its response.
	pub async fn call(&self, method: &str, params: Option<Value>, purpose: RequestPurpose) -> Result<Value> {
		self.send(method, params, purpose)?.await
	}

	/// Writes a request without registering it; any reply is dropped as an unknown id.
	pub fn notify(&self, method: &str, params: Option<Value>) -> Result<u64> {
		let id = self.ids.next_sequential();
		tracing::debug!(target = "pagewatch.router", id, method, "sending notification");
		self.write(&Request::new(id, method, params))?;
		Ok(id)
	}

	fn write(&self, request: &Request) -> Result<()> {
		let frame = serde_json::to_string(request)?;
		self.outbound
			.send(Outbound::Frame(frame))
			.map_err(|_| Error::Transport("outbound channel closed".to_string()))
	}

	/// Routes one inbound frame.
	///
	/// Responses resolve their pending registration (unknown ids are dropped);
	/// events are returned to the caller. Malformed frames are logged and discarded.
	pub fn dispatch(&self, frame: &str) -> Option<Event> {
		let message = match serde_json::from_str::<InboundMessage>(frame) {
			Ok(message) => message,
			Err(e) => {
				tracing::warn!(target = "pagewatch.router", error = %e, "discarding malformed frame");
				return None;
			}
		};

		match message {
			InboundMessage::Response(response) => {
				let id = response.id;
				if !self.pending.resolve(response) {
					tracing::debug!(target = "pagewatch.router", id, "dropping response with unknown id");
				}
				None
			}
			InboundMessage::Event(event) => Some(event),
			InboundMessage::Unknown(value) => {
				tracing::debug!(target = "pagewatch.router", frame = %value, "ignoring unrecognised frame");
				None
			}
		}
	}

	/// Records a capability whose enable request was acknowledged.
	pub fn mark_enabled(&self, capability: Capability) {
		let mut enabled = self.enabled.lock();
		if !enabled.contains(&capability) {
			enabled.push(capability);
		}
	}

	/// Capabilities acknowledged on this connection, in acknowledgement order.
	pub fn enabled_capabilities(&self) -> Vec<Capability> {
		self.enabled.lock().clone()
	}

	pub fn pending(&self) -> &PendingTable {
		&self.pending
	}

	/// Sends a close frame after any queued frames, waiting briefly for the
	/// writer to get it onto the socket. The reader reports the close.
	pub async fn close(&self) {
		let _ = self.outbound.send(Outbound::Close);

		let writer = self.writer.lock().take();
		if let Some(mut writer) = writer {
			if tokio::time::timeout(FLUSH_GRACE, &mut writer).await.is_err() {
				tracing::debug!(target = "pagewatch.transport", "close frame not written in time; aborting");
				writer.abort();
			}
		}
	}

	/// Tears the transport down without a close handshake.
	///
	/// Frames queued before this call get a short grace period to reach the
	/// socket; the socket is then dropped. Pending waiters observe
	/// [`Error::ChannelClosed`].
	pub async fn terminate(&self) {
		self.reader.abort();
		self.pending.clear();
		let _ = self.outbound.send(Outbound::Terminate);

		let writer = self.writer.lock().take();
		if let Some(mut writer) = writer {
			if tokio::time::timeout(FLUSH_GRACE, &mut writer).await.is_err() {
				tracing::debug!(target = "pagewatch.transport", "writer did not drain in time; aborting");
				writer.abort();
			}
		}
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.reader.abort();
		if let Some(writer) = self.writer.get_mut().take() {
			writer.abort();
		}
	}
}
