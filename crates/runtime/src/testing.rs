//! In-memory transports and a scripted fake target for tests.
//!
//! [`memory_transport`] builds a client [`TransportParts`] wired to a
//! [`FakeTarget`] over a `tokio::io::duplex` pipe, so tests drive real
//! WebSocket framing without sockets.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use pagewatch_protocol::{Request, TargetInfo};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::error::{Error, Result};
use crate::session::{Connector, TargetResolver};
use crate::transport::{BoxFut, TransportParts, WebSocketTransport};

/// Builds a connected client transport and the target end of it.
pub async fn memory_transport() -> (TransportParts, FakeTarget) {
	let (client_io, server_io) = duplex(256 * 1024);
	let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
	let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
	(WebSocketTransport::from_stream(client), FakeTarget { socket: server })
}

/// A page target used by session tests.
pub fn page_target(id: &str) -> TargetInfo {
	TargetInfo {
		id: id.to_string(),
		title: format!("Page {id}"),
		kind: "page".to_string(),
		url: "https://example.com/".to_string(),
		web_socket_debugger_url: Some(format!("ws://127.0.0.1:9222/devtools/page/{id}")),
	}
}

/// Target side of an in-memory transport.
pub struct FakeTarget {
	socket: WebSocketStream<DuplexStream>,
}

impl FakeTarget {
	/// Next request the client wrote, or `None` once the client is gone.
	pub async fn next_request(&mut self) -> Option<Request> {
		loop {
			match self.socket.next().await? {
				Ok(Message::Text(text)) => match serde_json::from_str(&text) {
					Ok(request) => return Some(request),
					Err(e) => panic!("client wrote a non-request frame {text:?}: {e}"),
				},
				Ok(Message::Close(_)) | Err(_) => return None,
				Ok(_) => {}
			}
		}
	}

	pub async fn reply(&mut self, id: u64, result: Value) {
		self.send_raw(&json!({ "id": id, "result": result }).to_string()).await;
	}

	pub async fn reply_error(&mut self, id: u64, code: i64, message: &str) {
		self.send_raw(&json!({ "id": id, "error": { "code": code, "message": message } }).to_string())
			.await;
	}

	pub async fn emit(&mut self, method: &str, params: Value) {
		self.send_raw(&json!({ "method": method, "params": params }).to_string()).await;
	}

	pub async fn send_raw(&mut self, text: &str) {
		// The client may already have dropped its end; tests assert on what it saw.
		let _ = self.socket.send(Message::Text(text.to_string())).await;
	}

	/// Answers the capability barrier: reads one enable request per capability
	/// and acknowledges each. Returns the enable requests in arrival order.
	pub async fn ack_capabilities(&mut self) -> Vec<Request> {
		let mut enables = Vec::new();
		while enables.len() < pagewatch_protocol::Capability::REQUIRED.len() {
			let request = self.next_request().await.expect("client closed during barrier");
			assert!(
				request.method.ends_with(".enable"),
				"expected an enable request, got {}",
				request.method
			);
			self.reply(request.id, json!({})).await;
			enables.push(request);
		}
		enables
	}

	/// Collects every request written until the client goes away.
	pub async fn drain(mut self) -> Vec<Request> {
		let mut requests = Vec::new();
		while let Some(request) = self.next_request().await {
			requests.push(request);
		}
		requests
	}

	/// Writes a frame with a reserved opcode, which the client must reject as
	/// a protocol violation.
	pub async fn corrupt(&mut self) {
		let _ = self.socket.get_mut().write_all(&[0x83, 0x00]).await;
		let _ = self.socket.get_mut().flush().await;
	}

	/// Skips requests until the client's close frame arrives. Returns `false`
	/// if the client went away without one.
	pub async fn await_client_close(&mut self) -> bool {
		while let Some(message) = self.socket.next().await {
			match message {
				Ok(Message::Close(_)) => return true,
				Ok(_) => {}
				Err(_) => return false,
			}
		}
		false
	}

	/// Performs a close handshake from the target side.
	pub async fn close(mut self) {
		let _ = self.socket.close(None).await;
	}
}

/// Resolver answering from a fixed target list, counting lookups.
pub struct StaticResolver {
	targets: Vec<TargetInfo>,
	lookups: AtomicUsize,
}

impl StaticResolver {
	pub fn new(targets: Vec<TargetInfo>) -> Self {
		Self {
			targets,
			lookups: AtomicUsize::new(0),
		}
	}

	pub fn lookups(&self) -> usize {
		self.lookups.load(Ordering::SeqCst)
	}
}

impl TargetResolver for StaticResolver {
	fn resolve<'a>(&'a self, target_id: &'a str) -> BoxFut<'a, Result<TargetInfo>> {
		Box::pin(async move {
			self.lookups.fetch_add(1, Ordering::SeqCst);
			TargetInfo::find(&self.targets, target_id)
				.cloned()
				.ok_or_else(|| Error::TargetNotFound(target_id.to_string()))
		})
	}
}

/// Connector handing out queued transports; an empty queue refuses the connection.
#[derive(Default)]
pub struct ScriptedConnector {
	queue: Mutex<VecDeque<TransportParts>>,
	attempts: AtomicUsize,
}

impl ScriptedConnector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, parts: TransportParts) {
		self.queue.lock().push_back(parts);
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

impl Connector for ScriptedConnector {
	fn connect<'a>(&'a self, target: &'a TargetInfo) -> BoxFut<'a, Result<TransportParts>> {
		Box::pin(async move {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			self.queue.lock().pop_front().ok_or_else(|| Error::ConnectionFailed {
				url: target.web_socket_debugger_url.clone().unwrap_or_default(),
				reason: "connection refused".to_string(),
			})
		})
	}
}
