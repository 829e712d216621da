//! WebSocket transport to a debugging target.
//!
//! A transport is split into two halves the way the connection consumes it:
//!
//! - a [`Transport`] sender that writes text frames (owned by the connection's writer task)
//! - a [`TransportReceiver`] that pumps inbound frames into an unbounded channel
//!   as [`TransportEvent`]s (owned by the connection's reader task)
//!
//! The receiver always finishes by emitting exactly one terminal event:
//! [`TransportEvent::Closed`] for a close frame or end of stream, or
//! [`TransportEvent::Failed`] for a socket error.

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};

/// Boxed future used at the trait seams of this crate.
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Inbound transport activity, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// One complete text frame.
	Frame(String),
	/// The peer closed the socket or the stream ended.
	Closed,
	/// The socket failed.
	Failed(String),
}

/// Write half of a transport.
pub trait Transport: Send {
	/// Sends one text frame.
	fn send(&mut self, frame: String) -> BoxFut<'_, Result<()>>;

	/// Starts a graceful close handshake.
	fn close(&mut self) -> BoxFut<'_, Result<()>>;
}

/// Read half of a transport.
pub trait TransportReceiver: Send {
	/// Pumps inbound frames until the socket closes or fails.
	fn run(self: Box<Self>) -> BoxFut<'static, ()>;
}

/// Both halves of a transport plus the channel the receiver feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Sender half over any WebSocket stream.
pub struct WebSocketTransportSender<S> {
	sink: SplitSink<WebSocketStream<S>, Message>,
}

/// Receiver half over any WebSocket stream.
pub struct WebSocketTransportReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
	events: mpsc::UnboundedSender<TransportEvent>,
}

/// Constructors for WebSocket transports.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Connects to a target's `webSocketDebuggerUrl`.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		tracing::debug!(target = "pagewatch.transport", url, "connecting websocket");
		let (stream, _) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| Error::ConnectionFailed {
				url: url.to_string(),
				reason: e.to_string(),
			})?;
		Ok(Self::from_stream(stream))
	}

	/// Splits an established WebSocket stream into transport parts.
	pub fn from_stream<S>(stream: WebSocketStream<S>) -> TransportParts
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (sink, stream) = stream.split();
		let (events_tx, events) = mpsc::unbounded_channel();

		TransportParts {
			sender: Box::new(WebSocketTransportSender { sink }),
			receiver: Box::new(WebSocketTransportReceiver {
				stream,
				events: events_tx,
			}),
			events,
		}
	}
}

impl<S> Transport for WebSocketTransportSender<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn send(&mut self, frame: String) -> BoxFut<'_, Result<()>> {
		Box::pin(async move {
			self.sink.send(Message::Text(frame)).await?;
			Ok(())
		})
	}

	fn close(&mut self) -> BoxFut<'_, Result<()>> {
		Box::pin(async move {
			self.sink.close().await?;
			Ok(())
		})
	}
}

impl<S> TransportReceiver for WebSocketTransportReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn run(self: Box<Self>) -> BoxFut<'static, ()> {
		let WebSocketTransportReceiver { mut stream, events } = *self;
		Box::pin(async move {
			let terminal = loop {
				match stream.next().await {
					Some(Ok(Message::Text(text))) => {
						if events.send(TransportEvent::Frame(text)).is_err() {
							// Nobody is listening any more.
							return;
						}
					}
					Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
						Ok(text) => {
							if events.send(TransportEvent::Frame(text)).is_err() {
								return;
							}
						}
						Err(_) => {
							tracing::warn!(target = "pagewatch.transport", "dropping non-utf8 binary frame");
						}
					},
					Some(Ok(Message::Close(frame))) => {
						tracing::debug!(target = "pagewatch.transport", ?frame, "close frame received");
						break TransportEvent::Closed;
					}
					Some(Ok(_)) => {}
					Some(Err(e)) => break TransportEvent::Failed(e.to_string()),
					None => break TransportEvent::Closed,
				}
			};
			let _ = events.send(terminal);
		})
	}
}
