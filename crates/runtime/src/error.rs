//! Error types for the pagewatch runtime.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a debugging target.
#[derive(Debug, Error)]
pub enum Error {
	/// Target discovery over the HTTP listing endpoint failed.
	#[error("Target discovery failed: {0}")]
	Discovery(String),

	/// No listed target has the requested id.
	#[error("No target with id '{0}'")]
	TargetNotFound(String),

	/// Failed to establish the WebSocket connection.
	#[error("Failed to connect to {url}: {reason}")]
	ConnectionFailed { url: String, reason: String },

	/// Transport-level error (socket read/write).
	#[error("Transport error: {0}")]
	Transport(String),

	/// Protocol-level error (framing, duplicate ids, unexpected shapes).
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// The target answered a request with an error payload.
	#[error("{method} failed: {message} (code {code})")]
	Remote {
		method: String,
		code: i64,
		message: String,
	},

	/// No correlated response within the allotted budget.
	#[error("Timeout after {}ms waiting for {what}", .after.as_millis())]
	Timeout { what: String, after: Duration },

	/// The response channel was dropped before a reply arrived (connection gone).
	#[error("Connection closed before a response arrived")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}

	/// Returns true for failures of the transport itself, which the session
	/// recovers from by reconnecting.
	pub fn is_transport(&self) -> bool {
		matches!(
			self,
			Error::ConnectionFailed { .. } | Error::Transport(_) | Error::ChannelClosed | Error::Io(_)
		)
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::Transport(err.to_string())
	}
}
