//! Error types for command execution.

use std::time::Duration;

use thiserror::Error;

/// Ways a command can fail.
///
/// Every variant ends the session with a failure exit; none are retried.
#[derive(Debug, Error)]
pub enum CommandError {
	/// A required argument is missing or malformed. Nothing was sent.
	#[error("{0}")]
	Validation(String),

	#[error("unknown command: {0}")]
	UnknownCommand(String),

	/// The target answered with an error or an unusable result.
	#[error("{0}")]
	Protocol(String),

	#[error("timeout after {}ms waiting for {what}", .after.as_millis())]
	Timeout { what: String, after: Duration },

	#[error("element not found: {selector}")]
	ElementNotFound { selector: String },

	/// The page threw while evaluating an expression.
	#[error("evaluation failed: {0}")]
	Evaluation(String),

	#[error(transparent)]
	Runtime(#[from] pagewatch_runtime::Error),
}

impl CommandError {
	/// True when the failure came from the transport going away rather than
	/// from the command itself. Such commands are restarted after a reconnect.
	pub fn is_transport(&self) -> bool {
		matches!(self, CommandError::Runtime(e) if e.is_transport())
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, CommandError::Timeout { .. })
	}
}

impl From<serde_json::Error> for CommandError {
	fn from(err: serde_json::Error) -> Self {
		CommandError::Protocol(format!("unexpected result shape: {err}"))
	}
}

pub type Result<T> = std::result::Result<T, CommandError>;
