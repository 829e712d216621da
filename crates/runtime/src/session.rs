//! Session lifecycle: connection state, bounded reconnection and the seams
//! the session uses to find and reach its target.
//!
//! [`Lifecycle`] is the pure state machine behind the session driver. It never
//! touches a socket; it only decides what happens next when the transport
//! opens, closes, fails, or cannot be established.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pagewatch_protocol::TargetInfo;

use crate::error::{Error, Result};
use crate::shutdown::{ExitStatus, ShutdownCoordinator};
use crate::transport::{BoxFut, TransportParts, WebSocketTransport};

/// Looks up a target's current metadata.
///
/// Queried on every connection attempt, since the endpoint may have changed
/// state between attempts.
pub trait TargetResolver: Send + Sync {
	fn resolve<'a>(&'a self, target_id: &'a str) -> BoxFut<'a, Result<TargetInfo>>;
}

/// Opens a transport to a resolved target.
pub trait Connector: Send + Sync {
	fn connect<'a>(&'a self, target: &'a TargetInfo) -> BoxFut<'a, Result<TransportParts>>;
}

/// Connects to the target's `webSocketDebuggerUrl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
	fn connect<'a>(&'a self, target: &'a TargetInfo) -> BoxFut<'a, Result<TransportParts>> {
		Box::pin(async move {
			let url = target.web_socket_debugger_url.as_deref().ok_or_else(|| Error::ConnectionFailed {
				url: String::new(),
				reason: format!("target {} exposes no debugger url (another client attached?)", target.id),
			})?;
			WebSocketTransport::connect(url).await
		})
	}
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Disconnected,
	Connecting,
	Open,
	Closing,
	Terminated,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SessionState::Disconnected => "disconnected",
			SessionState::Connecting => "connecting",
			SessionState::Open => "open",
			SessionState::Closing => "closing",
			SessionState::Terminated => "terminated",
		};
		f.write_str(name)
	}
}

/// Bounded-retry reconnection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
	pub max_attempts: u32,
	pub backoff: Duration,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff: Duration::from_secs(2),
		}
	}
}

/// What the driver does after the transport closed or could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
	/// Shutdown already began; exit with its status.
	Exit(ExitStatus),
	/// Wait `delay`, then connect again. `attempt` is 1-based.
	Reconnect { attempt: u32, delay: Duration },
	/// Attempts exhausted; shut down with failure.
	Fatal,
}

/// What the driver does after a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
	/// Close the transport and let the close path decide.
	Close,
	/// Shutdown already began; the error is swallowed and the process fails.
	Exit(ExitStatus),
}

/// Session state machine.
pub struct Lifecycle {
	state: SessionState,
	attempts: u32,
	policy: ReconnectPolicy,
	shutdown: Arc<ShutdownCoordinator>,
}

impl Lifecycle {
	pub fn new(policy: ReconnectPolicy, shutdown: Arc<ShutdownCoordinator>) -> Self {
		Self {
			state: SessionState::Disconnected,
			attempts: 0,
			policy,
			shutdown,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Reconnect attempts since the last successful open.
	pub fn attempts(&self) -> u32 {
		self.attempts
	}

	pub fn policy(&self) -> ReconnectPolicy {
		self.policy
	}

	pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
		&self.shutdown
	}

	pub fn begin_connect(&mut self) {
		self.state = SessionState::Connecting;
	}

	/// Transport is up; the attempt counter starts over.
	pub fn on_open(&mut self) {
		self.state = SessionState::Open;
		self.attempts = 0;
	}

	/// Transport closed after having been open (or while connecting).
	pub fn on_closed(&mut self) -> CloseAction {
		self.state = SessionState::Disconnected;
		if self.shutdown.is_shutting_down() {
			return CloseAction::Exit(self.shutdown.exit_status());
		}
		self.retry_or_fail()
	}

	/// Discovery or the connect itself failed.
	pub fn on_connect_failed(&mut self) -> CloseAction {
		self.on_closed()
	}

	pub fn on_error(&mut self) -> ErrorAction {
		if self.shutdown.is_shutting_down() {
			return ErrorAction::Exit(ExitStatus::Failure);
		}
		self.state = SessionState::Closing;
		ErrorAction::Close
	}

	pub fn on_terminated(&mut self) {
		self.state = SessionState::Terminated;
	}

	fn retry_or_fail(&mut self) -> CloseAction {
		if self.attempts < self.policy.max_attempts {
			self.attempts += 1;
			CloseAction::Reconnect {
				attempt: self.attempts,
				delay: self.policy.backoff,
			}
		} else {
			CloseAction::Fatal
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::shutdown::NoopTeardown;

	fn lifecycle() -> Lifecycle {
		Lifecycle::new(ReconnectPolicy::default(), Arc::new(ShutdownCoordinator::new()))
	}

	#[test]
	fn reconnects_are_bounded_by_policy() {
		let mut lifecycle = lifecycle();
		lifecycle.begin_connect();
		lifecycle.on_open();

		for expected in 1..=3 {
			assert_eq!(
				lifecycle.on_closed(),
				CloseAction::Reconnect {
					attempt: expected,
					delay: Duration::from_secs(2)
				}
			);
			lifecycle.begin_connect();
		}

		assert_eq!(lifecycle.on_closed(), CloseAction::Fatal);
		assert_eq!(lifecycle.attempts(), 3);
	}

	#[test]
	fn successful_open_resets_attempts() {
		let mut lifecycle = lifecycle();
		assert!(matches!(lifecycle.on_connect_failed(), CloseAction::Reconnect { attempt: 1, .. }));
		assert!(matches!(lifecycle.on_connect_failed(), CloseAction::Reconnect { attempt: 2, .. }));

		lifecycle.on_open();
		assert_eq!(lifecycle.attempts(), 0);
		assert_eq!(lifecycle.state(), SessionState::Open);
		assert!(matches!(lifecycle.on_closed(), CloseAction::Reconnect { attempt: 1, .. }));
	}

	#[tokio::test]
	async fn close_after_shutdown_exits_with_recorded_status() {
		let mut lifecycle = lifecycle();
		lifecycle.on_open();
		lifecycle
			.shutdown()
			.shutdown(ExitStatus::Failure, &mut NoopTeardown)
			.await;

		assert_eq!(lifecycle.on_closed(), CloseAction::Exit(ExitStatus::Failure));
		assert_eq!(lifecycle.on_error(), ErrorAction::Exit(ExitStatus::Failure));
	}

	#[test]
	fn error_before_shutdown_requests_close() {
		let mut lifecycle = lifecycle();
		lifecycle.on_open();
		assert_eq!(lifecycle.on_error(), ErrorAction::Close);
		assert_eq!(lifecycle.state(), SessionState::Closing);
	}
}
