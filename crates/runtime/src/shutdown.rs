//! Single idempotent teardown path.
//!
//! Every terminal condition (command completion, command failure, exhausted
//! reconnects, interrupts) funnels through [`ShutdownCoordinator`]. The first
//! invocation wins the set-once flag and runs the teardown sequence; later
//! invocations, concurrent or not, are no-ops.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use pagewatch_protocol::Capability;

use crate::error::Result;
use crate::transport::BoxFut;

/// Process exit status chosen by the first shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitStatus {
	#[default]
	Success,
	Failure,
}

impl ExitStatus {
	pub fn code(self) -> i32 {
		match self {
			ExitStatus::Success => 0,
			ExitStatus::Failure => 1,
		}
	}

	fn from_u8(raw: u8) -> Self {
		if raw == 0 { ExitStatus::Success } else { ExitStatus::Failure }
	}

	fn as_u8(self) -> u8 {
		self.code() as u8
	}
}

/// The resources a shutdown tears down, in the order it tears them down.
pub trait Teardown: Send {
	/// Stops the periodic request-timing sweep.
	fn cancel_sweep(&mut self);

	/// Forgets every tracked request start.
	fn clear_timings(&mut self);

	/// Capabilities acknowledged on the live connection, if any.
	fn enabled_capabilities(&self) -> Vec<Capability>;

	/// Best-effort `<Domain>.disable`; failures are ignored by the caller.
	fn send_disable(&mut self, capability: Capability) -> Result<()>;

	/// Drops the transport without a close handshake.
	fn terminate_transport(&mut self) -> BoxFut<'_, ()>;
}

/// Teardown with nothing to tear down (no transport was ever opened).
pub struct NoopTeardown;

impl Teardown for NoopTeardown {
	fn cancel_sweep(&mut self) {}

	fn clear_timings(&mut self) {}

	fn enabled_capabilities(&self) -> Vec<Capability> {
		Vec::new()
	}

	fn send_disable(&mut self, _capability: Capability) -> Result<()> {
		Ok(())
	}

	fn terminate_transport(&mut self) -> BoxFut<'_, ()> {
		Box::pin(async {})
	}
}

/// Set-once shutdown flag plus the exit status it was set with.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
	started: AtomicBool,
	status: AtomicU8,
}

impl ShutdownCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether a shutdown or interrupt has begun.
	pub fn is_shutting_down(&self) -> bool {
		self.started.load(Ordering::SeqCst)
	}

	/// Status recorded by the winning invocation (success before any).
	pub fn exit_status(&self) -> ExitStatus {
		ExitStatus::from_u8(self.status.load(Ordering::SeqCst))
	}

	/// Claims the flag. Only the first caller gets `true`.
	fn claim(&self, status: ExitStatus) -> bool {
		if self
			.started
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return false;
		}
		self.status.store(status.as_u8(), Ordering::SeqCst);
		true
	}

	/// Runs the teardown sequence once.
	///
	/// Returns the exit status on the winning invocation and `None` on every
	/// later one.
	pub async fn shutdown(&self, status: ExitStatus, teardown: &mut dyn Teardown) -> Option<ExitStatus> {
		if !self.claim(status) {
			tracing::debug!(target = "pagewatch.shutdown", "shutdown already in progress");
			return None;
		}
		tracing::info!(target = "pagewatch.shutdown", code = status.code(), "shutting down");

		teardown.cancel_sweep();
		teardown.clear_timings();
		for capability in teardown.enabled_capabilities() {
			if let Err(e) = teardown.send_disable(capability) {
				tracing::debug!(target = "pagewatch.shutdown", %capability, error = %e, "disable not sent");
			}
		}
		teardown.terminate_transport().await;

		Some(status)
	}

	/// Process-level interrupt: claims the flag and drops the transport,
	/// skipping the disable notifications.
	pub async fn interrupt(&self, status: ExitStatus, teardown: &mut dyn Teardown) -> Option<ExitStatus> {
		if !self.claim(status) {
			return None;
		}
		tracing::info!(target = "pagewatch.shutdown", code = status.code(), "interrupted");

		teardown.cancel_sweep();
		teardown.clear_timings();
		teardown.terminate_transport().await;

		Some(status)
	}
}
