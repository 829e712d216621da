//! Session driver.
//!
//! A [`Session`] owns everything that outlives a single connection: the
//! lifecycle state machine, the id allocator, the monitor and its request
//! timings, the sweep schedule, and the reporter. [`Session::run`] drives one
//! logical task:
//!
//! ```text
//! validate ─► resolve ─► connect ─► barrier ─► command ─► shutdown ─► exit
//!               ▲                      │
//!               └──── backoff ◄─ close ┘   (bounded by ReconnectPolicy)
//! ```
//!
//! While a connection is open, one `select!` loop multiplexes inbound frames,
//! the running command, in-flight response-body fetches, the timing sweep and
//! the interrupt signal. Every terminal path funnels through the
//! [`ShutdownCoordinator`].


use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use pagewatch_protocol::{Capability, Event, TargetInfo};
use pagewatch_runtime::{
	BoxFut, CloseAction, Connection, Connector, Error, ErrorAction, ExitStatus, IdAllocator, Inbound, Lifecycle,
	PendingResponse, ReconnectPolicy, RequestPurpose, RequestTimings, ShutdownCoordinator, SweepSchedule,
	TargetResolver, Teardown, TransportEvent,
};
use serde_json::json;
use tokio::time::Instant;

use crate::command::{Command, Invocation};
use crate::error::CommandError;
use crate::executor::{Executor, ExecutorConfig, enable_capabilities};
use crate::filter::{FilterConfig, Verbosity};
use crate::monitor::Monitor;
use crate::report::{CommandOutput, Report, Reporter};

/// Everything a session needs to know before it starts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	pub target_id: String,
	pub level: Verbosity,
	/// Command to run; `None` monitors until interrupted.
	pub invocation: Option<Invocation>,
	pub reconnect: ReconnectPolicy,
	pub executor: ExecutorConfig,
	pub sweep_period: Duration,
	/// Age after which a request with no response is swept.
	pub timing_horizon: Duration,
}

impl SessionConfig {
	pub fn new(target_id: impl Into<String>) -> Self {
		Self {
			target_id: target_id.into(),
			level: Verbosity::default(),
			invocation: None,
			reconnect: ReconnectPolicy::default(),
			executor: ExecutorConfig::default(),
			sweep_period: Duration::from_secs(10),
			timing_horizon: Duration::from_secs(60),
		}
	}
}

/// How a pass over one connection ended.
enum Pass {
	Exit(ExitStatus),
	Closed,
}

pub struct Session {
	config: SessionConfig,
	resolver: Arc<dyn TargetResolver>,
	connector: Arc<dyn Connector>,
	reporter: Box<dyn Reporter>,
	lifecycle: Lifecycle,
	monitor: Monitor,
	sweep: SweepSchedule,
	ids: Arc<IdAllocator>,
	selected: bool,
}

impl Session {
	pub fn new(
		config: SessionConfig,
		resolver: Arc<dyn TargetResolver>,
		connector: Arc<dyn Connector>,
		reporter: Box<dyn Reporter>,
	) -> Self {
		let lifecycle = Lifecycle::new(config.reconnect, Arc::new(ShutdownCoordinator::new()));
		let monitor = Monitor::new(FilterConfig::new(config.level), RequestTimings::new(config.timing_horizon));
		Self {
			config,
			resolver,
			connector,
			reporter,
			lifecycle,
			monitor,
			sweep: SweepSchedule::idle(),
			ids: Arc::new(IdAllocator::new()),
			selected: false,
		}
	}

	/// Runs the session to completion and returns the process exit status.
	///
	/// `interrupt` resolving is treated as a user interrupt: the transport is
	/// torn down without disable notifications and the session exits 0.
	pub async fn run<I>(mut self, interrupt: I) -> ExitStatus
	where
		I: Future<Output = ()>,
	{
		tokio::pin!(interrupt);

		let command = match self.config.invocation.as_ref().map(Command::parse).transpose() {
			Ok(command) => command,
			Err(e) => {
				let name = self
					.config
					.invocation
					.as_ref()
					.map(|i| i.name.clone())
					.unwrap_or_default();
				self.emit(Report::CommandFailed {
					command: name,
					message: e.to_string(),
				});
				return self.finish(ExitStatus::Failure, None).await;
			}
		};

		self.sweep = SweepSchedule::start(self.config.sweep_period);

		loop {
			self.lifecycle.begin_connect();
			let attempt = tokio::select! {
				attempt = self.open() => attempt,
				_ = interrupt.as_mut() => return self.interrupt(None).await,
			};

			let action = match attempt {
				Ok((target, connection, inbound)) => {
					self.lifecycle.on_open();
					tracing::info!(target = "pagewatch.session", id = %target.id, "connected");
					self.emit(Report::Connected {
						target_id: target.id.clone(),
					});

					let pass = self
						.drive(&target, &connection, inbound, command.as_ref(), interrupt.as_mut())
						.await;
					if let Pass::Exit(status) = pass {
						return status;
					}
					self.lifecycle.on_closed()
				}
				Err(Error::TargetNotFound(id)) => {
					self.emit(Report::Fatal {
						message: format!("no target with id {id}"),
					});
					return self.finish(ExitStatus::Failure, None).await;
				}
				Err(e) => {
					tracing::warn!(target = "pagewatch.session", error = %e, "connection attempt failed");
					self.lifecycle.on_connect_failed()
				}
			};

			match action {
				CloseAction::Exit(status) => return status,
				CloseAction::Reconnect { attempt, delay } => {
					tracing::info!(target = "pagewatch.session", attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
					self.emit(Report::Reconnecting {
						attempt,
						max_attempts: self.lifecycle.policy().max_attempts,
					});
					tokio::select! {
						_ = tokio::time::sleep(delay) => {}
						_ = interrupt.as_mut() => return self.interrupt(None).await,
					}
				}
				CloseAction::Fatal => {
					self.emit(Report::Fatal {
						message: "max reconnection attempts reached".to_string(),
					});
					return self.finish(ExitStatus::Failure, None).await;
				}
			}
		}
	}

	/// Resolves the target afresh and opens a connection to it.
	async fn open(&mut self) -> pagewatch_runtime::Result<(TargetInfo, Connection, Inbound)> {
		let target = self.resolver.resolve(&self.config.target_id).await?;
		if !self.selected {
			self.selected = true;
			self.emit(Report::Selected {
				target: target.clone(),
				level: self.config.level,
			});
		}

		let parts = self.connector.connect(&target).await?;
		let (connection, inbound) = Connection::open(parts, self.ids.clone());
		Ok((target, connection, inbound))
	}

	async fn drive<I>(
		&mut self,
		target: &TargetInfo,
		connection: &Connection,
		mut inbound: Inbound,
		command: Option<&Command>,
		mut interrupt: Pin<&mut I>,
	) -> Pass
	where
		I: Future<Output = ()>,
	{
		let executor_config = self.config.executor.clone();
		let task = run_task(connection, &target.url, &executor_config, command);
		tokio::pin!(task);
		let mut task_done = false;
		let mut bodies: FuturesUnordered<PendingResponse> = FuturesUnordered::new();

		loop {
			tokio::select! {
				event = inbound.recv() => match event {
					TransportEvent::Frame(frame) => {
						if let Some(event) = connection.dispatch(&frame) {
							self.observe(connection, &event, &mut bodies);
						}
					}
					TransportEvent::Closed => {
						tracing::info!(target = "pagewatch.session", "transport closed");
						self.emit(Report::Disconnected);
						return Pass::Closed;
					}
					TransportEvent::Failed(reason) => {
						tracing::error!(target = "pagewatch.session", %reason, "transport error");
						match self.lifecycle.on_error() {
							ErrorAction::Close => {
								connection.close().await;
								self.emit(Report::Disconnected);
								return Pass::Closed;
							}
							ErrorAction::Exit(status) => return Pass::Exit(status),
						}
					}
				},
				outcome = &mut task, if !task_done => {
					task_done = true;
					let name = command.map(Command::name).unwrap_or_default().to_string();
					match outcome {
						Ok(None) => self.emit(Report::Monitoring),
						Ok(Some(output)) => {
							let status = self.complete(name, output);
							return Pass::Exit(self.finish(status, Some(connection)).await);
						}
						Err(e) if e.is_transport() => {
							tracing::debug!(target = "pagewatch.session", error = %e, "command interrupted by transport loss");
						}
						Err(e) => {
							tracing::debug!(target = "pagewatch.session", command = %name, error = %e, "command failed");
							self.emit(Report::CommandFailed { command: name, message: e.to_string() });
							return Pass::Exit(self.finish(ExitStatus::Failure, Some(connection)).await);
						}
					}
				},
				Some(body) = bodies.next() => match body {
					Ok(result) => {
						if let Some(report) = self.monitor.on_body(result) {
							self.emit(report);
						}
					}
					Err(e) => tracing::debug!(target = "pagewatch.session", error = %e, "response body unavailable"),
				},
				_ = self.sweep.tick() => {
					for report in self.monitor.sweep(Instant::now()) {
						self.emit(report);
					}
				},
				_ = interrupt.as_mut() => return Pass::Exit(self.interrupt(Some(connection)).await),
			}
		}
	}

	fn observe(&mut self, connection: &Connection, event: &Event, bodies: &mut FuturesUnordered<PendingResponse>) {
		let observation = self.monitor.on_event(event, Instant::now());
		for report in observation.reports {
			self.emit(report);
		}

		if let Some(request_id) = observation.fetch_body {
			match connection.send(
				"Network.getResponseBody",
				Some(json!({ "requestId": request_id })),
				RequestPurpose::ResponseBody,
			) {
				Ok(response) => bodies.push(response),
				Err(e) => tracing::debug!(target = "pagewatch.session", error = %e, "body fetch not sent"),
			}
		}
	}

	/// Reports a command's output. Failing to deliver it (e.g. writing a
	/// screenshot) fails the command.
	fn complete(&mut self, command: String, output: CommandOutput) -> ExitStatus {
		match self.reporter.report(Report::CommandSucceeded {
			command: command.clone(),
			output,
		}) {
			Ok(()) => ExitStatus::Success,
			Err(e) => {
				self.emit(Report::CommandFailed {
					command,
					message: e.to_string(),
				});
				ExitStatus::Failure
			}
		}
	}

	async fn finish(&mut self, status: ExitStatus, connection: Option<&Connection>) -> ExitStatus {
		let coordinator = self.lifecycle.shutdown().clone();
		if !coordinator.is_shutting_down() {
			self.emit(Report::ShuttingDown);
		}

		let mut teardown = SessionTeardown {
			connection,
			sweep: &mut self.sweep,
			monitor: &mut self.monitor,
		};
		let result = coordinator.shutdown(status, &mut teardown).await;
		self.lifecycle.on_terminated();
		result.unwrap_or_else(|| coordinator.exit_status())
	}

	async fn interrupt(&mut self, connection: Option<&Connection>) -> ExitStatus {
		let coordinator = self.lifecycle.shutdown().clone();
		if !coordinator.is_shutting_down() {
			self.emit(Report::Interrupted);
		}

		let mut teardown = SessionTeardown {
			connection,
			sweep: &mut self.sweep,
			monitor: &mut self.monitor,
		};
		let result = coordinator.interrupt(ExitStatus::Success, &mut teardown).await;
		self.lifecycle.on_terminated();
		result.unwrap_or_else(|| coordinator.exit_status())
	}

	fn emit(&mut self, report: Report) {
		if let Err(e) = self.reporter.report(report) {
			tracing::warn!(target = "pagewatch.session", error = %e, "failed to write report");
		}
	}
}

/// Capability barrier followed by the command, if any.
async fn run_task(
	connection: &Connection,
	page_url: &str,
	config: &ExecutorConfig,
	command: Option<&Command>,
) -> Result<Option<CommandOutput>, CommandError> {
	let enabled = enable_capabilities(connection).await?;
	tracing::info!(target = "pagewatch.session", enabled = enabled.len(), "capability barrier passed");

	match command {
		Some(command) => Executor::new(connection, page_url, config).run(command).await.map(Some),
		None => Ok(None),
	}
}

/// What the shutdown coordinator tears down for a session.
struct SessionTeardown<'a> {
	connection: Option<&'a Connection>,
	sweep: &'a mut SweepSchedule,
	monitor: &'a mut Monitor,
}

impl Teardown for SessionTeardown<'_> {
	fn cancel_sweep(&mut self) {
		self.sweep.cancel();
	}

	fn clear_timings(&mut self) {
		self.monitor.clear_timings();
	}

	fn enabled_capabilities(&self) -> Vec<Capability> {
		self.connection
			.map(Connection::enabled_capabilities)
			.unwrap_or_default()
	}

	fn send_disable(&mut self, capability: Capability) -> pagewatch_runtime::Result<()> {
		match self.connection {
			Some(connection) => connection.notify(capability.disable_method(), None).map(|_| ()),
			None => Ok(()),
		}
	}

	fn terminate_transport(&mut self) -> BoxFut<'_, ()> {
		let connection = self.connection;
		Box::pin(async move {
			if let Some(connection) = connection {
				connection.terminate().await;
			}
		})
	}
}
