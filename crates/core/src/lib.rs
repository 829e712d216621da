//! pagewatch - command execution and event monitoring for a single page target
//!
//! Built on [`pagewatch_runtime`], this crate decides what to say to the page
//! and what to make of what it says back:
//!
//! - [`command`]: parsing user invocations into typed [`Command`]s
//! - [`executor`]: the capability barrier and per-command request sequences
//! - [`filter`]: verbosity levels, URL noise rules and body redaction
//! - [`monitor`]: turning console and network events into [`Report`]s
//! - [`session`]: connect, run, reconnect and shut down
//!
//! Rendering is left to a [`Reporter`] supplied by the caller.

pub mod command;
pub mod error;
pub mod executor;
pub mod filter;
pub mod monitor;
pub mod report;
pub mod session;

pub use command::{COMMAND_NAMES, Command, CommandKind, Invocation};
pub use error::{CommandError, Result};
pub use executor::{Executor, ExecutorConfig, enable_capabilities};
pub use filter::{FilterConfig, ParseVerbosityError, Verbosity, redact};
pub use monitor::{Monitor, Observation};
pub use pagewatch_runtime::{BoxFut, ExitStatus, ReconnectPolicy, TargetResolver, WebSocketConnector};
pub use report::{CommandOutput, Report, Reporter};
pub use session::{Session, SessionConfig};
