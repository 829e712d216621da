//! User-visible output.
//!
//! The session and monitor describe what happened as [`Report`] values; a
//! [`Reporter`] decides how to render them. The CLI prints them to the
//! terminal and writes screenshots to disk.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use pagewatch_protocol::{Cookie, TargetInfo};
use serde_json::Value;

use crate::filter::Verbosity;

/// Payload of a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
	/// Short confirmation.
	Done(String),
	/// Text read from the page.
	Text(String),
	Cookies(Vec<Cookie>),
	/// Value read from `localStorage`.
	Storage(Value),
	/// Decoded PNG capture and where it should be written.
	Screenshot { dir: PathBuf, filename: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
	Selected { target: TargetInfo, level: Verbosity },
	Connected { target_id: String },
	Disconnected,
	Reconnecting { attempt: u32, max_attempts: u32 },
	/// The capability barrier passed with no command to run.
	Monitoring,
	Console { tag: String, text: String },
	Request { method: String, url: String, params: Option<Value> },
	Response { status: u16, status_text: String, url: String, duration: Option<Duration> },
	/// Redacted, pretty-printed JSON body.
	ResponseBody { body: String },
	LoadingFailed { request_id: String, error_text: String },
	RequestTimedOut { request_id: String },
	CommandSucceeded { command: String, output: CommandOutput },
	CommandFailed { command: String, message: String },
	/// Fatal condition outside any command.
	Fatal { message: String },
	ShuttingDown,
	Interrupted,
}

pub trait Reporter: Send {
	fn report(&mut self, report: Report) -> io::Result<()>;
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
	fn report(&mut self, report: Report) -> io::Result<()> {
		(**self).report(report)
	}
}
