//! Terminal rendering of session reports.
//!
//! Page output (console lines, network traffic, command results) goes to
//! stdout; diagnostics from the binary itself go through tracing to stderr.


use std::fs;
use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;
use pagewatch::{CommandOutput, Report, Reporter};
use pagewatch_protocol::{Cookie, TargetInfo};
use serde_json::Value;

/// Writes reports as colored lines and screenshots as files.
pub struct ConsoleReporter<W> {
	out: W,
}

impl ConsoleReporter<io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}
}

impl<W: Write> ConsoleReporter<W> {
	pub fn new(out: W) -> Self {
		Self { out }
	}

	pub fn into_inner(self) -> W {
		self.out
	}

	fn render(&mut self, report: Report) -> io::Result<()> {
		match report {
			Report::Selected { target, level } => {
				writeln!(self.out, "{} {} ({})", "Target:".bold(), target.title, target.url)?;
				writeln!(self.out, "{} {level}", "Level:".bold())
			}
			Report::Connected { target_id } => writeln!(self.out, "{} connected to {target_id}", "✓".green()),
			Report::Disconnected => writeln!(self.out, "{}", "connection closed".yellow()),
			Report::Reconnecting { attempt, max_attempts } => {
				writeln!(self.out, "{}", format!("reconnecting ({attempt}/{max_attempts})...").yellow())
			}
			Report::Monitoring => writeln!(self.out, "{}", "monitoring console and network, Ctrl-C to stop".dimmed()),
			Report::Console { tag, text } => {
				let label = format!("[console.{tag}]");
				let label = match tag.as_str() {
					"error" | "assert" => label.red(),
					"warn" | "warning" => label.yellow(),
					"info" => label.cyan(),
					_ => label.normal(),
				};
				writeln!(self.out, "{label} {text}")
			}
			Report::Request { method, url, params } => {
				writeln!(self.out, "{} {method} {url}", "→".blue())?;
				if let Some(params) = params {
					writeln!(self.out, "  {} {}", "params:".dimmed(), pretty(&params))?;
				}
				Ok(())
			}
			Report::Response {
				status,
				status_text,
				url,
				duration,
			} => {
				let status_line = format!("{status} {status_text}");
				let status_line = if status >= 400 {
					status_line.red()
				} else {
					status_line.green()
				};
				match duration {
					Some(duration) => writeln!(
						self.out,
						"{} {status_line} {url} {}",
						"←".blue(),
						format!("({}ms)", duration.as_millis()).dimmed()
					),
					None => writeln!(self.out, "{} {status_line} {url}", "←".blue()),
				}
			}
			Report::ResponseBody { body } => writeln!(self.out, "{}", body.dimmed()),
			Report::LoadingFailed {
				request_id,
				error_text,
			} => writeln!(self.out, "{} request {request_id} failed: {error_text}", "✗".red()),
			Report::RequestTimedOut { request_id } => writeln!(
				self.out,
				"{}",
				format!("request {request_id} timed out with no response").yellow()
			),
			Report::CommandSucceeded { command, output } => self.command_output(&command, output),
			Report::CommandFailed { command, message } => {
				writeln!(self.out, "{} {command} failed: {message}", "✗".red())
			}
			Report::Fatal { message } => writeln!(self.out, "{} {message}", "✗".red()),
			Report::ShuttingDown => writeln!(self.out, "{}", "shutting down".dimmed()),
			Report::Interrupted => writeln!(self.out, "{}", "interrupted, shutting down".dimmed()),
		}
	}

	fn command_output(&mut self, command: &str, output: CommandOutput) -> io::Result<()> {
		match output {
			CommandOutput::Done(message) => writeln!(self.out, "{} {message}", "✓".green()),
			CommandOutput::Text(text) => writeln!(self.out, "{text}"),
			CommandOutput::Cookies(cookies) if cookies.is_empty() => {
				writeln!(self.out, "{}", "no cookies".dimmed())
			}
			CommandOutput::Cookies(cookies) => {
				for cookie in &cookies {
					write_cookie(&mut self.out, cookie)?;
				}
				Ok(())
			}
			CommandOutput::Storage(Value::Null) => writeln!(self.out, "{}", "(not set)".dimmed()),
			CommandOutput::Storage(Value::String(value)) => writeln!(self.out, "{value}"),
			CommandOutput::Storage(value) => writeln!(self.out, "{}", pretty(&value)),
			CommandOutput::Screenshot { dir, filename, data } => {
				let path = save_file(&dir, &filename, &data)?;
				tracing::debug!(target = "pagewatch.output", %command, path = %path.display(), bytes = data.len(), "screenshot written");
				writeln!(self.out, "{} screenshot saved to {}", "✓".green(), path.display())
			}
		}
	}
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
	fn report(&mut self, report: Report) -> io::Result<()> {
		self.render(report)?;
		self.out.flush()
	}
}

/// Writes the target listing shown when no target id is given.
pub fn write_targets(out: &mut impl Write, targets: &[TargetInfo]) -> io::Result<()> {
	if targets.is_empty() {
		return writeln!(out, "{}", "no targets listed".yellow());
	}
	writeln!(out, "{}", "Available targets:".bold())?;
	for target in targets {
		writeln!(out, "  {} [{}] {}", target.id.cyan(), target.kind, target.title)?;
		writeln!(out, "    {}", target.url.dimmed())?;
	}
	Ok(())
}

fn write_cookie(out: &mut impl Write, cookie: &Cookie) -> io::Result<()> {
	let mut flags = Vec::new();
	if cookie.http_only {
		flags.push("httpOnly");
	}
	if cookie.secure {
		flags.push("secure");
	}
	write!(out, "{}={} {}", cookie.name.cyan(), cookie.value, format!("({}{})", cookie.domain, cookie.path).dimmed())?;
	if !flags.is_empty() {
		write!(out, " {}", flags.join(",").dimmed())?;
	}
	writeln!(out)
}

fn save_file(dir: &Path, filename: &str, data: &[u8]) -> io::Result<std::path::PathBuf> {
	fs::create_dir_all(dir)?;
	let path = dir.join(filename);
	fs::write(&path, data)?;
	Ok(path)
}

fn pretty(value: &Value) -> String {
	serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
