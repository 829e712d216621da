//! Command model and argument validation.
//!
//! A command arrives as a name plus positional string arguments. [`Command::parse`]
//! validates them into a typed [`Command`]; a missing or malformed required
//! argument is a [`CommandError::Validation`] and nothing is sent to the target.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{CommandError, Result};

pub const DEFAULT_WAIT: Duration = Duration::from_millis(1000);
pub const DEFAULT_ELEMENT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_THROTTLE_KBPS: u32 = 1024;
pub const DEFAULT_SCREENSHOT_DIR: &str = "./screenshots";

/// Command names and the older aliases they still answer to.
const ALIASES: &[(&str, &str)] = &[
	("goto", "navigate"),
	("refresh", "reload"),
	("element-click", "click-element"),
	("get-text", "read-text"),
	("mobile", "emulate-mobile"),
	("network", "throttle-network"),
	("wait-element", "wait-for-element"),
];

/// Every command name accepted on the command line.
pub const COMMAND_NAMES: &[&str] = &[
	"navigate",
	"reload",
	"click-element",
	"read-text",
	"cookie",
	"storage",
	"emulate-mobile",
	"throttle-network",
	"wait",
	"wait-for-element",
	"scroll-to",
	"screenshot",
	"type",
	"click-at",
];

/// How a command decides it is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
	/// Completes on its correlated response or its timeout.
	OneShot,
	/// Completes after a duration or when a polled condition holds.
	Continuous,
}

/// A command name and its raw positional arguments, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
	pub name: String,
	pub args: Vec<String>,
}

impl Invocation {
	pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			name: name.into(),
			args,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum CookieAction {
	List,
	Set { name: String, value: String },
	Get { name: String },
	Delete { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageAction {
	List,
	Set { key: String, value: String },
	Get { key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
	Selector(String),
	Point { x: f64, y: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Navigate { url: String },
	Reload,
	ClickElement { selector: String },
	ReadText { selector: String },
	Cookie(CookieAction),
	Storage(StorageAction),
	EmulateMobile,
	ThrottleNetwork { kbps: u32 },
	Wait { duration: Duration },
	WaitForElement { selector: String, timeout: Duration },
	ScrollTo(ScrollTarget),
	Screenshot { dir: PathBuf, filename: String },
	Type { selector: String, text: String },
	ClickAt { x: f64, y: f64 },
}

impl Command {
	/// Validates `invocation` into a command.
	pub fn parse(invocation: &Invocation) -> Result<Self> {
		let name = canonical_name(&invocation.name);
		let args = Args {
			command: name,
			values: &invocation.args,
		};

		let command = match name {
			"navigate" => Command::Navigate {
				url: args.required(0, "url")?,
			},
			"reload" => Command::Reload,
			"click-element" => Command::ClickElement {
				selector: args.required(0, "selector")?,
			},
			"read-text" => Command::ReadText {
				selector: args.required(0, "selector")?,
			},
			"cookie" => Command::Cookie(parse_cookie(&args)?),
			"storage" => Command::Storage(parse_storage(&args)?),
			"emulate-mobile" => Command::EmulateMobile,
			"throttle-network" => Command::ThrottleNetwork {
				kbps: args.positive(0).unwrap_or(DEFAULT_THROTTLE_KBPS),
			},
			"wait" => Command::Wait {
				duration: args
					.positive(0)
					.map(|ms| Duration::from_millis(u64::from(ms)))
					.unwrap_or(DEFAULT_WAIT),
			},
			"wait-for-element" => Command::WaitForElement {
				selector: args.required(0, "selector")?,
				timeout: args
					.positive(1)
					.map(|ms| Duration::from_millis(u64::from(ms)))
					.unwrap_or(DEFAULT_ELEMENT_TIMEOUT),
			},
			"scroll-to" => Command::ScrollTo(parse_scroll_target(&args.required(0, "selector|x,y")?)),
			"screenshot" => Command::Screenshot {
				dir: PathBuf::from(args.optional(0).unwrap_or(DEFAULT_SCREENSHOT_DIR)),
				filename: args
					.optional(1)
					.map(str::to_string)
					.unwrap_or_else(default_screenshot_name),
			},
			"type" => Command::Type {
				selector: args.required(0, "selector")?,
				text: args.required(1, "text")?,
			},
			"click-at" => Command::ClickAt {
				x: args.coordinate(0, "x")?,
				y: args.coordinate(1, "y")?,
			},
			_ => return Err(CommandError::UnknownCommand(invocation.name.clone())),
		};
		Ok(command)
	}

	pub fn name(&self) -> &'static str {
		match self {
			Command::Navigate { .. } => "navigate",
			Command::Reload => "reload",
			Command::ClickElement { .. } => "click-element",
			Command::ReadText { .. } => "read-text",
			Command::Cookie(_) => "cookie",
			Command::Storage(_) => "storage",
			Command::EmulateMobile => "emulate-mobile",
			Command::ThrottleNetwork { .. } => "throttle-network",
			Command::Wait { .. } => "wait",
			Command::WaitForElement { .. } => "wait-for-element",
			Command::ScrollTo(_) => "scroll-to",
			Command::Screenshot { .. } => "screenshot",
			Command::Type { .. } => "type",
			Command::ClickAt { .. } => "click-at",
		}
	}

	pub fn kind(&self) -> CommandKind {
		match self {
			Command::Wait { .. } | Command::WaitForElement { .. } => CommandKind::Continuous,
			_ => CommandKind::OneShot,
		}
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

fn canonical_name(name: &str) -> &str {
	ALIASES
		.iter()
		.find(|(alias, _)| *alias == name)
		.map(|(_, canonical)| *canonical)
		.unwrap_or(name)
}

fn default_screenshot_name() -> String {
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or_default();
	format!("screenshot-{millis}.png")
}

struct Args<'a> {
	command: &'a str,
	values: &'a [String],
}

impl Args<'_> {
	fn optional(&self, index: usize) -> Option<&str> {
		self.values.get(index).map(String::as_str).filter(|v| !v.is_empty())
	}

	fn required(&self, index: usize, what: &str) -> Result<String> {
		self.optional(index)
			.map(str::to_string)
			.ok_or_else(|| CommandError::Validation(format!("{} requires <{what}>", self.command)))
	}

	/// Positive integer argument; absent, malformed or zero values fall back to the default.
	fn positive(&self, index: usize) -> Option<u32> {
		self.optional(index)
			.and_then(|v| v.parse::<u32>().ok())
			.filter(|v| *v > 0)
	}

	fn coordinate(&self, index: usize, what: &str) -> Result<f64> {
		let raw = self.required(index, what)?;
		raw.parse::<f64>()
			.ok()
			.filter(|v| v.is_finite())
			.ok_or_else(|| CommandError::Validation(format!("{} expects a number for <{what}>, got '{raw}'", self.command)))
	}
}

fn parse_cookie(args: &Args<'_>) -> Result<CookieAction> {
	match args.optional(0) {
		Some("list") => Ok(CookieAction::List),
		Some("set") => Ok(CookieAction::Set {
			name: args.required(1, "name")?,
			value: args.required(2, "value")?,
		}),
		Some("get") => Ok(CookieAction::Get {
			name: args.required(1, "name")?,
		}),
		Some("delete") => Ok(CookieAction::Delete {
			name: args.required(1, "name")?,
		}),
		Some(other) => Err(CommandError::Validation(format!(
			"unknown cookie action '{other}' (expected list, set, get or delete)"
		))),
		None => Err(CommandError::Validation("cookie requires <list|set|get|delete>".to_string())),
	}
}

fn parse_storage(args: &Args<'_>) -> Result<StorageAction> {
	match args.optional(0) {
		Some("list") => Ok(StorageAction::List),
		Some("set") => Ok(StorageAction::Set {
			key: args.required(1, "key")?,
			value: args.required(2, "value")?,
		}),
		Some("get") => Ok(StorageAction::Get {
			key: args.required(1, "key")?,
		}),
		Some(other) => Err(CommandError::Validation(format!(
			"unknown storage action '{other}' (expected list, set or get)"
		))),
		None => Err(CommandError::Validation("storage requires <list|set|get>".to_string())),
	}
}

/// `x,y` scrolls to a point; anything else is a selector.
fn parse_scroll_target(raw: &str) -> ScrollTarget {
	let point = raw.split_once(',').and_then(|(x, y)| {
		let x = x.trim().parse::<f64>().ok()?;
		let y = y.trim().parse::<f64>().ok()?;
		Some(ScrollTarget::Point { x, y })
	});
	point.unwrap_or_else(|| ScrollTarget::Selector(raw.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(name: &str, args: &[&str]) -> Result<Command> {
		Command::parse(&Invocation::new(name, args.iter().map(|s| s.to_string()).collect()))
	}

	#[test]
	fn required_arguments_are_validated() {
		for (name, args) in [
			("navigate", vec![]),
			("click-element", vec![]),
			("read-text", vec![]),
			("wait-for-element", vec![]),
			("scroll-to", vec![]),
			("type", vec!["#name"]),
			("click-at", vec!["10"]),
			("cookie", vec!["set", "sid"]),
			("cookie", vec!["delete"]),
			("storage", vec!["get"]),
		] {
			let err = parse(name, &args).unwrap_err();
			assert!(matches!(err, CommandError::Validation(_)), "{name} {args:?}: {err}");
		}
	}

	#[test]
	fn unknown_command_is_rejected() {
		assert!(matches!(parse("profile", &["start"]), Err(CommandError::UnknownCommand(name)) if name == "profile"));
	}

	#[test]
	fn aliases_resolve_to_commands() {
		assert_eq!(
			parse("goto", &["https://example.com"]).unwrap(),
			Command::Navigate {
				url: "https://example.com".into()
			}
		);
		assert_eq!(parse("refresh", &[]).unwrap(), Command::Reload);
		assert_eq!(parse("mobile", &[]).unwrap(), Command::EmulateMobile);
	}

	#[test]
	fn numeric_defaults_apply_to_missing_or_bad_values() {
		assert_eq!(parse("throttle-network", &[]).unwrap(), Command::ThrottleNetwork { kbps: 1024 });
		assert_eq!(parse("throttle-network", &["abc"]).unwrap(), Command::ThrottleNetwork { kbps: 1024 });
		assert_eq!(parse("throttle-network", &["256"]).unwrap(), Command::ThrottleNetwork { kbps: 256 });
		assert_eq!(
			parse("wait", &["0"]).unwrap(),
			Command::Wait {
				duration: Duration::from_millis(1000)
			}
		);
		assert_eq!(
			parse("wait-for-element", &["#login", "2000"]).unwrap(),
			Command::WaitForElement {
				selector: "#login".into(),
				timeout: Duration::from_millis(2000)
			}
		);
	}

	#[test]
	fn scroll_target_distinguishes_points_from_selectors() {
		assert_eq!(
			parse("scroll-to", &["0, 1200"]).unwrap(),
			Command::ScrollTo(ScrollTarget::Point { x: 0.0, y: 1200.0 })
		);
		assert_eq!(
			parse("scroll-to", &["#footer"]).unwrap(),
			Command::ScrollTo(ScrollTarget::Selector("#footer".into()))
		);
	}

	#[test]
	fn click_at_requires_numbers() {
		assert!(matches!(parse("click-at", &["10", "north"]), Err(CommandError::Validation(_))));
		assert_eq!(parse("click-at", &["10", "20.5"]).unwrap(), Command::ClickAt { x: 10.0, y: 20.5 });
	}

	#[test]
	fn screenshot_defaults() {
		let Command::Screenshot { dir, filename } = parse("screenshot", &[]).unwrap() else {
			panic!("expected screenshot");
		};
		assert_eq!(dir, PathBuf::from("./screenshots"));
		assert!(filename.starts_with("screenshot-") && filename.ends_with(".png"));

		assert_eq!(
			parse("screenshot", &["out", "home.png"]).unwrap(),
			Command::Screenshot {
				dir: PathBuf::from("out"),
				filename: "home.png".into()
			}
		);
	}

	#[test]
	fn kinds() {
		assert_eq!(parse("wait", &[]).unwrap().kind(), CommandKind::Continuous);
		assert_eq!(parse("wait-for-element", &["#a"]).unwrap().kind(), CommandKind::Continuous);
		assert_eq!(parse("reload", &[]).unwrap().kind(), CommandKind::OneShot);
		assert_eq!(parse("click-at", &["1", "2"]).unwrap().kind(), CommandKind::OneShot);
	}

	#[test]
	fn every_listed_name_parses_or_fails_validation() {
		for name in COMMAND_NAMES {
			match parse(name, &[]) {
				Ok(command) => assert_eq!(command.name(), *name),
				Err(err) => assert!(matches!(err, CommandError::Validation(_)), "{name}: {err}"),
			}
		}
	}
}
