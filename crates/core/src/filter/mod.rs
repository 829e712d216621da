//! Relevance filtering for console and network traffic.
//!
//! A [`FilterConfig`] is built once per session from a [`Verbosity`] level and
//! answers three questions about the event stream:
//!
//! - is this URL noise? ([`FilterConfig::should_filter_url`])
//! - is this console line worth showing? ([`FilterConfig::is_important`])
//! - is this JSON response body worth showing? ([`FilterConfig::is_important_response`])
//!
//! The rule and keyword lists are policy data tuned for front-end dev servers
//! (Vite, HMR, UnoCSS), not an algorithm.

mod redact;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

pub use redact::{REDACTED, TRUNCATION_MARKER, redact, redact_with_limit};

/// How aggressively the monitor suppresses traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
	/// Show everything, including request lines and their params.
	Open,
	/// Drop dev-server and static-asset noise.
	#[default]
	Normal,
	/// Show only failures.
	Strict,
}

impl Verbosity {
	pub const ALL: [Verbosity; 3] = [Verbosity::Open, Verbosity::Normal, Verbosity::Strict];

	pub fn as_str(self) -> &'static str {
		match self {
			Verbosity::Open => "open",
			Verbosity::Normal => "normal",
			Verbosity::Strict => "strict",
		}
	}
}

impl fmt::Display for Verbosity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
#[error("unknown verbosity level '{0}' (expected open, normal or strict)")]
pub struct ParseVerbosityError(String);

impl FromStr for Verbosity {
	type Err = ParseVerbosityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Verbosity::ALL
			.into_iter()
			.find(|level| level.as_str() == s)
			.ok_or_else(|| ParseVerbosityError(s.to_string()))
	}
}

/// One URL exclusion predicate.
#[derive(Debug)]
pub enum UrlRule {
	/// Plain substring match.
	Contains(&'static str),
	Pattern(Regex),
}

impl UrlRule {
	pub fn matches(&self, url: &str) -> bool {
		match self {
			UrlRule::Contains(needle) => url.contains(needle),
			UrlRule::Pattern(re) => re.is_match(url),
		}
	}
}

/// Dependency-directory marker rejected at every level except Open.
const DEPENDENCY_MARKER: &str = "node_modules";

const NORMAL_PATTERNS: &[&str] = &[
	r"/__uno\.css",
	r"/node_modules/",
	r"\.(css|scss|less)$",
	r"\.(png|jpg|jpeg|gif|svg|ico)$",
	r"hot-update",
	r"favicon",
	r"/@vite",
	r"/@fs",
	r"\[vite\]",
	r"\[hmr\]",
	r"\?v=\w+$",
	r"\?t=\d+$",
	r"\?vue&type=style",
	r"\.vite/deps/",
];

const STRICT_PATTERNS: &[&str] = &[
	r"/__uno\.css",
	r"/node_modules/",
	r"\.(css|scss|less|js|ts|vue|png|jpg|jpeg|gif|svg|ico)$",
	r"hot-update",
	r"favicon",
	r"assets/",
	r"styles/",
	r"fonts/",
	r"/@vite",
	r"/@fs",
	r"\[vite\]",
	r"\[hmr\]",
	r"\?v=\w+$",
	r"\?t=\d+$",
	r"\?vue&type=style",
	r"\.vite/deps/",
];

const NORMAL_KEYWORDS: &[&str] = &[
	"error",
	"warn",
	"info",
	"websocket",
	"订阅",
	"成功",
	"失败",
	"api",
	"异常",
	"超时",
	"权限",
];

const STRICT_KEYWORDS: &[&str] = &["error", "fail", "exception", "timeout", "失败", "异常", "超时", "权限拒绝"];

/// Console severities that always pass at the Normal level. `warning` is the
/// spelling `Console.messageAdded` uses for `warn`.
const PASSTHROUGH_SEVERITIES: &[&str] = &["info", "warn", "warning", "error"];

fn build_rules(patterns: &[&str]) -> Vec<UrlRule> {
	std::iter::once(UrlRule::Contains(DEPENDENCY_MARKER))
		.chain(
			patterns
				.iter()
				.map(|p| UrlRule::Pattern(Regex::new(p).expect("static url rule"))),
		)
		.collect()
}

static NORMAL_RULES: LazyLock<Vec<UrlRule>> = LazyLock::new(|| build_rules(NORMAL_PATTERNS));
static STRICT_RULES: LazyLock<Vec<UrlRule>> = LazyLock::new(|| build_rules(STRICT_PATTERNS));

/// Per-level filtering rules, built once.
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
	level: Verbosity,
	url_rules: &'static [UrlRule],
	keywords: &'static [&'static str],
	severity_passthrough: bool,
}

impl Default for FilterConfig {
	fn default() -> Self {
		Self::new(Verbosity::default())
	}
}

impl FilterConfig {
	pub fn new(level: Verbosity) -> Self {
		match level {
			Verbosity::Open => Self {
				level,
				url_rules: &[],
				keywords: &[],
				severity_passthrough: true,
			},
			Verbosity::Normal => Self {
				level,
				url_rules: NORMAL_RULES.as_slice(),
				keywords: NORMAL_KEYWORDS,
				severity_passthrough: true,
			},
			Verbosity::Strict => Self {
				level,
				url_rules: STRICT_RULES.as_slice(),
				keywords: STRICT_KEYWORDS,
				severity_passthrough: false,
			},
		}
	}

	pub fn level(&self) -> Verbosity {
		self.level
	}

	/// Whether `url` is noise at this level. Open never filters.
	pub fn should_filter_url(&self, url: &str) -> bool {
		self.url_rules.iter().any(|rule| rule.matches(url))
	}

	/// Whether a console line with severity `tag` is worth surfacing.
	///
	/// Keywords match as case-insensitive substrings of `text`.
	pub fn is_important(&self, text: &str, tag: &str) -> bool {
		if self.level == Verbosity::Open {
			return true;
		}
		if self.severity_passthrough {
			let tag = tag.to_lowercase();
			if PASSTHROUGH_SEVERITIES.contains(&tag.as_str()) {
				return true;
			}
		}
		let text = text.to_lowercase();
		self.keywords.iter().any(|keyword| text.contains(keyword))
	}

	/// Whether a parsed JSON response body is worth surfacing.
	///
	/// Strict only shows failures (`code` other than 200, `success: false`, or a
	/// truthy `error`); Normal shows anything carrying `code`, `msg` or `error`.
	pub fn is_important_response(&self, body: &Value) -> bool {
		match self.level {
			Verbosity::Open => true,
			Verbosity::Strict => {
				let ok_code = body.get("code").and_then(Value::as_f64) == Some(200.0);
				!ok_code || body.get("success") == Some(&Value::Bool(false)) || is_truthy(body.get("error"))
			}
			Verbosity::Normal => body.get("code").is_some() || body.get("msg").is_some() || is_truthy(body.get("error")),
		}
	}
}

/// JavaScript truthiness of an optional JSON value.
fn is_truthy(value: Option<&Value>) -> bool {
	match value {
		None | Some(Value::Null) => false,
		Some(Value::Bool(b)) => *b,
		Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
		Some(Value::String(s)) => !s.is_empty(),
		Some(Value::Array(_)) | Some(Value::Object(_)) => true,
	}
}
