//! Command execution against one open connection.
//!
//! Every connection first passes the capability barrier
//! ([`enable_capabilities`]): one enable request per [`Capability`], drawn
//! from the reserved id block, with completion counted by acknowledgement
//! rather than arrival order. Only then does [`Executor::run`] send the
//! command's own requests.
//!
//! # Completion
//!
//! - **One-shot** commands race their correlated response(s) against a budget
//!   (30s, 10s for screenshots). Losing the race drops the response futures,
//!   which removes their pending registrations, so a late reply is discarded
//!   as an unknown id.
//! - **Fixed wait** sleeps and touches nothing on the wire.
//! - **Condition poll** ([`Command::WaitForElement`]) owns its interval, its
//!   deadline and its in-flight evaluations in one future. Whichever side wins,
//!   dropping that future cancels all three.

#[cfg(test)]
mod tests;

use std::time::Duration;

use base64::Engine;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use pagewatch_protocol::{Capability, Cookie};
use pagewatch_runtime::{Connection, PendingResponse, RequestPurpose};
use serde_json::{Value, json};
use tokio::time::{Instant, MissedTickBehavior};

use crate::command::{Command, CookieAction, ScrollTarget, StorageAction};
use crate::error::{CommandError, Result};
use crate::report::CommandOutput;

/// Budgets and pacing for command execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
	pub one_shot_timeout: Duration,
	pub screenshot_timeout: Duration,
	/// Interval between condition evaluations.
	pub poll_interval: Duration,
	/// Delay between mouse press and release for `click-at`.
	pub click_gap: Duration,
}

impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			one_shot_timeout: Duration::from_secs(30),
			screenshot_timeout: Duration::from_secs(10),
			poll_interval: Duration::from_millis(100),
			click_gap: Duration::from_millis(100),
		}
	}
}

/// Sends one enable request per required capability and waits until each is
/// acknowledged, in any order.
///
/// An enable answered with an error still counts toward the barrier but the
/// capability is not recorded as enabled. Returns the enabled capabilities.
pub async fn enable_capabilities(connection: &Connection) -> Result<Vec<Capability>> {
	let mut acks = FuturesUnordered::new();
	for capability in Capability::REQUIRED {
		let response = connection.send(capability.enable_method(), None, RequestPurpose::Enable(capability))?;
		acks.push(async move { (capability, response.await) });
	}

	while let Some((capability, result)) = acks.next().await {
		match result {
			Ok(_) => {
				tracing::debug!(target = "pagewatch.executor", %capability, "capability enabled");
				connection.mark_enabled(capability);
			}
			Err(e) if e.is_transport() => return Err(e.into()),
			Err(e) => {
				tracing::warn!(target = "pagewatch.executor", %capability, error = %e, "enable rejected");
			}
		}
	}

	Ok(connection.enabled_capabilities())
}

/// Runs commands over a connection that has passed the capability barrier.
pub struct Executor<'a> {
	connection: &'a Connection,
	page_url: &'a str,
	config: &'a ExecutorConfig,
}

impl<'a> Executor<'a> {
	/// `page_url` is the target's URL, used to scope cookie operations.
	pub fn new(connection: &'a Connection, page_url: &'a str, config: &'a ExecutorConfig) -> Self {
		Self {
			connection,
			page_url,
			config,
		}
	}

	/// Runs `command` to completion.
	pub async fn run(&self, command: &Command) -> Result<CommandOutput> {
		tracing::info!(target = "pagewatch.executor", %command, kind = ?command.kind(), "running command");
		match command {
			Command::Wait { duration } => {
				tokio::time::sleep(*duration).await;
				Ok(CommandOutput::Done(format!("waited {}ms", duration.as_millis())))
			}
			Command::WaitForElement { selector, timeout } => self.wait_for_element(selector, *timeout).await,
			_ => {
				let budget = self.budget(command);
				match tokio::time::timeout(budget, self.one_shot(command)).await {
					Ok(result) => result,
					Err(_) => Err(CommandError::Timeout {
						what: format!("{command} response"),
						after: budget,
					}),
				}
			}
		}
	}

	fn budget(&self, command: &Command) -> Duration {
		match command {
			Command::Screenshot { .. } => self.config.screenshot_timeout,
			_ => self.config.one_shot_timeout,
		}
	}

	async fn one_shot(&self, command: &Command) -> Result<CommandOutput> {
		match command {
			Command::Navigate { url } => {
				let result = self.call("Page.navigate", json!({ "url": url })).await?;
				if let Some(error) = result.get("errorText").and_then(Value::as_str).filter(|e| !e.is_empty()) {
					return Err(CommandError::Protocol(format!("navigation to {url} failed: {error}")));
				}
				Ok(CommandOutput::Done(format!("navigated to {url}")))
			}
			Command::Reload => {
				self.call("Page.reload", json!({ "ignoreCache": true })).await?;
				Ok(CommandOutput::Done("page reloaded".to_string()))
			}
			Command::ClickElement { selector } => {
				let expression = format!(
					"(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
					js_string(selector)
				);
				self.expect_element(selector, expression).await?;
				Ok(CommandOutput::Done(format!("clicked {selector}")))
			}
			Command::ReadText { selector } => {
				let expression = format!(
					"(() => {{ const el = document.querySelector({}); return el ? el.textContent : null; }})()",
					js_string(selector)
				);
				match self.evaluate(expression).await? {
					Value::String(text) => Ok(CommandOutput::Text(text)),
					Value::Null => Err(CommandError::ElementNotFound {
						selector: selector.clone(),
					}),
					other => Ok(CommandOutput::Text(other.to_string())),
				}
			}
			Command::Cookie(action) => self.cookie(action).await,
			Command::Storage(action) => self.storage(action).await,
			Command::EmulateMobile => {
				self.call(
					"Emulation.setDeviceMetricsOverride",
					json!({ "width": 375, "height": 812, "deviceScaleFactor": 3, "mobile": true }),
				)
				.await?;
				Ok(CommandOutput::Done("mobile emulation enabled (375x812 @3x)".to_string()))
			}
			Command::ThrottleNetwork { kbps } => {
				let throughput = f64::from(*kbps) * 1024.0 / 8.0;
				self.call(
					"Network.emulateNetworkConditions",
					json!({
						"offline": false,
						"latency": 100,
						"downloadThroughput": throughput,
						"uploadThroughput": throughput,
					}),
				)
				.await?;
				Ok(CommandOutput::Done(format!("network throttled to {kbps}kbps")))
			}
			Command::ScrollTo(ScrollTarget::Selector(selector)) => {
				let expression = format!(
					"(() => {{ const el = document.querySelector({}); if (!el) return false; el.scrollIntoView({{ block: 'center' }}); return true; }})()",
					js_string(selector)
				);
				self.expect_element(selector, expression).await?;
				Ok(CommandOutput::Done(format!("scrolled to {selector}")))
			}
			Command::ScrollTo(ScrollTarget::Point { x, y }) => {
				self.evaluate(format!("window.scrollTo({x}, {y})")).await?;
				Ok(CommandOutput::Done(format!("scrolled to {x},{y}")))
			}
			Command::Screenshot { dir, filename } => {
				let result = self.call("Page.captureScreenshot", json!({ "format": "png" })).await?;
				let encoded = result
					.get("data")
					.and_then(Value::as_str)
					.ok_or_else(|| CommandError::Protocol("screenshot result carries no data".to_string()))?;
				let data = base64::prelude::BASE64_STANDARD
					.decode(encoded)
					.map_err(|e| CommandError::Protocol(format!("decode screenshot: {e}")))?;
				Ok(CommandOutput::Screenshot {
					dir: dir.clone(),
					filename: filename.clone(),
					data,
				})
			}
			Command::Type { selector, text } => {
				let expression = format!(
					"(() => {{ const el = document.querySelector({}); if (!el) return false; el.focus(); return true; }})()",
					js_string(selector)
				);
				self.expect_element(selector, expression).await?;
				self.call("Input.insertText", json!({ "text": text })).await?;
				Ok(CommandOutput::Done(format!("typed {} characters into {selector}", text.chars().count())))
			}
			Command::ClickAt { x, y } => self.click_at(*x, *y).await,
			Command::Wait { .. } | Command::WaitForElement { .. } => {
				Err(CommandError::Protocol(format!("{command} is not a one-shot command")))
			}
		}
	}

	async fn cookie(&self, action: &CookieAction) -> Result<CommandOutput> {
		match action {
			CookieAction::List => {
				let result = self.call("Network.getAllCookies", json!({})).await?;
				Ok(CommandOutput::Cookies(cookies_of(result)?))
			}
			CookieAction::Get { name } => {
				let result = self.call("Network.getCookies", json!({ "urls": [self.page_url] })).await?;
				let cookies = cookies_of(result)?.into_iter().filter(|c| c.name == *name).collect();
				Ok(CommandOutput::Cookies(cookies))
			}
			CookieAction::Set { name, value } => {
				let result = self
					.call(
						"Network.setCookie",
						json!({ "name": name, "value": value, "url": self.page_url }),
					)
					.await?;
				if result.get("success") == Some(&Value::Bool(false)) {
					return Err(CommandError::Protocol(format!("target rejected cookie {name}")));
				}
				Ok(CommandOutput::Done(format!("cookie {name} set")))
			}
			CookieAction::Delete { name } => {
				self.call("Network.deleteCookies", json!({ "name": name, "url": self.page_url }))
					.await?;
				Ok(CommandOutput::Done(format!("cookie {name} deleted")))
			}
		}
	}

	async fn storage(&self, action: &StorageAction) -> Result<CommandOutput> {
		match action {
			StorageAction::List => {
				let raw = self
					.evaluate("JSON.stringify(Object.entries(localStorage))".to_string())
					.await?;
				let entries = match raw {
					Value::String(s) => serde_json::from_str(&s)?,
					other => other,
				};
				Ok(CommandOutput::Storage(entries))
			}
			StorageAction::Get { key } => {
				let value = self
					.evaluate(format!("localStorage.getItem({})", js_string(key)))
					.await?;
				Ok(CommandOutput::Storage(value))
			}
			StorageAction::Set { key, value } => {
				self.evaluate(format!("localStorage.setItem({}, {})", js_string(key), js_string(value)))
					.await?;
				Ok(CommandOutput::Done(format!("storage {key} set")))
			}
		}
	}

	/// Press, wait, release. Only the release is awaited; the press is sent
	/// unregistered so its reply, whenever it lands, is dropped.
	async fn click_at(&self, x: f64, y: f64) -> Result<CommandOutput> {
		let event = |kind: &str| json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 });

		self.connection
			.notify("Input.dispatchMouseEvent", Some(event("mousePressed")))?;
		tokio::time::sleep(self.config.click_gap).await;
		self.call("Input.dispatchMouseEvent", event("mouseReleased")).await?;

		Ok(CommandOutput::Done(format!("clicked at {x},{y}")))
	}

	async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<CommandOutput> {
		let expression = format!("document.querySelector({}) !== null", js_string(selector));
		let params = json!({ "expression": expression, "returnByValue": true });

		let deadline = tokio::time::sleep(timeout);
		tokio::pin!(deadline);
		let period = self.config.poll_interval;
		let mut interval = tokio::time::interval_at(Instant::now() + period, period);
		interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
		let mut in_flight: FuturesUnordered<PendingResponse> = FuturesUnordered::new();

		loop {
			tokio::select! {
				biased;
				_ = &mut deadline => {
					return Err(CommandError::Timeout {
						what: format!("element {selector}"),
						after: timeout,
					});
				}
				Some(result) = in_flight.next() => {
					match result {
						Ok(value) => {
							if evaluation_value(value)? == Value::Bool(true) {
								return Ok(CommandOutput::Done(format!("element {selector} appeared")));
							}
						}
						Err(e) if e.is_transport() => return Err(e.into()),
						Err(e) => tracing::debug!(target = "pagewatch.executor", error = %e, "poll failed"),
					}
				}
				_ = interval.tick() => {
					in_flight.push(self.connection.send("Runtime.evaluate", Some(params.clone()), RequestPurpose::Poll)?);
				}
			}
		}
	}

	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		Ok(self
			.connection
			.call(method, Some(params), RequestPurpose::Command)
			.await?)
	}

	/// Evaluates `expression` in the page and returns its value.
	async fn evaluate(&self, expression: String) -> Result<Value> {
		let result = self
			.call(
				"Runtime.evaluate",
				json!({ "expression": expression, "returnByValue": true }),
			)
			.await?;
		evaluation_value(result)
	}

	/// Evaluates an expression that returns `false` when `selector` matches nothing.
	async fn expect_element(&self, selector: &str, expression: String) -> Result<()> {
		match self.evaluate(expression).await? {
			Value::Bool(true) => Ok(()),
			_ => Err(CommandError::ElementNotFound {
				selector: selector.to_string(),
			}),
		}
	}
}

/// Extracts the value of a `Runtime.evaluate` result, surfacing thrown exceptions.
fn evaluation_value(result: Value) -> Result<Value> {
	if let Some(details) = result.get("exceptionDetails") {
		let message = details
			.pointer("/exception/description")
			.and_then(Value::as_str)
			.or_else(|| details.get("text").and_then(Value::as_str))
			.unwrap_or("uncaught exception");
		return Err(CommandError::Evaluation(message.to_string()));
	}
	Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
}

fn cookies_of(mut result: Value) -> Result<Vec<Cookie>> {
	let cookies = result.get_mut("cookies").map(Value::take).unwrap_or(Value::Array(Vec::new()));
	Ok(serde_json::from_value(cookies)?)
}

/// JavaScript string literal for `s`.
fn js_string(s: &str) -> String {
	Value::String(s.to_string()).to_string()
}
