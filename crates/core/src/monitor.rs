//! Event classification.
//!
//! The [`Monitor`] turns console and network events into [`Report`]s, applying
//! the session's [`FilterConfig`] and tracking request start times so
//! responses can carry a duration. It performs no I/O: when a response body is
//! worth fetching it says so in the returned [`Observation`] and the session
//! issues the request.

use std::collections::BTreeMap;

use base64::Engine;
use pagewatch_protocol::{
	CONSOLE_API_CALLED, CONSOLE_MESSAGE_ADDED, ConsoleApiCalled, ConsoleMessageAdded, Event, LOADING_FAILED,
	LoadingFailed, REQUEST_WILL_BE_SENT, RESPONSE_RECEIVED, RequestWillBeSent, ResponseBody, ResponseReceived,
};
use pagewatch_runtime::RequestTimings;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::filter::{FilterConfig, Verbosity, redact};
use crate::report::Report;

/// Path markers identifying API traffic worth reporting even on success.
const API_MARKERS: &[&str] = &["/api/", "/dev-api/"];

const JSON_MIME: &str = "application/json";

/// What the monitor made of one event.
#[derive(Debug, Default, PartialEq)]
pub struct Observation {
	pub reports: Vec<Report>,
	/// Network request id whose body should be fetched and passed to [`Monitor::on_body`].
	pub fetch_body: Option<String>,
}

impl Observation {
	fn report(report: Report) -> Self {
		Self {
			reports: vec![report],
			fetch_body: None,
		}
	}
}

#[derive(Debug)]
pub struct Monitor {
	filter: FilterConfig,
	timings: RequestTimings,
}

impl Monitor {
	pub fn new(filter: FilterConfig, timings: RequestTimings) -> Self {
		Self { filter, timings }
	}

	pub fn filter(&self) -> &FilterConfig {
		&self.filter
	}

	pub fn timings(&self) -> &RequestTimings {
		&self.timings
	}

	/// Classifies one event observed at `now`.
	pub fn on_event(&mut self, event: &Event, now: Instant) -> Observation {
		match event.method.as_str() {
			CONSOLE_MESSAGE_ADDED => parse::<ConsoleMessageAdded>(event)
				.map(|p| self.console(p.message.level, p.message.text))
				.unwrap_or_default(),
			CONSOLE_API_CALLED => parse::<ConsoleApiCalled>(event)
				.map(|p| {
					let text = p.text();
					self.console(p.kind, text)
				})
				.unwrap_or_default(),
			REQUEST_WILL_BE_SENT => parse::<RequestWillBeSent>(event)
				.map(|p| self.request(p, now))
				.unwrap_or_default(),
			RESPONSE_RECEIVED => parse::<ResponseReceived>(event)
				.map(|p| self.response(p, now))
				.unwrap_or_default(),
			LOADING_FAILED => parse::<LoadingFailed>(event)
				.map(|p| {
					Observation::report(Report::LoadingFailed {
						request_id: p.request_id,
						error_text: p.error_text,
					})
				})
				.unwrap_or_default(),
			_ => Observation::default(),
		}
	}

	/// Classifies the result of a `Network.getResponseBody` request.
	///
	/// Bodies that are not JSON are ignored.
	pub fn on_body(&self, result: Value) -> Option<Report> {
		let body: ResponseBody = serde_json::from_value(result).ok()?;
		let text = if body.base64_encoded {
			let bytes = base64::prelude::BASE64_STANDARD.decode(body.body.as_bytes()).ok()?;
			String::from_utf8(bytes).ok()?
		} else {
			body.body
		};
		let parsed: Value = serde_json::from_str(&text).ok()?;
		self.filter.is_important_response(&parsed).then(|| Report::ResponseBody {
			body: redact(&parsed),
		})
	}

	/// Evicts timing entries past the horizon, one warning per eviction.
	pub fn sweep(&mut self, now: Instant) -> Vec<Report> {
		self.timings
			.sweep(now)
			.into_iter()
			.map(|request_id| Report::RequestTimedOut { request_id })
			.collect()
	}

	pub fn clear_timings(&mut self) {
		self.timings.clear();
	}

	fn console(&self, tag: String, text: String) -> Observation {
		if !self.filter.is_important(&text, &tag) {
			return Observation::default();
		}
		Observation::report(Report::Console { tag, text })
	}

	fn request(&mut self, params: RequestWillBeSent, now: Instant) -> Observation {
		let request = params.request;
		if self.filter.should_filter_url(&request.url) {
			return Observation::default();
		}
		self.timings.start(&params.request_id, now);

		// Request lines are only shown when nothing is filtered.
		if self.filter.level() != Verbosity::Open {
			return Observation::default();
		}
		let params = request_params(&request.url, request.post_data.as_deref());
		Observation::report(Report::Request {
			method: request.method,
			url: request.url,
			params,
		})
	}

	fn response(&mut self, params: ResponseReceived, now: Instant) -> Observation {
		let response = params.response;
		if self.filter.should_filter_url(&response.url) {
			return Observation::default();
		}
		let duration = self.timings.finish(&params.request_id, now);

		let is_api = API_MARKERS.iter().any(|marker| response.url.contains(marker));
		if !is_api && response.status == 200 {
			return Observation::default();
		}

		let fetch_body = (response.mime_type == JSON_MIME).then_some(params.request_id);
		Observation {
			reports: vec![Report::Response {
				status: response.status,
				status_text: response.status_text,
				url: response.url,
				duration,
			}],
			fetch_body,
		}
	}
}

fn parse<T: DeserializeOwned>(event: &Event) -> Option<T> {
	match serde_json::from_value(event.params.clone()) {
		Ok(params) => Some(params),
		Err(e) => {
			tracing::debug!(target = "pagewatch.monitor", method = %event.method, error = %e, "unexpected event params");
			None
		}
	}
}

/// Query-string pairs merged with a JSON object or form-encoded POST body.
/// Later keys win. Returns `None` when there is nothing to show.
pub fn request_params(url: &str, post_data: Option<&str>) -> Option<Value> {
	let mut params: BTreeMap<String, Value> = BTreeMap::new();

	if let Ok(parsed) = url::Url::parse(url) {
		for (key, value) in parsed.query_pairs() {
			params.insert(key.into_owned(), Value::String(value.into_owned()));
		}
	}

	if let Some(body) = post_data.filter(|b| !b.is_empty()) {
		match serde_json::from_str::<Value>(body) {
			Ok(Value::Object(fields)) => params.extend(fields),
			Ok(_) => {}
			Err(_) => {
				for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
					params.insert(key.into_owned(), Value::String(value.into_owned()));
				}
			}
		}
	}

	(!params.is_empty()).then(|| Value::Object(params.into_iter().collect::<Map<String, Value>>()))
}
