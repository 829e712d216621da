//! Request, response and event frames.
//!
//! Outbound frames are always `{id, method, params?}`. Inbound frames are either
//! a response correlated by `id` (carrying `result` or `error`) or an event with
//! a `method` and no `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Correlation id, unique among outstanding requests.
	pub id: u64,
	/// Fully-qualified method, e.g. `Page.navigate`.
	pub method: String,
	/// Method parameters; omitted on the wire when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

impl Request {
	pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
		Self {
			id,
			method: method.into(),
			params,
		}
	}
}

/// Error payload carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
	#[serde(default)]
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Inbound response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Request id this response correlates to.
	pub id: u64,
	/// Success result (mutually exclusive with error).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Failure payload (mutually exclusive with result).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<RemoteError>,
}

/// Inbound unsolicited event frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Discriminated union of inbound frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
	/// Response message (has `id` field)
	Response(Response),
	/// Event message (has `method`, no `id`)
	Event(Event),
	/// Anything else; kept for forward compatibility
	Unknown(Value),
}
