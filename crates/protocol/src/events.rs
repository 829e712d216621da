//! Typed params for the events the monitor consumes.
//!
//! Only the fields the monitor reads are modelled; everything else on the wire
//! is ignored during deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONSOLE_MESSAGE_ADDED: &str = "Console.messageAdded";
pub const CONSOLE_API_CALLED: &str = "Runtime.consoleAPICalled";
pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
pub const LOADING_FAILED: &str = "Network.loadingFailed";

/// `Console.messageAdded` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessageAdded {
	pub message: ConsoleMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
	#[serde(default)]
	pub text: String,
	/// Severity (`log`, `info`, `warning`, `error`, `debug`).
	#[serde(default)]
	pub level: String,
}

/// `Runtime.consoleAPICalled` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleApiCalled {
	/// Call type (`log`, `info`, `warn`, `error`, ...).
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub args: Vec<RemoteObject>,
}

impl ConsoleApiCalled {
	/// Renders the call arguments as one space-separated line.
	///
	/// Primitive arguments render their value; objects fall back to the
	/// description the target supplies.
	pub fn text(&self) -> String {
		self.args.iter().map(RemoteObject::render).collect::<Vec<_>>().join(" ")
	}
}

/// Mirror of a JavaScript value held by the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
	#[serde(default, rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl RemoteObject {
	pub fn render(&self) -> String {
		match (&self.value, &self.description) {
			(Some(Value::String(s)), _) => s.clone(),
			(Some(value), _) => value.to_string(),
			(None, Some(description)) => description.clone(),
			(None, None) => String::new(),
		}
	}
}

/// `Network.requestWillBeSent` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
	pub request_id: String,
	pub request: NetworkRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
	pub url: String,
	#[serde(default)]
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub post_data: Option<String>,
}

/// `Network.responseReceived` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
	pub request_id: String,
	pub response: NetworkResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponse {
	pub url: String,
	pub status: u16,
	#[serde(default)]
	pub status_text: String,
	#[serde(default)]
	pub mime_type: String,
}

/// `Network.loadingFailed` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
	pub request_id: String,
	#[serde(default)]
	pub error_text: String,
}

/// Result of `Network.getResponseBody`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
	pub body: String,
	#[serde(default)]
	pub base64_encoded: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn console_api_text_joins_arguments() {
		let params: ConsoleApiCalled = serde_json::from_value(serde_json::json!({
			"type": "log",
			"args": [
				{"type": "string", "value": "loaded"},
				{"type": "number", "value": 3},
				{"type": "object", "description": "Object"}
			]
		}))
		.unwrap();
		assert_eq!(params.kind, "log");
		assert_eq!(params.text(), "loaded 3 Object");
	}

	#[test]
	fn response_received_parses_status() {
		let params: ResponseReceived = serde_json::from_value(serde_json::json!({
			"requestId": "42.1",
			"type": "XHR",
			"response": {
				"url": "https://example.com/api/user",
				"status": 404,
				"statusText": "Not Found",
				"mimeType": "application/json",
				"headers": {}
			}
		}))
		.unwrap();
		assert_eq!(params.request_id, "42.1");
		assert_eq!(params.response.status, 404);
		assert_eq!(params.response.mime_type, "application/json");
	}
}
