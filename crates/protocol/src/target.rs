//! Target records returned by the discovery listing (`/json/list`).

use serde::{Deserialize, Serialize};

/// A debuggable target as listed by the debug endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	/// Opaque target id used for selection.
	pub id: String,
	#[serde(default)]
	pub title: String,
	/// Target kind (`page`, `iframe`, `service_worker`, ...).
	#[serde(default, rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub url: String,
	/// Transport endpoint. Absent when another client is already attached.
	#[serde(default, rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
	/// Selects a target by exact id match.
	pub fn find<'a>(targets: &'a [TargetInfo], id: &str) -> Option<&'a TargetInfo> {
		targets.iter().find(|target| target.id == id)
	}
}
