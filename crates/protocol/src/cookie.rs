//! Cookie records as returned by `Network.getCookies` / `Network.getAllCookies`.

use serde::{Deserialize, Serialize};

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// A browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,

	pub value: String,

	#[serde(default)]
	pub domain: String,

	#[serde(default)]
	pub path: String,

	/// Unix timestamp in seconds (-1 means session cookie)
	#[serde(default)]
	pub expires: f64,

	#[serde(default)]
	pub http_only: bool,

	#[serde(default)]
	pub secure: bool,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}
