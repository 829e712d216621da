//! Protocol domains that must be enabled before a command runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A protocol domain whose events and methods are gated behind `<Domain>.enable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
	Console,
	Runtime,
	Network,
	Page,
}

impl Capability {
	/// Every capability the session enables, in enable order.
	pub const REQUIRED: [Capability; 4] = [
		Capability::Console,
		Capability::Runtime,
		Capability::Network,
		Capability::Page,
	];

	/// Protocol domain name.
	pub fn domain(self) -> &'static str {
		match self {
			Capability::Console => "Console",
			Capability::Runtime => "Runtime",
			Capability::Network => "Network",
			Capability::Page => "Page",
		}
	}

	pub fn enable_method(self) -> &'static str {
		match self {
			Capability::Console => "Console.enable",
			Capability::Runtime => "Runtime.enable",
			Capability::Network => "Network.enable",
			Capability::Page => "Page.enable",
		}
	}

	pub fn disable_method(self) -> &'static str {
		match self {
			Capability::Console => "Console.disable",
			Capability::Runtime => "Runtime.disable",
			Capability::Network => "Network.disable",
			Capability::Page => "Page.disable",
		}
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.domain())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn methods_follow_domain_name() {
		for capability in Capability::REQUIRED {
			assert_eq!(capability.enable_method(), format!("{}.enable", capability.domain()));
			assert_eq!(capability.disable_method(), format!("{}.disable", capability.domain()));
		}
	}
}
