//! Resolved run configuration.

use pagewatch::{Invocation, SessionConfig, Verbosity};

use crate::cli::Cli;

/// Everything the binary needs to start a session.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
	pub host: String,
	pub port: u16,
	pub probe: bool,
	pub target_id: String,
	pub level: Verbosity,
	/// `None` monitors until interrupted.
	pub invocation: Option<Invocation>,
}

impl MonitorConfig {
	/// Builds a config from parsed arguments. Returns `None` when no target id
	/// was given (the listing mode).
	pub fn from_cli(cli: &Cli) -> Option<Self> {
		let target_id = cli.target_id.clone()?;
		let (level, invocation) = split_rest(&cli.rest);
		Some(Self {
			host: cli.host.clone(),
			port: cli.port,
			probe: cli.probe,
			target_id,
			level,
			invocation,
		})
	}

	pub fn session_config(&self) -> SessionConfig {
		let mut config = SessionConfig::new(self.target_id.clone());
		config.level = self.level;
		config.invocation = self.invocation.clone();
		config
	}
}

/// Splits the trailing words into a level and a command invocation.
///
/// A first word naming a level is consumed as the level; whatever follows is
/// the command and its arguments.
pub fn split_rest(rest: &[String]) -> (Verbosity, Option<Invocation>) {
	let (level, words) = match rest.split_first() {
		Some((first, tail)) => match first.parse::<Verbosity>() {
			Ok(level) => (level, tail),
			Err(_) => (Verbosity::default(), rest),
		},
		None => (Verbosity::default(), rest),
	};

	let invocation = words
		.split_first()
		.map(|(name, args)| Invocation::new(name.clone(), args.to_vec()));
	(level, invocation)
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	fn words(raw: &[&str]) -> Vec<String> {
		raw.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn empty_rest_monitors_at_normal() {
		assert_eq!(split_rest(&[]), (Verbosity::Normal, None));
	}

	#[test]
	fn level_only() {
		assert_eq!(split_rest(&words(&["open"])), (Verbosity::Open, None));
	}

	#[test]
	fn command_without_level_defaults_to_normal() {
		let (level, invocation) = split_rest(&words(&["click-at", "10", "20"]));
		assert_eq!(level, Verbosity::Normal);
		assert_eq!(invocation, Some(Invocation::new("click-at", words(&["10", "20"]))));
	}

	#[test]
	fn level_then_command() {
		let (level, invocation) = split_rest(&words(&["strict", "reload"]));
		assert_eq!(level, Verbosity::Strict);
		assert_eq!(invocation, Some(Invocation::new("reload", Vec::new())));
	}

	#[test]
	fn only_the_first_word_can_be_a_level() {
		let (level, invocation) = split_rest(&words(&["storage", "get", "strict"]));
		assert_eq!(level, Verbosity::Normal);
		assert_eq!(invocation.unwrap().args, words(&["get", "strict"]));
	}

	#[test]
	fn level_names_are_case_sensitive() {
		let (level, invocation) = split_rest(&words(&["STRICT"]));
		assert_eq!(level, Verbosity::Normal);
		assert_eq!(invocation.unwrap().name, "STRICT");
	}

	#[test]
	fn session_config_carries_level_and_command() {
		let cli = Cli::try_parse_from(["pagewatch", "T1", "open", "wait", "250"]).unwrap();
		let config = MonitorConfig::from_cli(&cli).unwrap();
		let session = config.session_config();
		assert_eq!(session.target_id, "T1");
		assert_eq!(session.level, Verbosity::Open);
		assert_eq!(session.invocation.unwrap().name, "wait");
	}

	#[test]
	fn no_target_id_means_listing() {
		let cli = Cli::try_parse_from(["pagewatch"]).unwrap();
		assert!(MonitorConfig::from_cli(&cli).is_none());
	}
}
