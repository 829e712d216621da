use std::io::Write;
use std::process;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use pagewatch::{Command, ExitStatus, Report, Reporter, Session, WebSocketConnector};
use pagewatch_cli::cli::Cli;
use pagewatch_cli::config::MonitorConfig;
use pagewatch_cli::discovery::{self, DebugEndpoint};
use pagewatch_cli::error::{AppError, Result};
use pagewatch_cli::logging;
use pagewatch_cli::output::{self, ConsoleReporter};

fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);
	install_panic_hook();

	let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			report_error(&AppError::Io(e));
			process::exit(ExitStatus::Failure.code());
		}
	};

	let status = match runtime.block_on(run(cli)) {
		Ok(status) => status,
		Err(err) => {
			report_error(&err);
			ExitStatus::Failure
		}
	};
	process::exit(status.code());
}

async fn run(cli: Cli) -> Result<ExitStatus> {
	let Some(config) = MonitorConfig::from_cli(&cli) else {
		list_targets(&cli).await?;
		return Ok(ExitStatus::Success);
	};

	// Reject bad arguments before touching the network.
	if let Some(Err(e)) = config.invocation.as_ref().map(Command::parse) {
		let invocation = config.invocation.as_ref().map(|i| i.name.clone()).unwrap_or_default();
		ConsoleReporter::stdout().report(Report::CommandFailed {
			command: invocation,
			message: e.to_string(),
		})?;
		return Ok(ExitStatus::Failure);
	}

	// Without --probe an unreachable endpoint is left to the session, which
	// counts each failed lookup as a reconnect attempt.
	let endpoint = if config.probe {
		discovery::locate(&config.host, config.port, true).await?
	} else {
		DebugEndpoint::new(&config.host, config.port)?
	};
	tracing::info!(target = "pagewatch.cli", port = endpoint.port(), target_id = %config.target_id, level = %config.level, "starting session");

	let session = Session::new(
		config.session_config(),
		Arc::new(endpoint),
		Arc::new(WebSocketConnector),
		Box::new(ConsoleReporter::stdout()),
	);

	let interrupt = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::warn!(target = "pagewatch.cli", error = %e, "cannot listen for Ctrl-C");
			std::future::pending::<()>().await;
		}
	};
	Ok(session.run(interrupt).await)
}

async fn list_targets(cli: &Cli) -> Result<()> {
	let endpoint = DebugEndpoint::new(&cli.host, cli.port)?;
	let endpoint = match endpoint.list_targets().await {
		Ok(targets) => return print_listing(&targets),
		Err(_) if cli.probe => discovery::locate(&cli.host, cli.port, true).await?,
		Err(e) => {
			return Err(AppError::EndpointUnreachable {
				host: cli.host.clone(),
				port: cli.port,
				reason: e.to_string(),
			});
		}
	};
	let targets = endpoint.list_targets().await?;
	print_listing(&targets)
}

fn print_listing(targets: &[pagewatch_protocol::TargetInfo]) -> Result<()> {
	let mut stdout = std::io::stdout().lock();
	output::write_targets(&mut stdout, targets)?;
	writeln!(stdout)?;
	write!(stdout, "{}", Cli::command().render_usage())?;
	writeln!(stdout)?;
	stdout.flush()?;
	Ok(())
}

fn report_error(err: &AppError) {
	eprintln!("{} {err}", "error:".red().bold());
	if let Some(hint) = err.hint() {
		eprintln!("  {} {hint}", "hint:".cyan());
	}
}

/// An uncaught fault leaves the session untrustworthy: report it and exit 1
/// without attempting an orderly shutdown.
fn install_panic_hook() {
	std::panic::set_hook(Box::new(|info| {
		eprintln!("{} {info}", "fatal:".red().bold());
		process::exit(ExitStatus::Failure.code());
	}));
}
