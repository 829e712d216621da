use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the stderr subscriber. `RUST_LOG`, when set, wins over `verbosity`.
pub fn init_logging(verbosity: u8) {
	// 0 = errors only; page output goes to stdout regardless
	// 1 (-v) = session lifecycle, quiet transport
	// 2+ (-vv) = everything, including frame-level routing
	let filter = match verbosity {
		0 => "error",
		1 => "info,pagewatch_runtime=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
