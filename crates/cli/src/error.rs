use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
	/// Nothing answered on the configured (or any probed) port.
	#[error("no debug endpoint answering at {host}:{port}: {reason}")]
	EndpointUnreachable { host: String, port: u16, reason: String },

	#[error(transparent)]
	Runtime(#[from] pagewatch_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl AppError {
	/// Hint printed under the diagnostic, when there is one worth giving.
	pub fn hint(&self) -> Option<String> {
		match self {
			AppError::EndpointUnreachable { port, .. } => Some(format!(
				"start the browser with --remote-debugging-port={port}, or pass --probe to scan nearby ports"
			)),
			_ => None,
		}
	}
}
