//! Target discovery over the debug endpoint's HTTP listing.

use std::ops::RangeInclusive;
use std::time::Duration;

use pagewatch_protocol::TargetInfo;
use pagewatch_runtime::{BoxFut, Error, TargetResolver};
use tracing::debug;

use crate::error::{AppError, Result};

/// Ports scanned by `--probe`.
pub const PROBE_PORTS: RangeInclusive<u16> = 9222..=9230;

const REQUEST_TIMEOUT: Duration = Duration::from_millis(400);

/// HTTP client for one debug endpoint.
#[derive(Debug, Clone)]
pub struct DebugEndpoint {
	client: reqwest::Client,
	hosts: Vec<String>,
	port: u16,
}

impl DebugEndpoint {
	pub fn new(host: &str, port: u16) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(REQUEST_TIMEOUT)
			.build()
			.map_err(|e| AppError::Anyhow(anyhow::anyhow!("failed to create HTTP client: {e}")))?;
		Ok(Self {
			client,
			hosts: candidate_hosts(host),
			port,
		})
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Fetches `/json/list`, trying each loopback spelling in turn.
	pub async fn list_targets(&self) -> pagewatch_runtime::Result<Vec<TargetInfo>> {
		let mut last_error = "no response".to_string();

		for host in &self.hosts {
			let url = format!("http://{host}:{}/json/list", self.port);
			let response = match self.client.get(&url).send().await {
				Ok(r) => r,
				Err(e) => {
					debug!(target = "pagewatch.discovery", %url, error = %e, "listing request failed");
					last_error = e.to_string();
					continue;
				}
			};

			if !response.status().is_success() {
				last_error = format!("unexpected status {}", response.status());
				continue;
			}

			return response
				.json::<Vec<TargetInfo>>()
				.await
				.map_err(|e| Error::Discovery(format!("malformed target listing from {url}: {e}")));
		}

		Err(Error::Discovery(format!("port {}: {last_error}", self.port)))
	}

	/// Whether anything answers the listing on this endpoint.
	pub async fn is_reachable(&self) -> bool {
		self.list_targets().await.is_ok()
	}
}

impl TargetResolver for DebugEndpoint {
	fn resolve<'a>(&'a self, target_id: &'a str) -> BoxFut<'a, pagewatch_runtime::Result<TargetInfo>> {
		Box::pin(async move {
			let targets = self.list_targets().await?;
			TargetInfo::find(&targets, target_id)
				.cloned()
				.ok_or_else(|| Error::TargetNotFound(target_id.to_string()))
		})
	}
}

/// Picks the endpoint to use: the configured port if it answers, else (with
/// `probe`) the first port in [`PROBE_PORTS`] that does.
pub async fn locate(host: &str, port: u16, probe: bool) -> Result<DebugEndpoint> {
	let endpoint = DebugEndpoint::new(host, port)?;
	let reason = match endpoint.list_targets().await {
		Ok(_) => return Ok(endpoint),
		Err(e) => e.to_string(),
	};
	if !probe {
		return Err(AppError::EndpointUnreachable {
			host: host.to_string(),
			port,
			reason,
		});
	}

	for candidate in PROBE_PORTS.filter(|p| *p != port) {
		let endpoint = DebugEndpoint::new(host, candidate)?;
		if endpoint.is_reachable().await {
			tracing::info!(target = "pagewatch.discovery", port = candidate, "debug endpoint found by probing");
			return Ok(endpoint);
		}
	}

	Err(AppError::EndpointUnreachable {
		host: host.to_string(),
		port,
		reason: format!("{reason}; nothing answered on ports {}-{}", PROBE_PORTS.start(), PROBE_PORTS.end()),
	})
}

/// Loopback hosts are tried under every common spelling; other hosts as given.
fn candidate_hosts(host: &str) -> Vec<String> {
	const LOOPBACK: [&str; 3] = ["127.0.0.1", "localhost", "[::1]"];
	if LOOPBACK.contains(&host) {
		std::iter::once(host)
			.chain(LOOPBACK.into_iter().filter(|h| *h != host))
			.map(str::to_string)
			.collect()
	} else {
		vec![host.to_string()]
	}
}
