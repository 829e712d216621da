//! Network request timing.
//!
//! Maps a target-assigned network request id to the instant its request was
//! seen, so the matching response can report a duration. Entries the target
//! never completes are evicted by a periodic sweep once they pass the horizon.
//! Absence of an entry only means "not tracked".

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Request start times keyed by the target's request id.
#[derive(Debug)]
pub struct RequestTimings {
	starts: HashMap<String, Instant>,
	horizon: Duration,
}

impl Default for RequestTimings {
	fn default() -> Self {
		Self::new(Duration::from_secs(60))
	}
}

impl RequestTimings {
	pub fn new(horizon: Duration) -> Self {
		Self {
			starts: HashMap::new(),
			horizon,
		}
	}

	pub fn start(&mut self, request_id: &str, at: Instant) {
		self.starts.insert(request_id.to_string(), at);
	}

	/// Removes the entry and returns the elapsed time, if it was tracked.
	pub fn finish(&mut self, request_id: &str, at: Instant) -> Option<Duration> {
		self.starts
			.remove(request_id)
			.map(|started| at.saturating_duration_since(started))
	}

	/// Evicts entries older than the horizon and returns their ids.
	pub fn sweep(&mut self, now: Instant) -> Vec<String> {
		let horizon = self.horizon;
		let mut expired: Vec<String> = self
			.starts
			.iter()
			.filter(|(_, started)| now.saturating_duration_since(**started) > horizon)
			.map(|(id, _)| id.clone())
			.collect();
		for id in &expired {
			self.starts.remove(id);
		}
		expired.sort();
		expired
	}

	pub fn clear(&mut self) {
		self.starts.clear();
	}

	pub fn len(&self) -> usize {
		self.starts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.starts.is_empty()
	}
}

/// Cancellable periodic tick driving [`RequestTimings::sweep`].
pub struct SweepSchedule {
	interval: Option<Interval>,
}

impl SweepSchedule {
	/// A schedule that never ticks until replaced by [`SweepSchedule::start`].
	pub fn idle() -> Self {
		Self { interval: None }
	}

	/// Starts ticking every `period`; the first tick is one period from now.
	pub fn start(period: Duration) -> Self {
		let mut interval = tokio::time::interval_at(Instant::now() + period, period);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		Self {
			interval: Some(interval),
		}
	}

	/// Resolves on the next tick; never resolves once cancelled.
	pub async fn tick(&mut self) -> Instant {
		match self.interval.as_mut() {
			Some(interval) => interval.tick().await,
			None => std::future::pending().await,
		}
	}

	pub fn cancel(&mut self) {
		self.interval = None;
	}

	pub fn is_active(&self) -> bool {
		self.interval.is_some()
	}
}
