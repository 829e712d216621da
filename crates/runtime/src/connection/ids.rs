//! Session-wide request id allocation.
//!
//! Capability enables use a reserved block so the barrier can count its acks
//! by id; everything else draws from one monotonic counter that survives
//! reconnects, so no two requests in a session ever share an id outside the
//! reserved block.

use std::sync::atomic::{AtomicU64, Ordering};

use pagewatch_protocol::Capability;

use super::pending::RequestPurpose;

/// First id of the reserved capability block.
pub const ENABLE_BLOCK_START: u64 = 1;

/// First id handed out sequentially.
pub const FIRST_SEQUENTIAL_ID: u64 = 100;

#[derive(Debug)]
pub struct IdAllocator {
	next: AtomicU64,
}

impl Default for IdAllocator {
	fn default() -> Self {
		Self::new()
	}
}

impl IdAllocator {
	pub fn new() -> Self {
		Self {
			next: AtomicU64::new(FIRST_SEQUENTIAL_ID),
		}
	}

	/// Id for a request issued for `purpose`.
	pub fn allocate(&self, purpose: RequestPurpose) -> u64 {
		match purpose {
			RequestPurpose::Enable(capability) => Self::reserved(capability),
			_ => self.next_sequential(),
		}
	}

	/// Next id from the monotonic counter.
	pub fn next_sequential(&self) -> u64 {
		self.next.fetch_add(1, Ordering::SeqCst)
	}

	/// Reserved id acknowledging `capability`'s enable request.
	pub fn reserved(capability: Capability) -> u64 {
		let index = Capability::REQUIRED
			.iter()
			.position(|c| *c == capability)
			.unwrap_or_default() as u64;
		ENABLE_BLOCK_START + index
	}

	/// Whether `id` falls in the reserved capability block.
	pub fn is_reserved(id: u64) -> bool {
		(ENABLE_BLOCK_START..ENABLE_BLOCK_START + Capability::REQUIRED.len() as u64).contains(&id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reserved_block_is_disjoint_from_sequential_ids() {
		let ids = IdAllocator::new();
		let reserved: Vec<u64> = Capability::REQUIRED.iter().map(|c| IdAllocator::reserved(*c)).collect();
		assert_eq!(reserved, vec![1, 2, 3, 4]);

		for _ in 0..50 {
			let id = ids.allocate(RequestPurpose::Command);
			assert!(!IdAllocator::is_reserved(id));
		}
	}

	#[test]
	fn sequential_ids_are_monotonic() {
		let ids = IdAllocator::new();
		let a = ids.allocate(RequestPurpose::Command);
		let b = ids.allocate(RequestPurpose::Poll);
		let c = ids.allocate(RequestPurpose::ResponseBody);
		assert_eq!(a, FIRST_SEQUENTIAL_ID);
		assert!(a < b && b < c);
	}
}
