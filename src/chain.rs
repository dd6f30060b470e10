use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

/// Identity shared by a root synchronous call and every call nested in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(Uuid);

impl ChainId {
	/// A fresh identity for a root call.
	pub fn root() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// Chains an actor is currently blocked in.
///
/// A task suspended on a synchronous reply holds its chain until the reply
/// arrives. While anything is held, only calls belonging to a held chain
/// may start; everything else waits its turn in arrival order.
#[derive(Debug, Default)]
pub(crate) struct ChainTracker {
	held: HashMap<ChainId, usize>,
}

impl ChainTracker {
	pub fn hold(&mut self, chain: ChainId) {
		*self.held.entry(chain).or_default() += 1;
	}

	pub fn release(&mut self, chain: ChainId) {
		if let Some(count) = self.held.get_mut(&chain) {
			*count -= 1;
			if *count == 0 {
				self.held.remove(&chain);
			}
		}
	}

	pub fn is_idle(&self) -> bool {
		self.held.is_empty()
	}

	pub fn holds(&self, chain: &ChainId) -> bool {
		self.held.contains_key(chain)
	}

	/// Whether a call on `chain` may start now. `queued` tells whether
	/// older calls are still waiting, which a foreign call must not overtake.
	pub fn admits(&self, chain: &ChainId, queued: bool) -> bool {
		if self.holds(chain) {
			return true;
		}
		self.is_idle() && !queued
	}

	pub fn clear(&mut self) {
		self.held.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idle_tracker_admits_in_order() {
		let tracker = ChainTracker::default();
		let chain = ChainId::root();
		assert!(tracker.admits(&chain, false));
		assert!(!tracker.admits(&chain, true));
	}

	#[test]
	fn held_chain_is_reentrant_only_for_itself() {
		let mut tracker = ChainTracker::default();
		let outer = ChainId::root();
		let other = ChainId::root();

		tracker.hold(outer);
		assert!(tracker.admits(&outer, true));
		assert!(!tracker.admits(&other, false));

		tracker.hold(outer);
		tracker.release(outer);
		assert!(tracker.holds(&outer));
		tracker.release(outer);
		assert!(tracker.is_idle());
		assert!(tracker.admits(&other, false));
	}

	#[test]
	fn root_ids_are_unique() {
		assert_ne!(ChainId::root(), ChainId::root());
	}
}
