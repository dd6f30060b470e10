use std::collections::HashMap;
use std::fmt;

use crate::address::ActorId;
use crate::address::Address;
use crate::error::Failure;

/// Why an actor reached `Dead`.
#[derive(Debug, Clone)]
pub enum ExitReason {
	Normal,
	Error(Failure),
}

impl ExitReason {
	pub fn is_abnormal(&self) -> bool {
		matches!(self, ExitReason::Error(_))
	}

	pub fn failure(&self) -> Option<&Failure> {
		match self {
			ExitReason::Normal => None,
			ExitReason::Error(failure) => Some(failure),
		}
	}
}

impl fmt::Display for ExitReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExitReason::Normal => f.write_str("normal"),
			ExitReason::Error(failure) => write!(f, "error ({failure})"),
		}
	}
}

/// Delivered to every linked actor when an actor dies.
#[derive(Debug, Clone)]
pub struct ExitNotice {
	pub from: ActorId,
	pub reason: ExitReason,
}

impl ExitNotice {
	/// The reason a non-trapping actor dies with after receiving this
	/// abnormal notice.
	pub(crate) fn propagated(&self) -> ExitReason {
		match &self.reason {
			ExitReason::Normal => ExitReason::Normal,
			ExitReason::Error(failure) => ExitReason::Error(Failure::new(
				"LinkedExit",
				format!("linked {} exited: {failure}", self.from),
			)),
		}
	}
}

/// Actors to notify on death. Each side of a link keeps an entry.
#[derive(Default)]
pub(crate) struct LinkSet {
	links: HashMap<ActorId, Address>,
}

impl LinkSet {
	/// Returns `false` when the link already existed.
	pub fn insert(&mut self, address: Address) -> bool {
		self.links.insert(address.id(), address).is_none()
	}

	pub fn remove(&mut self, id: ActorId) -> Option<Address> {
		self.links.remove(&id)
	}

	pub fn contains(&self, id: ActorId) -> bool {
		self.links.contains_key(&id)
	}

	pub fn drain(&mut self) -> impl Iterator<Item = Address> + '_ {
		self.links.drain().map(|(_, address)| address)
	}
}
