use std::fmt;

use tokio::sync::watch::Receiver;
use tokio::sync::watch::Sender;

use crate::error::Failure;
use crate::link::ExitReason;

/// Lifecycle of an actor core.
#[derive(Debug, Clone)]
pub enum Status {
	/// Thread launched, object not constructed yet.
	Starting,
	/// Dispatch loop active.
	Running,
	/// Draining: pending callers are answered, finalizer runs.
	Terminating,
	/// Terminal. Mailbox is dead, links have been notified.
	Dead(ExitReason),
}

impl Status {
	pub fn is_dead(&self) -> bool {
		matches!(self, Status::Dead(_))
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Status::Starting => f.write_str("starting"),
			Status::Running => f.write_str("running"),
			Status::Terminating => f.write_str("terminating"),
			Status::Dead(_) => f.write_str("dead"),
		}
	}
}

/// Publishing side, owned by the actor thread.
pub(crate) struct Lifecycle {
	state: Sender<Status>,
}

impl Lifecycle {
	pub fn new() -> (Self, Receiver<Status>) {
		let (state, rx) = tokio::sync::watch::channel(Status::Starting);
		(Self { state }, rx)
	}

	pub fn set(&self, status: Status) {
		self.state.send_if_modified(|current| match current {
			// never leave the terminal state
			Status::Dead(_) => false,
			_ => {
				*current = status;
				true
			}
		});
	}

	pub fn is_dead(&self) -> bool {
		self.state.borrow().is_dead()
	}
}

impl Drop for Lifecycle {
	fn drop(&mut self) {
		if !self.is_dead() {
			self.set(Status::Dead(ExitReason::Error(Failure::new(
				"ActorLost",
				"actor thread exited without reporting its death",
			))));
		}
	}
}

/// Resolves once the watched actor is dead.
pub(crate) async fn dead(mut recv: Receiver<Status>) -> ExitReason {
	let result = recv.wait_for(|state| state.is_dead()).await;
	match result.as_deref() {
		Ok(Status::Dead(reason)) => reason.clone(),
		_ => ExitReason::Error(Failure::new("ActorLost", "actor status channel closed")),
	}
}

/// The final reason of an actor, if it is already dead.
pub(crate) fn reason(recv: &Receiver<Status>) -> Option<ExitReason> {
	match &*recv.borrow() {
		Status::Dead(reason) => Some(reason.clone()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use super::reason as reason_of;

	#[tokio::test]
	async fn dead_is_terminal() {
		let (lifecycle, rx) = Lifecycle::new();
		let waiter = tokio::spawn(dead(rx.clone()));

		lifecycle.set(Status::Running);
		lifecycle.set(Status::Dead(ExitReason::Normal));
		lifecycle.set(Status::Running);

		let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();
		assert!(!reason.is_abnormal());
		assert!(lifecycle.is_dead());
		assert!(reason_of(&rx).is_some());
	}

	#[tokio::test]
	async fn dropped_lifecycle_reports_lost_actor() {
		let (lifecycle, rx) = Lifecycle::new();
		drop(lifecycle);
		let reason = dead(rx).await;
		assert!(reason.is_abnormal());
	}
}
