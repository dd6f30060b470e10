use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::address::ActorId;
use crate::address::Address;
use crate::call::Call;
use crate::call::Response;
use crate::error::CallError;
use crate::link::ExitNotice;
use crate::value::Value;

/// Control traffic. Always dequeued before ordinary messages.
#[derive(Debug)]
pub(crate) enum SystemMessage {
	Terminate,
	Exit(ExitNotice),
	Link(Address),
	Unlink(ActorId),
}

#[derive(Debug)]
pub(crate) enum Message {
	Call(Call),
	Response(Response),
	Signal { name: String, value: Value },
	System(SystemMessage),
}

impl Message {
	fn is_system(&self) -> bool {
		matches!(self, Message::System(_))
	}

	/// Disposes of a message that can no longer be delivered.
	pub(crate) fn reject(self) {
		if let Message::Call(call) = self {
			call.reject(CallError::DeadActor);
		}
	}
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiveError {
	#[error("Receive timed out")]
	Timeout,
	#[error("Mailbox is dead")]
	Dead,
}

#[derive(Default)]
struct Queues {
	system: VecDeque<Message>,
	normal: VecDeque<Message>,
	dead: bool,
}

impl Queues {
	fn pop(&mut self) -> Option<Message> {
		self.system.pop_front().or_else(|| self.normal.pop_front())
	}
}

/// Inbox of one actor: many senders, one receiver.
#[derive(Default)]
pub(crate) struct Mailbox {
	queues: Mutex<Queues>,
	ready: Notify,
	enqueued: AtomicU64,
}

impl Mailbox {
	pub fn new() -> Self {
		Self::default()
	}

	/// Enqueues without blocking. On a dead mailbox the message is rejected
	/// right away (sync callers get `DeadActor`) and `Err` is returned.
	pub fn send(&self, message: Message) -> Result<(), CallError> {
		{
			let mut queues = self.queues.lock();
			if !queues.dead {
				if message.is_system() {
					queues.system.push_back(message);
				} else {
					queues.normal.push_back(message);
				}
				self.enqueued.fetch_add(1, Ordering::Relaxed);
				drop(queues);
				self.ready.notify_one();
				return Ok(());
			}
		}

		// answered outside the lock: the reply may target this very mailbox
		message.reject();
		Err(CallError::DeadActor)
	}

	pub fn try_receive(&self) -> Result<Option<Message>, ReceiveError> {
		let mut queues = self.queues.lock();
		match queues.pop() {
			Some(message) => Ok(Some(message)),
			None if queues.dead => Err(ReceiveError::Dead),
			None => Ok(None),
		}
	}

	/// Waits for the next message, system messages first.
	pub async fn receive(&self, timeout: Option<Duration>) -> Result<Message, ReceiveError> {
		match timeout {
			Some(timeout) => tokio::time::timeout(timeout, self.next())
				.await
				.unwrap_or(Err(ReceiveError::Timeout)),
			None => self.next().await,
		}
	}

	async fn next(&self) -> Result<Message, ReceiveError> {
		loop {
			let mut notified = pin!(self.ready.notified());
			notified.as_mut().enable();

			if let Some(message) = self.try_receive()? {
				return Ok(message);
			}

			notified.await;
		}
	}

	/// Marks the mailbox dead and hands back whatever was still queued.
	pub fn shutdown(&self) -> Vec<Message> {
		let leftovers = {
			let mut queues = self.queues.lock();
			queues.dead = true;
			let mut leftovers: Vec<Message> = queues.system.drain(..).collect();
			leftovers.extend(queues.normal.drain(..));
			leftovers
		};
		self.ready.notify_waiters();
		self.ready.notify_one();
		leftovers
	}

	pub fn is_dead(&self) -> bool {
		self.queues.lock().dead
	}

	pub fn len(&self) -> usize {
		let queues = self.queues.lock();
		queues.system.len() + queues.normal.len()
	}

	/// Total number of messages ever accepted.
	pub fn enqueued(&self) -> u64 {
		self.enqueued.load(Ordering::Relaxed)
	}
}
