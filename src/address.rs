use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch::Receiver;

use crate::call;
use crate::call::BlockRef;
use crate::call::Call;
use crate::call::CallId;
use crate::call::Delivery;
use crate::call::ReplyTo;
use crate::chain::ChainId;
use crate::error::CallError;
use crate::error::Failure;
use crate::lifecycle;
use crate::lifecycle::Status;
use crate::link::ExitNotice;
use crate::link::ExitReason;
use crate::mailbox::Mailbox;
use crate::mailbox::Message;
use crate::mailbox::SystemMessage;
use crate::value::Args;
use crate::value::Value;

static NEXT_ACTOR: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(u64);

impl ActorId {
	fn next() -> Self {
		Self(NEXT_ACTOR.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "actor#{}", self.0)
	}
}

pub(crate) type ExternalBlock<'a> = &'a (dyn Fn(Args) -> Result<Value, Failure> + Send + Sync);

struct AddressState {
	id: ActorId,
	name: Option<Arc<str>>,
	mailbox: Arc<Mailbox>,
	status: Receiver<Status>,
	/// Settled before the mailbox is shut down, so whoever finds the
	/// mailbox dead can also learn why.
	exit: OnceLock<ExitReason>,
}

/// Untyped handle to an actor: identity, mailbox and lifecycle.
///
/// Calls made through an `Address` are not checked against the method
/// table before they are queued; use [`crate::Proxy`] for that.
#[derive(Clone)]
pub struct Address {
	state: Arc<AddressState>,
}

impl Debug for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Address")
			.field("id", &self.state.id)
			.field("name", &self.state.name)
			.field("status", &*self.state.status.borrow())
			.finish()
	}
}

impl PartialEq for Address {
	fn eq(&self, other: &Self) -> bool {
		self.state.id == other.state.id
	}
}

impl Eq for Address {}

impl Address {
	pub(crate) fn new(name: Option<String>, status: Receiver<Status>) -> Self {
		Self {
			state: Arc::new(AddressState {
				id: ActorId::next(),
				name: name.map(Arc::from),
				mailbox: Arc::new(Mailbox::new()),
				status,
				exit: OnceLock::new(),
			}),
		}
	}

	pub fn id(&self) -> ActorId {
		self.state.id
	}

	pub fn name(&self) -> Option<&str> {
		self.state.name.as_deref()
	}

	pub(crate) fn mailbox(&self) -> &Arc<Mailbox> {
		&self.state.mailbox
	}

	pub fn status(&self) -> Status {
		self.state.status.borrow().clone()
	}

	/// `false` once the mailbox no longer accepts messages.
	pub fn alive(&self) -> bool {
		!self.state.mailbox.is_dead()
	}

	/// Final reason, available as soon as the actor starts dying.
	pub fn exit_reason(&self) -> Option<ExitReason> {
		self.state
			.exit
			.get()
			.cloned()
			.or_else(|| lifecycle::reason(&self.state.status))
	}

	/// Messages waiting in the mailbox.
	pub fn pending(&self) -> usize {
		self.state.mailbox.len()
	}

	/// Messages ever accepted by the mailbox.
	pub fn enqueued(&self) -> u64 {
		self.state.mailbox.enqueued()
	}

	/// Resolves with the exit reason once the actor is `Dead`.
	pub async fn join(&self) -> ExitReason {
		lifecycle::dead(self.state.status.clone()).await
	}

	/// Asks the actor to terminate normally. Queued behind nothing: system
	/// messages overtake ordinary calls.
	pub fn terminate(&self) {
		let _ = self
			.state
			.mailbox
			.send(Message::System(SystemMessage::Terminate));
	}

	pub async fn terminate_and_wait(&self) -> ExitReason {
		self.terminate();
		self.join().await
	}

	/// Shuts the mailbox down from the outside. The actor dies abnormally
	/// without running any further call.
	pub fn kill(&self) {
		let reason = self.settle(ExitReason::Error(Failure::new("Killed", "mailbox shut down")));
		tracing::warn!(actor = %self.id(), "Actor killed");
		for message in self.state.mailbox.shutdown() {
			self.dispose(message, &reason);
		}
	}

	/// Records the final reason; the first one recorded wins.
	pub(crate) fn settle(&self, reason: ExitReason) -> ExitReason {
		self.state.exit.get_or_init(|| reason).clone()
	}

	/// Handles a message left in this actor's mailbox after it died.
	pub(crate) fn dispose(&self, message: Message, reason: &ExitReason) {
		match message {
			Message::System(SystemMessage::Link(other)) => {
				other.notify_exit(ExitNotice {
					from: self.id(),
					reason: reason.clone(),
				});
			}
			other => other.reject(),
		}
	}

	pub(crate) fn notify_exit(&self, notice: ExitNotice) {
		let _ = self
			.state
			.mailbox
			.send(Message::System(SystemMessage::Exit(notice)));
	}

	/// Links two actors: each is notified when the other dies.
	pub fn link(&self, other: &Address) {
		if self.id() == other.id() {
			return;
		}
		if self
			.state
			.mailbox
			.send(Message::System(SystemMessage::Link(other.clone())))
			.is_err()
		{
			other.notify_exit(self.final_notice());
		}
		if other
			.state
			.mailbox
			.send(Message::System(SystemMessage::Link(self.clone())))
			.is_err()
		{
			self.notify_exit(other.final_notice());
		}
	}

	pub fn unlink(&self, other: &Address) {
		let _ = self
			.state
			.mailbox
			.send(Message::System(SystemMessage::Unlink(other.id())));
		let _ = other
			.state
			.mailbox
			.send(Message::System(SystemMessage::Unlink(self.id())));
	}

	fn final_notice(&self) -> ExitNotice {
		ExitNotice {
			from: self.id(),
			reason: self.exit_reason().unwrap_or(ExitReason::Normal),
		}
	}

	/// Wakes every task of the actor waiting on the condition `name`.
	pub fn signal(&self, name: impl Into<String>, value: impl Into<Value>) {
		let _ = self.state.mailbox.send(Message::Signal {
			name: name.into(),
			value: value.into(),
		});
	}

	/// Synchronous call without a local signature check.
	pub async fn call(&self, method: &str, args: Args) -> Result<Value, CallError> {
		self.invoke(method, args, None, None).await
	}

	/// Asynchronous call without a local signature check.
	pub fn cast(&self, method: &str, args: Args) {
		let _ = self.state.mailbox.send(Message::Call(Call::cast(method, args)));
	}

	/// Synchronous call from outside any actor: waits on a private reply
	/// slot, running the caller's block whenever the target yields to it.
	pub(crate) async fn invoke(
		&self,
		method: &str,
		args: Args,
		timeout: Option<Duration>,
		block: Option<ExternalBlock<'_>>,
	) -> Result<Value, CallError> {
		let id = CallId::next();
		let chain = ChainId::root();
		let (tx, mut rx) = mpsc::unbounded_channel();
		let call = Call::sync(
			method,
			args,
			ReplyTo::slot(tx, id),
			chain,
			block.map(|_| BlockRef(id)),
		);
		let abandoned = call.abandon_handle();

		tracing::trace!(%chain, method, target = %self.id(), "sync call");
		// a dead mailbox answers through the slot
		let _ = self.state.mailbox.send(Message::Call(call));

		let wait = async {
			loop {
				match rx.recv().await {
					Some(Delivery::Response(response)) => return response.result,
					Some(Delivery::Block(mut call)) => {
						let args = std::mem::take(&mut call.args);
						let result = match block {
							Some(block) => block(args).map_err(CallError::Failed),
							None => Err(CallError::NoBlock),
						};
						if let Some(reply) = call.reply.take() {
							reply.respond(result);
						}
					}
					None => return Err(CallError::DeadActor),
				}
			}
		};

		match timeout {
			Some(limit) => match tokio::time::timeout(limit, wait).await {
				Ok(result) => result,
				Err(_) => {
					call::abandon(&abandoned);
					Err(CallError::Timeout(limit))
				}
			},
			None => wait.await,
		}
	}
}
