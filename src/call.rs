use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;

use crate::chain::ChainId;
use crate::error::CallError;
use crate::mailbox::Mailbox;
use crate::mailbox::Message;
use crate::value::Args;
use crate::value::Value;

static NEXT_CALL: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl CallId {
	pub(crate) fn next() -> Self {
		Self(NEXT_CALL.fetch_add(1, Ordering::Relaxed))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
	/// The caller waits for the reply.
	Sync,
	/// Fire and forget.
	Async,
	/// Invocation of a block handed over by a synchronous caller; runs on
	/// the caller's side.
	Block,
}

/// Names a block owned by the caller of a synchronous call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockRef(pub CallId);

/// One invocation request.
pub struct Call {
	pub(crate) id: CallId,
	pub(crate) kind: CallKind,
	pub(crate) method: String,
	pub(crate) args: Args,
	pub(crate) block: Option<BlockRef>,
	pub(crate) reply: Option<ReplyTo>,
	pub(crate) chain: ChainId,
	abandoned: Arc<AtomicBool>,
}

impl Debug for Call {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Call")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("method", &self.method)
			.field("args", &self.args)
			.field("chain", &self.chain)
			.finish()
	}
}

impl Call {
	pub(crate) fn sync(
		method: impl Into<String>,
		args: Args,
		reply: ReplyTo,
		chain: ChainId,
		block: Option<BlockRef>,
	) -> Self {
		Self {
			id: reply.call,
			kind: CallKind::Sync,
			method: method.into(),
			args,
			block,
			reply: Some(reply),
			chain,
			abandoned: Default::default(),
		}
	}

	pub(crate) fn cast(method: impl Into<String>, args: Args) -> Self {
		Self {
			id: CallId::next(),
			kind: CallKind::Async,
			method: method.into(),
			args,
			block: None,
			reply: None,
			chain: ChainId::root(),
			abandoned: Default::default(),
		}
	}

	pub(crate) fn block(block: BlockRef, args: Args, reply: ReplyTo, chain: ChainId) -> Self {
		Self {
			id: reply.call,
			kind: CallKind::Block,
			method: String::from("<block>"),
			args,
			block: Some(block),
			reply: Some(reply),
			chain,
			abandoned: Default::default(),
		}
	}

	pub(crate) fn method(&self) -> &str {
		&self.method
	}

	/// Handle the issuer keeps to give up on the call before it starts.
	pub(crate) fn abandon_handle(&self) -> Arc<AtomicBool> {
		self.abandoned.clone()
	}

	pub(crate) fn is_abandoned(&self) -> bool {
		self.abandoned.load(Ordering::Acquire)
	}

	/// Answers the issuer with `err` without running anything.
	pub(crate) fn reject(self, err: CallError) {
		if let Some(reply) = self.reply {
			reply.respond(Err(err));
		}
	}
}

pub(crate) fn abandon(flag: &AtomicBool) {
	flag.store(true, Ordering::Release);
}

#[derive(Debug)]
pub(crate) struct Response {
	pub call: CallId,
	pub result: Result<Value, CallError>,
}

/// What a private reply slot of an external caller can receive.
#[derive(Debug)]
pub(crate) enum Delivery {
	Response(Response),
	Block(Call),
}

#[derive(Clone)]
pub(crate) enum Route {
	/// The caller is a task of another actor: answers go through its mailbox.
	Mailbox(Arc<Mailbox>),
	/// The caller is outside any actor and waits on a private channel.
	Slot(mpsc::UnboundedSender<Delivery>),
}

/// Where the result of a call (or a block invocation) must be sent.
#[derive(Clone)]
pub(crate) struct ReplyTo {
	route: Route,
	call: CallId,
}

impl ReplyTo {
	pub fn mailbox(mailbox: Arc<Mailbox>, call: CallId) -> Self {
		Self {
			route: Route::Mailbox(mailbox),
			call,
		}
	}

	pub fn slot(tx: mpsc::UnboundedSender<Delivery>, call: CallId) -> Self {
		Self {
			route: Route::Slot(tx),
			call,
		}
	}

	pub fn respond(&self, result: Result<Value, CallError>) {
		let response = Response {
			call: self.call,
			result,
		};
		match &self.route {
			Route::Mailbox(mailbox) => {
				let _ = mailbox.send(Message::Response(response));
			}
			Route::Slot(tx) => {
				let _ = tx.send(Delivery::Response(response));
			}
		}
	}

	/// Sends a block invocation back to the side that owns the block.
	pub fn deliver_block(&self, call: Call) {
		match &self.route {
			Route::Mailbox(mailbox) => {
				// a dead mailbox answers the block call itself
				let _ = mailbox.send(Message::Call(call));
			}
			Route::Slot(tx) => {
				if let Err(mpsc::error::SendError(Delivery::Block(call))) =
					tx.send(Delivery::Block(call))
				{
					call.reject(CallError::DeadActor);
				}
			}
		}
	}
}

/// Reply route owned by a running task. A task that is dropped without
/// answering (its actor died) answers `DeadActor` on the way out.
pub(crate) struct ReplyGuard {
	reply: Option<ReplyTo>,
}

impl ReplyGuard {
	pub fn new(reply: Option<ReplyTo>) -> Self {
		Self { reply }
	}

	pub fn is_sync(&self) -> bool {
		self.reply.is_some()
	}

	pub fn respond(mut self, result: Result<Value, CallError>) {
		if let Some(reply) = self.reply.take() {
			reply.respond(result);
		}
	}
}

impl Drop for ReplyGuard {
	fn drop(&mut self) {
		if let Some(reply) = self.reply.take() {
			reply.respond(Err(CallError::DeadActor));
		}
	}
}
