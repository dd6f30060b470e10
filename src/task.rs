use std::rc::Rc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::actor::Actor;
use crate::actor::Block;
use crate::actor::Core;
use crate::address::ActorId;
use crate::address::Address;
use crate::call::BlockRef;
use crate::call::Call;
use crate::call::CallId;
use crate::call::ReplyTo;
use crate::call::abandon;
use crate::chain::ChainId;
use crate::error::CallError;
use crate::error::Failure;
use crate::mailbox::Message;
use crate::proxy::Proxy;
use crate::value::Args;
use crate::value::Value;

/// Execution context of one in-flight call.
///
/// Handlers never hold the actor's state across an `.await`: they reach
/// it through [`Task::with`]. The `.await` points of a task are exactly its
/// suspension points: [`Task::call`] (and friends), [`Task::wait`] and
/// [`Task::sleep`]. While suspended, the actor keeps serving its mailbox.
pub struct Task<A: Actor> {
	core: Rc<Core<A>>,
	chain: ChainId,
	caller: Option<ReplyTo>,
	block: Option<BlockRef>,
}

impl<A: Actor> Clone for Task<A> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
			chain: self.chain,
			caller: self.caller.clone(),
			block: self.block,
		}
	}
}

impl<A: Actor> Task<A> {
	pub(crate) fn new(
		core: Rc<Core<A>>,
		chain: ChainId,
		caller: Option<ReplyTo>,
		block: Option<BlockRef>,
	) -> Self {
		Self {
			core,
			chain,
			caller,
			block,
		}
	}

	/// Chain identity this task runs in.
	pub fn chain(&self) -> ChainId {
		self.chain
	}

	pub fn id(&self) -> ActorId {
		self.core.address.id()
	}

	pub fn address(&self) -> &Address {
		&self.core.address
	}

	pub fn proxy(&self) -> Proxy<A> {
		Proxy::new(self.core.address.clone(), self.core.methods.clone(), None)
	}

	/// Runs `func` with exclusive access to the actor object.
	pub fn with<R>(&self, func: impl FnOnce(&mut A) -> R) -> R {
		func(&mut self.core.actor.borrow_mut())
	}

	/// Synchronous call to another actor (or to this one) within the
	/// current chain. Suspends this task until the reply arrives.
	pub async fn call<B: Actor>(
		&self,
		target: &Proxy<B>,
		method: &str,
		args: Args,
	) -> Result<Value, CallError> {
		target.check(method, args.len())?;
		self.request(target.address(), method, args, target.timeout(), None)
			.await
	}

	pub async fn call_timeout<B: Actor>(
		&self,
		target: &Proxy<B>,
		method: &str,
		args: Args,
		timeout: Duration,
	) -> Result<Value, CallError> {
		target.check(method, args.len())?;
		self.request(target.address(), method, args, Some(timeout), None)
			.await
	}

	/// Synchronous call handing over a block. When the target yields to
	/// it, the block runs here, on this actor's thread.
	pub async fn call_with_block<B, F>(
		&self,
		target: &Proxy<B>,
		method: &str,
		args: Args,
		block: F,
	) -> Result<Value, CallError>
	where
		B: Actor,
		F: Fn(Args) -> Result<Value, Failure> + 'static,
	{
		target.check(method, args.len())?;
		self.request(
			target.address(),
			method,
			args,
			target.timeout(),
			Some(Rc::new(block)),
		)
		.await
	}

	/// Synchronous call through an untyped address.
	pub async fn call_address(
		&self,
		target: &Address,
		method: &str,
		args: Args,
	) -> Result<Value, CallError> {
		self.request(target, method, args, None, None).await
	}

	/// Asynchronous call. Never suspends.
	pub fn cast<B: Actor>(
		&self,
		target: &Proxy<B>,
		method: &str,
		args: Args,
	) -> Result<(), CallError> {
		target.check(method, args.len())?;
		let _ = target
			.address()
			.mailbox()
			.send(Message::Call(Call::cast(method, args)));
		Ok(())
	}

	async fn request(
		&self,
		target: &Address,
		method: &str,
		args: Args,
		timeout: Option<Duration>,
		block: Option<Block>,
	) -> Result<Value, CallError> {
		let id = CallId::next();
		let reply = self.core.expect_reply(id);
		let block = block.map(|block| self.core.register_block(id, block));
		let hold = ChainHold::enter(&self.core, self.chain, id);

		tracing::debug!(chain = %self.chain, method, target = %target.id(), "nested sync call");

		let call = Call::sync(
			method,
			args,
			ReplyTo::mailbox(self.core.address.mailbox().clone(), id),
			self.chain,
			block,
		);
		let abandoned = call.abandon_handle();
		let _ = target.mailbox().send(Message::Call(call));

		let result = await_reply(reply, timeout).await;
		if matches!(result, Err(CallError::Timeout(_))) {
			abandon(&abandoned);
		}
		drop(hold);
		result
	}

	pub fn has_block(&self) -> bool {
		self.block.is_some()
	}

	/// Invokes the block attached to the call being served. The block runs
	/// in the caller's context; this task waits for its result.
	pub async fn yield_block(&self, args: Args) -> Result<Value, CallError> {
		let (Some(block), Some(caller)) = (self.block, self.caller.as_ref()) else {
			return Err(CallError::NoBlock);
		};

		let id = CallId::next();
		let reply = self.core.expect_reply(id);
		let hold = ChainHold::enter(&self.core, self.chain, id);

		tracing::trace!(chain = %self.chain, "yielding to caller block");
		caller.deliver_block(Call::block(
			block,
			args,
			ReplyTo::mailbox(self.core.address.mailbox().clone(), id),
			self.chain,
		));

		let result = await_reply(reply, None).await;
		drop(hold);
		result
	}

	/// Suspends until some task or external party signals `name`.
	pub async fn wait(&self, name: &str) -> Result<Value, CallError> {
		self.wait_for(name, None).await
	}

	pub async fn wait_timeout(&self, name: &str, timeout: Duration) -> Result<Value, CallError> {
		self.wait_for(name, Some(timeout)).await
	}

	async fn wait_for(&self, name: &str, timeout: Option<Duration>) -> Result<Value, CallError> {
		let (tx, rx) = oneshot::channel();
		self.core.add_waiter(name, tx);
		tracing::trace!(condition = name, "task waiting");

		match timeout {
			Some(limit) => {
				let outcome = tokio::time::timeout(limit, rx).await;
				match outcome {
					Ok(result) => result.map_err(|_| CallError::DeadActor),
					Err(_) => {
						self.core.prune_waiters(name);
						Err(CallError::Timeout(limit))
					}
				}
			}
			None => rx.await.map_err(|_| CallError::DeadActor),
		}
	}

	/// Number of tasks currently waiting on `name`.
	pub fn waiting(&self, name: &str) -> usize {
		self.core.waiting(name)
	}

	/// Wakes every task waiting on `name`; returns how many were woken.
	pub fn signal(&self, name: &str, value: impl Into<Value>) -> usize {
		self.core.signal(name, value.into())
	}

	pub async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await
	}

	/// Requests a normal exit once the current step is over.
	pub fn terminate(&self) {
		self.core.request_exit(crate::link::ExitReason::Normal);
	}

	pub fn link(&self, other: &Address) {
		self.core.address.link(other);
	}

	pub fn unlink(&self, other: &Address) {
		self.core.address.unlink(other);
	}

	pub fn linked(&self, other: ActorId) -> bool {
		self.core.is_linked(other)
	}
}

async fn await_reply(
	reply: oneshot::Receiver<Result<Value, CallError>>,
	timeout: Option<Duration>,
) -> Result<Value, CallError> {
	match timeout {
		Some(limit) => match tokio::time::timeout(limit, reply).await {
			Ok(result) => result.unwrap_or(Err(CallError::DeadActor)),
			Err(_) => Err(CallError::Timeout(limit)),
		},
		None => reply.await.unwrap_or(Err(CallError::DeadActor)),
	}
}

/// Keeps a chain held while a task waits for a reply.
struct ChainHold<A: Actor> {
	core: Rc<Core<A>>,
	chain: ChainId,
	call: CallId,
}

impl<A: Actor> ChainHold<A> {
	fn enter(core: &Rc<Core<A>>, chain: ChainId, call: CallId) -> Self {
		core.hold_chain(chain);
		Self {
			core: core.clone(),
			chain,
			call,
		}
	}
}

impl<A: Actor> Drop for ChainHold<A> {
	fn drop(&mut self) {
		self.core.release_chain(self.chain, self.call);
	}
}
