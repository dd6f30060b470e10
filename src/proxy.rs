use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::actor::Actor;
use crate::address::Address;
use crate::error::CallError;
use crate::error::Failure;
use crate::methods::Methods;
use crate::value::Args;
use crate::value::Value;

/// Typed handle to an actor.
///
/// Cloning is cheap; every clone talks to the same mailbox. Method names
/// and argument counts are checked here, before anything is queued, so a
/// misspelled call never reaches (or crashes) the actor.
pub struct Proxy<A: Actor> {
	address: Address,
	methods: Arc<Methods<A>>,
	timeout: Option<Duration>,
}

impl<A: Actor> Clone for Proxy<A> {
	fn clone(&self) -> Self {
		Self {
			address: self.address.clone(),
			methods: self.methods.clone(),
			timeout: self.timeout,
		}
	}
}

impl<A: Actor> fmt::Debug for Proxy<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Proxy")
			.field("actor", &std::any::type_name::<A>())
			.field("address", &self.address)
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl<A: Actor> Deref for Proxy<A> {
	type Target = Address;

	fn deref(&self) -> &Self::Target {
		&self.address
	}
}

impl<A: Actor> Proxy<A> {
	pub(crate) fn new(address: Address, methods: Arc<Methods<A>>, timeout: Option<Duration>) -> Self {
		Self {
			address,
			methods,
			timeout,
		}
	}

	pub fn address(&self) -> &Address {
		&self.address
	}

	pub(crate) fn methods(&self) -> &Arc<Methods<A>> {
		&self.methods
	}

	/// Default timeout of synchronous calls made through this proxy.
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	pub fn with_timeout(&self, timeout: Duration) -> Self {
		Self {
			timeout: Some(timeout),
			..self.clone()
		}
	}

	pub fn responds_to(&self, method: &str) -> bool {
		self.methods.arity(method).is_some()
	}

	/// Whether the actor handles exit notices of linked actors itself.
	pub fn traps_exits(&self) -> bool {
		self.methods.traps_exits()
	}

	pub(crate) fn check(&self, method: &str, given: usize) -> Result<(), CallError> {
		self.methods.check(method, given).map(|_| ())
	}

	/// Synchronous call: waits until the actor has served it.
	pub async fn call(&self, method: &str, args: Args) -> Result<Value, CallError> {
		self.check(method, args.len())?;
		self.address.invoke(method, args, self.timeout, None).await
	}

	pub async fn call_timeout(
		&self,
		method: &str,
		args: Args,
		timeout: Duration,
	) -> Result<Value, CallError> {
		self.check(method, args.len())?;
		self.address.invoke(method, args, Some(timeout), None).await
	}

	/// Synchronous call with a block. Each time the actor yields to the
	/// block, it runs here, on the calling side, and its result is sent back.
	pub async fn call_with_block<F>(
		&self,
		method: &str,
		args: Args,
		block: F,
	) -> Result<Value, CallError>
	where
		F: Fn(Args) -> Result<Value, Failure> + Send + Sync,
	{
		self.check(method, args.len())?;
		self.address
			.invoke(method, args, self.timeout, Some(&block))
			.await
	}

	/// Blocks the current thread until the call is served or the proxy's
	/// timeout passes. Must not be used from inside an async runtime.
	pub fn call_blocking(&self, method: &str, args: Args) -> Result<Value, CallError> {
		self.check(method, args.len())?;
		let call = self.address.invoke(method, args, self.timeout, None);
		if self.timeout.is_none() {
			return futures::executor::block_on(call);
		}

		// the deadline needs a timer driver
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_time()
			.build()
			.map_err(|err| {
				tracing::error!(target = %self.id(), "Failed to build call runtime: {err}");
				CallError::Failed(Failure::from(err))
			})?;
		runtime.block_on(call)
	}

	/// Asynchronous call. Returns as soon as the call is queued; a call to
	/// a dead actor is silently dropped.
	pub fn cast(&self, method: &str, args: Args) -> Result<(), CallError> {
		self.check(method, args.len())?;
		self.address.cast(method, args);
		Ok(())
	}
}
