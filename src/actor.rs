use std::any::type_name;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::StreamExt as _;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use tokio::sync::Notify;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::address::ActorId;
use crate::address::Address;
use crate::call::BlockRef;
use crate::call::Call;
use crate::call::CallId;
use crate::call::CallKind;
use crate::call::ReplyGuard;
use crate::chain::ChainId;
use crate::chain::ChainTracker;
use crate::error::CallError;
use crate::error::Failure;
use crate::error::StartError;
use crate::lifecycle::Lifecycle;
use crate::lifecycle::Status;
use crate::link::ExitNotice;
use crate::link::ExitReason;
use crate::link::LinkSet;
use crate::mailbox::Message;
use crate::mailbox::ReceiveError;
use crate::mailbox::SystemMessage;
use crate::methods::Methods;
use crate::proxy::Proxy;
use crate::registry::Registry;
use crate::task::Task;
use crate::value::Args;
use crate::value::Value;

/// Block registered by a task for the duration of one synchronous call.
pub(crate) type Block = Rc<dyn Fn(Args) -> Result<Value, Failure>>;

/// Everything an actor needs while it is being constructed.
pub struct Init<A: Actor> {
	/// Construction input, moved onto the actor thread and handed to [`Actor::init`].
	pub spec: A::Spec,
	/// Proxy to the actor being initialized
	pub proxy: Proxy<A>,
}

/// Per-actor settings.
#[derive(Debug, Clone, Default)]
pub struct Options {
	/// Registers the actor under this name in [`Registry::global`] and
	/// names its thread.
	pub name: Option<String>,
	/// Default timeout of synchronous calls made through the returned proxy.
	pub call_timeout: Option<Duration>,
	/// Stack size of the actor thread.
	pub stack_size: Option<usize>,
}

impl Options {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout = Some(timeout);
		self
	}

	pub fn stack_size(mut self, size: usize) -> Self {
		self.stack_size = Some(size);
		self
	}
}

/// A concurrent object.
///
/// The object is built on its own thread by [`Actor::init`] and never
/// leaves it; callers only hold [`Proxy`] handles whose method calls are
/// turned into messages and served one at a time.
pub trait Actor: Sized + 'static {
	type Spec: Send + 'static;

	fn init(ctx: Init<Self>) -> Result<Self, Failure>;

	fn methods(methods: &mut Methods<Self>);

	fn span(_spec: &Self::Spec) -> tracing::Span {
		tracing::info_span!("actor", kind = type_name::<Self>())
	}

	/// Runs once while the actor is terminating, after in-flight calls
	/// were abandoned and before links are notified.
	fn finalize(&mut self, _reason: &ExitReason) {}

	fn spawn(spec: Self::Spec) -> Result<Proxy<Self>, StartError> {
		Self::spawn_with(spec, Options::default())
	}

	fn spawn_with(spec: Self::Spec, options: Options) -> Result<Proxy<Self>, StartError> {
		let mut methods = Methods::new();
		Self::methods(&mut methods);

		let (lifecycle, status) = Lifecycle::new();
		let address = Address::new(options.name.clone(), status);
		let proxy = Proxy::new(address, Arc::new(methods), options.call_timeout);
		let span = Self::span(&spec);

		let thread_name = match &options.name {
			Some(name) => name.clone(),
			None => format!("actor-{}", proxy.id().get()),
		};
		let mut builder = std::thread::Builder::new().name(thread_name);
		if let Some(size) = options.stack_size {
			builder = builder.stack_size(size);
		}

		if let Some(name) = &options.name {
			Registry::global().register(name.clone(), &proxy);
		}

		let init = proxy.clone();
		if let Err(err) = builder.spawn(move || run_thread::<Self>(spec, init, lifecycle, span)) {
			tracing::error!(actor = %proxy.id(), "Failed to launch actor thread: {err}");
			proxy.kill();
			if let Some(name) = &options.name {
				Registry::global().deregister_actor(name, proxy.id());
			}
			return Err(StartError::Thread(err));
		}

		Ok(proxy)
	}
}

type TaskFuture = LocalBoxFuture<'static, Outcome>;
type Tasks = FuturesUnordered<TaskFuture>;

enum Outcome {
	Call {
		method: String,
		kind: CallKind,
		reply: ReplyGuard,
		result: Result<Value, Failure>,
	},
	Exit(Result<(), Failure>),
}

#[derive(Default)]
pub(crate) struct CoreState {
	chains: ChainTracker,
	waiters: HashMap<CallId, oneshot::Sender<Result<Value, CallError>>>,
	blocks: HashMap<CallId, Block>,
	conditions: HashMap<String, Vec<oneshot::Sender<Value>>>,
	links: LinkSet,
	exit: Option<ExitReason>,
}

/// The actor core: owns the object and serves the mailbox.
pub(crate) struct Core<A: Actor> {
	pub actor: RefCell<A>,
	pub address: Address,
	pub methods: Arc<Methods<A>>,
	state: RefCell<CoreState>,
	/// Kicks the dispatch loop when admission may have changed.
	wake: Notify,
}

impl<A: Actor> Core<A> {
	fn new(actor: A, address: Address, methods: Arc<Methods<A>>) -> Self {
		Self {
			actor: RefCell::new(actor),
			address,
			methods,
			state: Default::default(),
			wake: Notify::new(),
		}
	}

	pub fn expect_reply(&self, call: CallId) -> oneshot::Receiver<Result<Value, CallError>> {
		let (tx, rx) = oneshot::channel();
		self.state.borrow_mut().waiters.insert(call, tx);
		rx
	}

	pub fn register_block(&self, call: CallId, block: Block) -> BlockRef {
		self.state.borrow_mut().blocks.insert(call, block);
		BlockRef(call)
	}

	pub fn hold_chain(&self, chain: ChainId) {
		self.state.borrow_mut().chains.hold(chain);
	}

	pub fn release_chain(&self, chain: ChainId, call: CallId) {
		if let Ok(mut state) = self.state.try_borrow_mut() {
			state.chains.release(chain);
			state.waiters.remove(&call);
			state.blocks.remove(&call);
		}
		self.wake.notify_one();
	}

	pub fn add_waiter(&self, name: &str, tx: oneshot::Sender<Value>) {
		let mut state = self.state.borrow_mut();
		let waiters = state.conditions.entry(name.to_string()).or_default();
		// timed-out waiters leave closed senders behind
		waiters.retain(|waiter| !waiter.is_closed());
		waiters.push(tx);
	}

	/// Drops waiters on `name` whose task stopped waiting.
	pub fn prune_waiters(&self, name: &str) {
		let mut state = self.state.borrow_mut();
		let conditions = &mut state.conditions;
		let drained = match conditions.get_mut(name) {
			Some(waiters) => {
				waiters.retain(|waiter| !waiter.is_closed());
				waiters.is_empty()
			}
			None => false,
		};
		if drained {
			conditions.remove(name);
		}
	}

	pub fn waiting(&self, name: &str) -> usize {
		self.state
			.borrow()
			.conditions
			.get(name)
			.map_or(0, |waiters| waiters.len())
	}

	pub fn signal(&self, name: &str, value: Value) -> usize {
		let waiters = self.state.borrow_mut().conditions.remove(name);
		waiters
			.into_iter()
			.flatten()
			.filter(|tx| !tx.is_closed())
			.map(|tx| tx.send(value.clone()).is_ok())
			.filter(|woken| *woken)
			.count()
	}

	pub fn request_exit(&self, reason: ExitReason) {
		let mut state = self.state.borrow_mut();
		if state.exit.is_none() {
			state.exit = Some(reason);
		}
		drop(state);
		self.wake.notify_one();
	}

	pub fn is_linked(&self, other: ActorId) -> bool {
		self.state.borrow().links.contains(other)
	}

	async fn run(self: &Rc<Self>, tasks: &mut Tasks, deferred: &mut VecDeque<Call>) -> ExitReason {
		loop {
			// let freshly started tasks reach their first suspension point
			while let Some(Some(outcome)) = tasks.next().now_or_never() {
				self.finish(outcome);
			}

			let exit = self.state.borrow_mut().exit.take();
			if let Some(reason) = exit {
				return reason;
			}

			if let Some(call) = self.next_deferred(deferred) {
				if let Some(task) = self.start(call) {
					tasks.push(task);
				}
				continue;
			}

			tokio::select! {
				biased;
				Some(outcome) = tasks.next(), if !tasks.is_empty() => self.finish(outcome),
				_ = self.wake.notified() => {}
				received = self.address.mailbox().receive(None) => match received {
					Ok(message) => self.accept(message, deferred, tasks),
					Err(ReceiveError::Timeout) => {}
					Err(ReceiveError::Dead) => {
						return self.address.exit_reason().unwrap_or(ExitReason::Normal);
					}
				}
			}
		}
	}

	fn accept(self: &Rc<Self>, message: Message, deferred: &mut VecDeque<Call>, tasks: &mut Tasks) {
		match message {
			Message::Call(call) => match (call.kind, call.is_abandoned()) {
				(CallKind::Block, _) => self.run_block(call),
				(_, true) => {
					tracing::debug!(method = call.method(), "Skipping abandoned call");
				}
				(_, false) => {
					let admitted = self
						.state
						.borrow()
						.chains
						.admits(&call.chain, !deferred.is_empty());
					if admitted {
						if let Some(task) = self.start(call) {
							tasks.push(task);
						}
					} else {
						tracing::trace!(chain = %call.chain, method = call.method(), "Call deferred");
						deferred.push_back(call);
					}
				}
			},
			Message::Response(response) => {
				let waiter = self.state.borrow_mut().waiters.remove(&response.call);
				match waiter {
					Some(tx) => {
						let _ = tx.send(response.result);
					}
					None => tracing::trace!("Dropping response nobody waits for"),
				}
			}
			Message::Signal { name, value } => {
				self.signal(&name, value);
			}
			Message::System(SystemMessage::Terminate) => {
				tracing::info!("Termination requested");
				self.request_exit(ExitReason::Normal);
			}
			Message::System(SystemMessage::Exit(notice)) => self.on_exit_notice(notice, tasks),
			Message::System(SystemMessage::Link(other)) => {
				if other.id() != self.address.id() {
					tracing::debug!(other = %other.id(), "Linked");
					self.state.borrow_mut().links.insert(other);
				}
			}
			Message::System(SystemMessage::Unlink(other)) => {
				self.state.borrow_mut().links.remove(other);
			}
		}
	}

	fn next_deferred(&self, deferred: &mut VecDeque<Call>) -> Option<Call> {
		deferred.retain(|call| !call.is_abandoned());
		let state = self.state.borrow();
		let index = if state.chains.is_idle() {
			(!deferred.is_empty()).then_some(0)
		} else {
			deferred
				.iter()
				.position(|call| state.chains.holds(&call.chain))
		};
		drop(state);

		let call = deferred.remove(index?)?;
		if !self.state.borrow().chains.is_idle() {
			tracing::debug!(chain = %call.chain, method = call.method(), "Reentrant call admitted");
		}
		Some(call)
	}

	fn start(self: &Rc<Self>, call: Call) -> Option<TaskFuture> {
		let Call {
			id,
			kind,
			method,
			args,
			block,
			reply,
			chain,
			..
		} = call;

		let entry = match self.methods.check(&method, args.len()) {
			Ok(entry) => entry,
			Err(err) => {
				tracing::warn!(%method, "Dispatch failed: {err}");
				if let Some(reply) = reply {
					reply.respond(Err(err));
				}
				return None;
			}
		};

		metrics::counter!("actor_calls_total", "kind" => kind_label(kind)).increment(1);
		tracing::trace!(%chain, %method, call = ?id, "Starting task");

		let task = Task::new(self.clone(), chain, reply.clone(), block);
		let future = (entry.handler)(task, args);
		let reply = ReplyGuard::new(reply);

		Some(
			async move {
				let result = AssertUnwindSafe(future)
					.catch_unwind()
					.await
					.unwrap_or_else(|panic| Err(Failure::panic(panic)));
				Outcome::Call {
					method,
					kind,
					reply,
					result,
				}
			}
			.boxed_local(),
		)
	}

	fn finish(&self, outcome: Outcome) {
		match outcome {
			Outcome::Call {
				reply,
				result: Ok(value),
				..
			} => reply.respond(Ok(value)),
			Outcome::Call {
				method,
				kind,
				reply,
				result: Err(failure),
			} => {
				if failure.is_abort() {
					if !reply.is_sync() {
						tracing::warn!(%method, ?kind, "Aborted call has no caller: {failure}");
					}
					reply.respond(Err(CallError::Failed(failure)));
				} else {
					tracing::error!(%method, ?kind, "Actor crashed: {failure}");
					reply.respond(Err(CallError::Failed(failure.clone())));
					self.crash(failure);
				}
			}
			Outcome::Exit(Ok(())) => {}
			Outcome::Exit(Err(failure)) => {
				tracing::error!("Exit handler failed: {failure}");
				self.crash(failure);
			}
		}
	}

	fn crash(&self, failure: Failure) {
		metrics::counter!("actor_crashes_total").increment(1);
		self.request_exit(ExitReason::Error(failure));
	}

	fn run_block(&self, mut call: Call) {
		let reply = call.reply.take();
		let block = call
			.block
			.and_then(|block| self.state.borrow().blocks.get(&block.0).cloned());

		let result = match block {
			Some(block) => {
				let args = std::mem::take(&mut call.args);
				std::panic::catch_unwind(AssertUnwindSafe(|| block(args)))
					.unwrap_or_else(|panic| Err(Failure::panic(panic)))
					.map_err(CallError::Failed)
			}
			None => Err(CallError::NoBlock),
		};

		if let Some(reply) = reply {
			reply.respond(result);
		}
	}

	fn on_exit_notice(self: &Rc<Self>, notice: ExitNotice, tasks: &mut Tasks) {
		let linked = self.state.borrow_mut().links.remove(notice.from).is_some();
		if !linked {
			tracing::debug!(from = %notice.from, "Ignoring exit notice from unlinked actor");
			return;
		}

		if let Some(handler) = self.methods.exit_handler() {
			tracing::debug!(from = %notice.from, reason = %notice.reason, "Trapped exit");
			let task = Task::new(self.clone(), ChainId::root(), None, None);
			let future = handler(task, notice);
			tasks.push(
				async move {
					let result = AssertUnwindSafe(future)
						.catch_unwind()
						.await
						.unwrap_or_else(|panic| Err(Failure::panic(panic)));
					Outcome::Exit(result)
				}
				.boxed_local(),
			);
		} else if notice.reason.is_abnormal() {
			tracing::warn!(from = %notice.from, reason = %notice.reason, "Linked actor crashed");
			self.request_exit(notice.propagated());
		} else {
			tracing::debug!(from = %notice.from, "Linked actor exited normally");
		}
	}

	/// Terminating: abandons in-flight work, answers every pending caller,
	/// runs the finalizer and notifies links.
	fn shutdown(&self, reason: ExitReason, tasks: Tasks, deferred: VecDeque<Call>) -> ExitReason {
		let reason = self.address.settle(reason);

		drop(tasks);
		for call in deferred {
			call.reject(CallError::DeadActor);
		}

		let finalized = std::panic::catch_unwind(AssertUnwindSafe(|| {
			self.actor.borrow_mut().finalize(&reason)
		}));
		if finalized.is_err() {
			tracing::error!("Finalizer panicked");
		}

		let links: Vec<Address> = {
			let mut state = self.state.borrow_mut();
			state.waiters.clear();
			state.blocks.clear();
			state.conditions.clear();
			state.chains.clear();
			let links = state.links.drain().collect();
			links
		};

		bury(&self.address, links, reason)
	}
}

fn kind_label(kind: CallKind) -> &'static str {
	match kind {
		CallKind::Sync => "sync",
		CallKind::Async => "async",
		CallKind::Block => "block",
	}
}

/// Final steps shared by every way of dying: the mailbox is shut, leftover
/// callers are answered, links and the registry are updated.
fn bury(address: &Address, links: Vec<Address>, reason: ExitReason) -> ExitReason {
	let reason = address.settle(reason);

	for message in address.mailbox().shutdown() {
		address.dispose(message, &reason);
	}

	for linked in links {
		linked.notify_exit(ExitNotice {
			from: address.id(),
			reason: reason.clone(),
		});
	}

	if let Some(name) = address.name() {
		Registry::global().deregister_actor(name, address.id());
	}

	reason
}

fn run_thread<A: Actor>(spec: A::Spec, proxy: Proxy<A>, lifecycle: Lifecycle, span: tracing::Span) {
	let count = crate::countme::Count::<A>::new();
	metrics::gauge!("actors_live").increment(1.0);

	let address = proxy.address().clone();
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build();

	let reason = match runtime {
		Ok(runtime) => runtime.block_on(drive::<A>(spec, proxy, &lifecycle).instrument(span.clone())),
		Err(err) => {
			let _enter = span.enter();
			tracing::error!("Failed to build actor runtime: {err}");
			bury(&address, Vec::new(), ExitReason::Error(Failure::from(err)))
		}
	};

	{
		let _enter = span.enter();
		match &reason {
			ExitReason::Normal => tracing::info!("Actor {} terminated", type_name::<A>()),
			ExitReason::Error(failure) => {
				tracing::error!("Actor {} died: {failure}", type_name::<A>())
			}
		}
	}

	drop(count);
	metrics::gauge!("actors_live").decrement(1.0);
	lifecycle.set(Status::Dead(reason));
}

async fn drive<A: Actor>(spec: A::Spec, proxy: Proxy<A>, lifecycle: &Lifecycle) -> ExitReason {
	let address = proxy.address().clone();
	let methods = proxy.methods().clone();

	let init = std::panic::catch_unwind(AssertUnwindSafe(|| A::init(Init { spec, proxy })));
	let actor = match init {
		Ok(Ok(actor)) => actor,
		Ok(Err(failure)) => {
			tracing::error!("Actor terminated before initialization: {failure}");
			return bury(&address, Vec::new(), ExitReason::Error(failure));
		}
		Err(panic) => {
			let failure = Failure::panic(panic);
			tracing::error!("Actor panicked during initialization: {failure}");
			return bury(&address, Vec::new(), ExitReason::Error(failure));
		}
	};

	lifecycle.set(Status::Running);
	tracing::info!(actor = %address.id(), "Actor started");

	let core = Rc::new(Core::new(actor, address, methods));
	let mut tasks = Tasks::new();
	let mut deferred = VecDeque::new();

	let reason = AssertUnwindSafe(core.run(&mut tasks, &mut deferred))
		.catch_unwind()
		.await
		.unwrap_or_else(|panic| ExitReason::Error(Failure::panic(panic)));

	lifecycle.set(Status::Terminating);
	core.shutdown(reason, tasks, deferred)
}
