use std::collections::HashMap;
use std::future::Future;

use futures::FutureExt as _;
use futures::future::LocalBoxFuture;

use crate::actor::Actor;
use crate::error::Arity;
use crate::error::CallError;
use crate::error::Failure;
use crate::link::ExitNotice;
use crate::task::Task;
use crate::value::Args;
use crate::value::Value;

pub(crate) type MethodFn<A> =
	Box<dyn Fn(Task<A>, Args) -> LocalBoxFuture<'static, Result<Value, Failure>> + Send + Sync>;

pub(crate) type ExitFn<A> =
	Box<dyn Fn(Task<A>, ExitNotice) -> LocalBoxFuture<'static, Result<(), Failure>> + Send + Sync>;

pub(crate) struct Method<A: Actor> {
	pub arity: Arity,
	pub handler: MethodFn<A>,
}

/// Method table of an actor type.
///
/// Built once per spawned actor and shared between the actor thread, which
/// runs the handlers, and every proxy, which checks signatures before a
/// call is queued.
pub struct Methods<A: Actor> {
	table: HashMap<String, Method<A>>,
	exit: Option<ExitFn<A>>,
}

impl<A: Actor> Default for Methods<A> {
	fn default() -> Self {
		Self {
			table: HashMap::new(),
			exit: None,
		}
	}
}

impl<A: Actor> Methods<A> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `name`. The handler receives a [`Task`] for the call and
	/// its arguments; state is reached through [`Task::with`].
	pub fn method<F, Fut>(
		&mut self,
		name: impl Into<String>,
		arity: impl Into<Arity>,
		handler: F,
	) -> &mut Self
	where
		F: Fn(Task<A>, Args) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value, Failure>> + 'static,
	{
		self.table.insert(
			name.into(),
			Method {
				arity: arity.into(),
				handler: Box::new(move |task, args| handler(task, args).boxed_local()),
			},
		);
		self
	}

	/// Traps exit notices of linked actors: instead of dying with a linked
	/// actor, the actor runs `handler` for each notice.
	pub fn trap_exit<F, Fut>(&mut self, handler: F) -> &mut Self
	where
		F: Fn(Task<A>, ExitNotice) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), Failure>> + 'static,
	{
		self.exit = Some(Box::new(move |task, notice| {
			handler(task, notice).boxed_local()
		}));
		self
	}

	pub fn traps_exits(&self) -> bool {
		self.exit.is_some()
	}

	pub fn arity(&self, method: &str) -> Option<Arity> {
		self.table.get(method).map(|method| method.arity)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.table.keys().map(String::as_str)
	}

	pub(crate) fn check(&self, method: &str, given: usize) -> Result<&Method<A>, CallError> {
		let Some(entry) = self.table.get(method) else {
			return Err(CallError::NoMethod {
				method: method.to_string(),
			});
		};
		if !entry.arity.accepts(given) {
			return Err(CallError::InvalidArguments {
				method: method.to_string(),
				expected: entry.arity,
				given,
			});
		}
		Ok(entry)
	}

	pub(crate) fn exit_handler(&self) -> Option<&ExitFn<A>> {
		self.exit.as_ref()
	}
}
