use std::any::type_name;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::actor::Actor;
use crate::actor::Init;
use crate::actor::Options;
use crate::address::ActorId;
use crate::error::CallError;
use crate::error::Failure;
use crate::error::StartError;
use crate::link::ExitNotice;
use crate::link::ExitReason;
use crate::methods::Methods;
use crate::proxy::Proxy;
use crate::task::Task;
use crate::value::Args;
use crate::value::Value;

/// When a supervised actor is started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restart {
	/// After every exit.
	#[default]
	Permanent,
	/// Only after an abnormal exit.
	Transient,
	/// Never.
	Temporary,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	pub restart: Restart,
	/// More restarts than this within `window` and the supervisor gives up.
	pub max_restarts: usize,
	pub window: Duration,
	/// Options every incarnation of the child is spawned with.
	pub child: Options,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			restart: Restart::Permanent,
			max_restarts: 3,
			window: Duration::from_secs(5),
			child: Options::default(),
		}
	}
}

impl SupervisorConfig {
	pub fn restart(mut self, restart: Restart) -> Self {
		self.restart = restart;
		self
	}

	pub fn intensity(mut self, max_restarts: usize, window: Duration) -> Self {
		self.max_restarts = max_restarts;
		self.window = window;
		self
	}

	pub fn child(mut self, options: Options) -> Self {
		self.child = options;
		self
	}
}

pub struct SupervisorSpec<A: Actor> {
	spec: A::Spec,
	config: SupervisorConfig,
	current: Arc<ArcSwap<Proxy<A>>>,
}

enum Decision {
	Ignore,
	Restart,
	Stop,
	GiveUp,
}

/// Keeps one actor of type `A` running.
///
/// The supervisor is an actor itself: it links to its child and traps the
/// child's exit notice, then spawns a fresh child from a clone of the
/// original spec. The current incarnation is published through
/// [`Supervised`].
pub struct Supervisor<A: Actor> {
	spec: A::Spec,
	config: SupervisorConfig,
	current: Arc<ArcSwap<Proxy<A>>>,
	recent: VecDeque<Instant>,
	restarts: usize,
}

impl<A: Actor> Supervisor<A>
where
	A::Spec: Clone,
{
	/// Spawns the child, then a supervisor watching it.
	pub fn start(spec: A::Spec, config: SupervisorConfig) -> Result<Supervised<A>, StartError> {
		let child = A::spawn_with(spec.clone(), config.child.clone())?;
		let current = Arc::new(ArcSwap::from_pointee(child));

		let supervisor = Self::spawn(SupervisorSpec {
			spec,
			config,
			current: current.clone(),
		});
		match supervisor {
			Ok(supervisor) => Ok(Supervised {
				supervisor,
				current,
			}),
			Err(err) => {
				current.load().kill();
				Err(err)
			}
		}
	}

	async fn restarts(task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		Ok(Value::from(task.with(|sup| sup.restarts)))
	}

	async fn child_id(task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		let id = task.with(|sup| sup.current.load().id());
		Ok(Value::Int(id.get() as i64))
	}

	async fn child_exited(task: Task<Self>, notice: ExitNotice) -> Result<(), Failure> {
		match task.with(|sup| sup.decide(&notice)) {
			Decision::Ignore => Ok(()),
			Decision::Stop => {
				tracing::info!(child = %notice.from, reason = %notice.reason, "Child exited, not restarting");
				task.terminate();
				Ok(())
			}
			Decision::GiveUp => {
				let max = task.with(|sup| sup.config.max_restarts);
				Err(Failure::new(
					"RestartIntensity",
					format!("child restarted more than {max} times, last exit: {}", notice.reason),
				))
			}
			Decision::Restart => {
				let (spec, options) = task.with(|sup| (sup.spec.clone(), sup.config.child.clone()));
				let child = A::spawn_with(spec, options)?;
				tracing::warn!(
					old = %notice.from,
					new = %child.id(),
					reason = %notice.reason,
					"Restarting child"
				);
				task.link(child.address());
				task.with(|sup| {
					sup.current.store(Arc::new(child));
					sup.restarts += 1;
				});
				metrics::counter!("actor_restarts_total").increment(1);
				Ok(())
			}
		}
	}

	fn decide(&mut self, notice: &ExitNotice) -> Decision {
		if notice.from != self.current.load().id() {
			return Decision::Ignore;
		}

		let restart = match self.config.restart {
			Restart::Permanent => true,
			Restart::Transient => notice.reason.is_abnormal(),
			Restart::Temporary => false,
		};
		if !restart {
			return Decision::Stop;
		}

		let now = Instant::now();
		while let Some(oldest) = self.recent.front() {
			if now.duration_since(*oldest) > self.config.window {
				self.recent.pop_front();
			} else {
				break;
			}
		}
		if self.recent.len() >= self.config.max_restarts {
			return Decision::GiveUp;
		}
		self.recent.push_back(now);
		Decision::Restart
	}
}

impl<A: Actor> Actor for Supervisor<A>
where
	A::Spec: Clone,
{
	type Spec = SupervisorSpec<A>;

	fn init(ctx: Init<Self>) -> Result<Self, Failure> {
		let SupervisorSpec {
			spec,
			config,
			current,
		} = ctx.spec;
		ctx.proxy.link(current.load().address());

		Ok(Self {
			spec,
			config,
			current,
			recent: VecDeque::new(),
			restarts: 0,
		})
	}

	fn methods(methods: &mut Methods<Self>) {
		methods
			.method("restarts", 0, Self::restarts)
			.method("child_id", 0, Self::child_id)
			.trap_exit(Self::child_exited);
	}

	fn span(_spec: &Self::Spec) -> tracing::Span {
		tracing::info_span!("supervisor", child = type_name::<A>())
	}

	fn finalize(&mut self, reason: &ExitReason) {
		tracing::debug!(%reason, "Supervisor stopping its child");
		self.current.load().terminate();
	}
}

/// Handle to a supervised actor: always points at the live incarnation.
pub struct Supervised<A: Actor>
where
	A::Spec: Clone,
{
	supervisor: Proxy<Supervisor<A>>,
	current: Arc<ArcSwap<Proxy<A>>>,
}

impl<A: Actor> Clone for Supervised<A>
where
	A::Spec: Clone,
{
	fn clone(&self) -> Self {
		Self {
			supervisor: self.supervisor.clone(),
			current: self.current.clone(),
		}
	}
}

impl<A: Actor> Supervised<A>
where
	A::Spec: Clone,
{
	/// The current child. Calls made through a stale proxy after a restart
	/// fail with [`CallError::DeadActor`].
	pub fn actor(&self) -> Proxy<A> {
		Proxy::clone(&self.current.load())
	}

	pub fn supervisor(&self) -> &Proxy<Supervisor<A>> {
		&self.supervisor
	}

	pub async fn call(&self, method: &str, args: Args) -> Result<Value, CallError> {
		self.actor().call(method, args).await
	}

	/// Waits until the child is no longer `previous`.
	pub async fn wait_restart(&self, previous: ActorId, timeout: Duration) -> Option<Proxy<A>> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			let actor = self.actor();
			if actor.id() != previous {
				return Some(actor);
			}
			if tokio::time::Instant::now() >= deadline || !self.supervisor.alive() {
				return None;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	}
}
