mod actor;
mod address;
mod call;
mod chain;
mod error;
mod lifecycle;
mod link;
mod mailbox;
mod methods;
mod proxy;
mod registry;
mod supervisor;
mod task;
mod value;

pub mod countme;
pub mod cpu;

pub mod prelude {
	pub use super::actor::Actor;
	pub use super::actor::Init;
	pub use super::args;
	pub use super::error::CallError;
	pub use super::error::Failure;
	pub use super::methods::Methods;
	pub use super::proxy::Proxy;
	pub use super::task::Task;
	pub use super::value::Args;
	pub use super::value::Value;
}

pub use actor::Actor;
pub use actor::Init;
pub use actor::Options;
pub use address::ActorId;
pub use address::Address;
pub use call::CallKind;
pub use chain::ChainId;
pub use error::Arity;
pub use error::CallError;
pub use error::Failure;
pub use error::StartError;
pub use lifecycle::Status;
pub use link::ExitNotice;
pub use link::ExitReason;
pub use methods::Methods;
pub use proxy::Proxy;
pub use registry::Registered;
pub use registry::Registry;
pub use supervisor::Restart;
pub use supervisor::Supervised;
pub use supervisor::Supervisor;
pub use supervisor::SupervisorConfig;
pub use supervisor::SupervisorSpec;
pub use task::Task;
pub use value::Args;
pub use value::FromValue;
pub use value::Value;

pub fn spawn<A: Actor>(spec: A::Spec) -> Result<Proxy<A>, StartError> {
	A::spawn(spec)
}
