use std::sync::OnceLock;

use dashmap::DashMap;
use downcast_rs::DowncastSync;

use crate::actor::Actor;
use crate::address::ActorId;
use crate::address::Address;
use crate::proxy::Proxy;

/// Anything that can sit in a [`Registry`]: a typed proxy with an address.
pub trait Registered: DowncastSync {
	fn address(&self) -> &Address;
}

downcast_rs::impl_downcast!(sync Registered);

impl<A: Actor> Registered for Proxy<A> {
	fn address(&self) -> &Address {
		Proxy::address(self)
	}
}

/// Name → actor lookup.
///
/// Actors spawned with [`crate::Options::name`] are registered in
/// [`Registry::global`] and removed again when they die, unless the name
/// has been taken over by another actor in the meantime.
#[derive(Default)]
pub struct Registry {
	actors: DashMap<String, Box<dyn Registered>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn global() -> &'static Registry {
		static GLOBAL: OnceLock<Registry> = OnceLock::new();
		GLOBAL.get_or_init(Registry::new)
	}

	/// Binds `name` to `proxy`, replacing any previous binding.
	pub fn register<A: Actor>(&self, name: impl Into<String>, proxy: &Proxy<A>) {
		let name = name.into();
		tracing::debug!(%name, actor = %proxy.id(), "Registering actor");
		if let Some(previous) = self.actors.insert(name.clone(), Box::new(proxy.clone())) {
			tracing::warn!(%name, previous = %previous.address().id(), "Registered name rebound");
		}
	}

	pub fn deregister(&self, name: &str) -> Option<Address> {
		self.actors
			.remove(name)
			.map(|(_, entry)| entry.address().clone())
	}

	/// Removes `name` only while it still points at `id`.
	pub(crate) fn deregister_actor(&self, name: &str, id: ActorId) {
		self.actors
			.remove_if(name, |_, entry| entry.address().id() == id);
	}

	/// Typed lookup. `None` when the name is unknown or bound to an actor of
	/// another type.
	pub fn get<A: Actor>(&self, name: &str) -> Option<Proxy<A>> {
		let entry = self.actors.get(name)?;
		entry.downcast_ref::<Proxy<A>>().cloned()
	}

	pub fn address(&self, name: &str) -> Option<Address> {
		self.actors
			.get(name)
			.map(|entry| entry.address().clone())
	}

	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.actors.iter().map(|entry| entry.key().clone()).collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.actors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.actors.is_empty()
	}
}
