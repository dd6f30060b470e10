//! Per-type accounting of actor threads.
//!
//! Every actor thread holds a [`Count`] for its actor type while it runs,
//! which makes leaked or runaway actors visible through [`live`] and
//! [`report_string`].

use std::any::TypeId;
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

#[derive(Debug)]
struct Stats {
	type_name: &'static str,
	total: AtomicUsize,
	max_live: AtomicUsize,
	live: AtomicUsize,
}

impl Stats {
	fn new(type_name: &'static str) -> Self {
		Self {
			type_name,
			total: AtomicUsize::new(0),
			max_live: AtomicUsize::new(0),
			live: AtomicUsize::new(0),
		}
	}
}

static COUNTS: OnceLock<DashMap<TypeId, Stats>> = OnceLock::new();

fn counts() -> &'static DashMap<TypeId, Stats> {
	COUNTS.get_or_init(DashMap::new)
}

/// Guard counting one running instance of `T`.
#[derive(Debug)]
pub(crate) struct Count<T: 'static> {
	_phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Count<T> {
	pub fn new() -> Self {
		let entry = counts()
			.entry(TypeId::of::<T>())
			.or_insert_with(|| Stats::new(type_name::<T>()));

		entry.total.fetch_add(1, Ordering::Relaxed);
		let live = entry.live.fetch_add(1, Ordering::Relaxed) + 1;
		entry.max_live.fetch_max(live, Ordering::Relaxed);

		Self {
			_phantom: PhantomData,
		}
	}
}

impl<T: 'static> Drop for Count<T> {
	fn drop(&mut self) {
		if let Some(entry) = counts().get(&TypeId::of::<T>()) {
			entry.live.fetch_sub(1, Ordering::Relaxed);
		}
	}
}

fn load(type_id: TypeId, read: impl Fn(&Stats) -> usize) -> usize {
	counts().get(&type_id).map(|entry| read(entry.value())).unwrap_or(0)
}

/// Actor threads of type `T` running right now.
pub fn live<T: 'static>() -> usize {
	load(TypeId::of::<T>(), |stats| stats.live.load(Ordering::Relaxed))
}

/// Actor threads of type `T` ever started.
pub fn total<T: 'static>() -> usize {
	load(TypeId::of::<T>(), |stats| stats.total.load(Ordering::Relaxed))
}

pub fn max_live<T: 'static>() -> usize {
	load(TypeId::of::<T>(), |stats| stats.max_live.load(Ordering::Relaxed))
}

struct Report {
	// sorted by type name
	by_type: BTreeMap<&'static str, (usize, usize, usize)>,
}

impl Report {
	fn new() -> Self {
		let by_type = counts()
			.iter()
			.map(|entry| {
				let stats = entry.value();
				(
					stats.type_name,
					(
						stats.total.load(Ordering::Relaxed),
						stats.max_live.load(Ordering::Relaxed),
						stats.live.load(Ordering::Relaxed),
					),
				)
			})
			.collect();
		Self { by_type }
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name_width = self
			.by_type
			.keys()
			.map(|k| k.len())
			.max()
			.unwrap_or(0)
			.max(5);
		let width = 12;

		writeln!(
			f,
			"{:<name_width$} {:>width$} {:>width$} {:>width$}",
			"actor", "total", "max_live", "live"
		)?;
		for (name, (total, max_live, live)) in &self.by_type {
			writeln!(
				f,
				"{name:<name_width$} {total:>width$} {max_live:>width$} {live:>width$}"
			)?;
		}
		Ok(())
	}
}

/// Table of total, peak and current actor threads per actor type.
pub fn report_string() -> String {
	Report::new().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Probe;

	#[test]
	fn counts_live_and_peak() {
		let first = Count::<Probe>::new();
		let second = Count::<Probe>::new();
		assert_eq!(live::<Probe>(), 2);
		drop(first);
		assert_eq!(live::<Probe>(), 1);
		assert_eq!(max_live::<Probe>(), 2);
		assert_eq!(total::<Probe>(), 2);
		drop(second);
		assert_eq!(live::<Probe>(), 0);

		let report = report_string();
		assert!(report.contains("Probe"));
		assert!(report.starts_with("actor"));
	}

	#[test]
	fn unknown_type_is_zero() {
		struct Never;
		assert_eq!(live::<Never>(), 0);
		assert_eq!(total::<Never>(), 0);
	}
}
