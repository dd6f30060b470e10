mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use common::Counter;
use common::init_tracing;
use pretty_assertions::assert_eq;
use runy_cell::Value;
use runy_cell::args;
use runy_cell::prelude::*;

#[tokio::test]
async fn test_external_block_runs_in_caller() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;
	let runs = Arc::new(AtomicUsize::new(0));

	let seen = runs.clone();
	let result = counter
		.call_with_block("each", args![3], move |args| {
			seen.fetch_add(1, Ordering::SeqCst);
			Ok(Value::from(args.take::<i64>(0)? * 10))
		})
		.await?;

	assert_eq!(result, Value::from(vec![0, 10, 20]));
	assert_eq!(runs.load(Ordering::SeqCst), 3);
	Ok(())
}

#[tokio::test]
async fn test_missing_block_is_reported_to_caller() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;

	let err = counter.call("each", args![2]).await.unwrap_err();
	let failure = err.failure().expect("execution failure");
	assert_eq!(failure.kind(), "LocalJumpError");
	assert!(counter.alive());
	Ok(())
}

/// Feeds its own state from the blocks a counter yields to.
struct Collector {
	source: Proxy<Counter>,
	seen: Vec<i64>,
}

impl Collector {
	async fn collect(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let n = args.take::<i64>(0)?;
		let source = task.with(|collector| collector.source.clone());

		let inner = task.clone();
		let replies = task
			.call_with_block(&source, "each", args![n], move |args| {
				let index = args.take::<i64>(0)?;
				inner.with(|collector| collector.seen.push(index));
				Ok(Value::from(index + 1))
			})
			.await?;

		let seen = task.with(|collector| collector.seen.clone());
		Ok(Value::List(vec![Value::from(seen), replies]))
	}
}

impl Actor for Collector {
	type Spec = Proxy<Counter>;

	fn init(ctx: Init<Self>) -> Result<Self, Failure> {
		Ok(Collector {
			source: ctx.spec,
			seen: Vec::new(),
		})
	}

	fn methods(methods: &mut Methods<Self>) {
		methods.method("collect", 1, Self::collect);
	}
}

#[tokio::test]
async fn test_actor_block_runs_on_caller_thread() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;
	let collector = Collector::spawn(counter.clone())?;

	let result = collector.call("collect", args![3]).await?;
	assert_eq!(
		result,
		Value::List(vec![
			Value::from(vec![0, 1, 2]),
			Value::from(vec![1, 2, 3]),
		])
	);

	// both sides are idle again
	assert_eq!(counter.call("add", args![1]).await?, Value::Int(1));
	Ok(())
}
