#![allow(dead_code)]

use std::time::Duration;

use runy_cell::Arity;
use runy_cell::args;
use runy_cell::prelude::*;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TestError {
	#[error("boom: {0}")]
	Boom(String),
}

/// Polls `check` until it holds or `timeout` passes.
pub async fn eventually<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
	let deadline = tokio::time::Instant::now() + timeout;
	while tokio::time::Instant::now() < deadline {
		if check() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	check()
}

#[derive(Debug)]
pub struct Counter {
	pub value: i64,
}

impl Counter {
	async fn get(task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		Ok(Value::from(task.with(|c| c.value)))
	}

	async fn add(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let n = args.take::<i64>(0)?;
		Ok(Value::from(task.with(|c| {
			c.value += n;
			c.value
		})))
	}

	async fn sum(_task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let mut total = 0;
		for index in 0..args.len() {
			total += args.take::<i64>(index)?;
		}
		Ok(Value::from(total))
	}

	async fn fail(_task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		Err(TestError::Boom("kaput".to_string()).into())
	}

	async fn abort(_task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		Err(Failure::msg("bad input").abort())
	}

	async fn explode(_task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		panic!("exploded in handler")
	}

	async fn stop(task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		task.terminate();
		Ok(Value::Nil)
	}

	async fn nap(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let ms = args.take::<i64>(0)?;
		task.sleep(Duration::from_millis(ms as u64)).await;
		Ok(Value::Nil)
	}

	async fn wait(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let name = args.take::<String>(0)?;
		Ok(task.wait(&name).await?)
	}

	/// Waits on a condition for `ms`; `false` when nobody signalled it.
	async fn wait_briefly(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let name = args.take::<String>(0)?;
		let ms = args.take::<i64>(1)?;
		match task.wait_timeout(&name, Duration::from_millis(ms as u64)).await {
			Err(CallError::Timeout(_)) => Ok(Value::Bool(false)),
			other => Ok(other?),
		}
	}

	async fn waiting(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let name = args.take::<String>(0)?;
		Ok(Value::from(task.waiting(&name)))
	}

	async fn signal(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let name = args.take::<String>(0)?;
		let value = args.take::<Value>(1)?;
		Ok(Value::from(task.signal(&name, value)))
	}

	/// Yields every index below `n` to the caller's block.
	async fn each(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let n = args.take::<i64>(0)?;
		if !task.has_block() {
			return Err(Failure::new("LocalJumpError", "no block given").abort());
		}
		let mut results = Vec::new();
		for index in 0..n {
			results.push(task.yield_block(args![index]).await?);
		}
		Ok(Value::List(results))
	}
}

impl Actor for Counter {
	type Spec = i64;

	fn init(ctx: Init<Self>) -> Result<Self, Failure> {
		Ok(Counter { value: ctx.spec })
	}

	fn methods(methods: &mut Methods<Self>) {
		methods
			.method("get", 0, Self::get)
			.method("add", 1, Self::add)
			.method("sum", Arity::AtLeast(0), Self::sum)
			.method("fail", 0, Self::fail)
			.method("abort", 0, Self::abort)
			.method("explode", 0, Self::explode)
			.method("stop", 0, Self::stop)
			.method("nap", 1, Self::nap)
			.method("wait", 1, Self::wait)
			.method("wait_briefly", 2, Self::wait_briefly)
			.method("waiting", 1, Self::waiting)
			.method("signal", 2, Self::signal)
			.method("each", 1, Self::each);
	}
}
