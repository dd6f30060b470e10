mod common;

use std::time::Duration;

use common::Counter;
use common::TestError;
use common::init_tracing;
use pretty_assertions::assert_eq;
use runy_cell::Actor;
use runy_cell::Arity;
use runy_cell::CallError;
use runy_cell::Options;
use runy_cell::Value;
use runy_cell::args;

#[tokio::test]
async fn test_sync_call_returns_value() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(5)?;

	assert_eq!(counter.call("add", args![3]).await?, Value::Int(8));
	assert_eq!(counter.call("get", args![]).await?, Value::Int(8));
	assert_eq!(counter.call("sum", args![1, 2, 3]).await?, Value::Int(6));
	assert_eq!(counter.call("sum", args![]).await?, Value::Int(0));

	counter.terminate_and_wait().await;
	Ok(())
}

#[tokio::test]
async fn test_dispatch_errors_never_reach_the_mailbox() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;
	counter.call("get", args![]).await?;
	let before = counter.enqueued();

	let err = counter.call("missing", args![]).await.unwrap_err();
	assert!(matches!(err, CallError::NoMethod { ref method } if method == "missing"));
	assert!(err.is_dispatch());

	let err = counter.call("get", args![1]).await.unwrap_err();
	match err {
		CallError::InvalidArguments {
			method,
			expected,
			given,
		} => {
			assert_eq!(method, "get");
			assert_eq!(expected, Arity::Exact(0));
			assert_eq!(given, 1);
		}
		other => panic!("unexpected error {other:?}"),
	}
	assert!(counter.cast("add", args![]).is_err());

	assert_eq!(counter.enqueued(), before);
	assert!(counter.responds_to("add"));
	assert!(!counter.responds_to("missing"));
	assert_eq!(counter.call("get", args![]).await?, Value::Int(0));
	Ok(())
}

#[tokio::test]
async fn test_mistyped_argument_aborts_without_crashing() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(1)?;

	let err = counter.call("add", args!["one"]).await.unwrap_err();
	let failure = err.failure().expect("execution failure");
	assert!(failure.is_abort());
	assert_eq!(failure.kind(), "ArgumentError");

	assert!(counter.alive());
	assert_eq!(counter.call("get", args![]).await?, Value::Int(1));
	Ok(())
}

#[tokio::test]
async fn test_failure_reaches_caller_and_crashes_actor() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;

	let err = counter.call("fail", args![]).await.unwrap_err();
	let failure = err.failure().expect("execution failure");
	assert!(!failure.is_abort());
	assert_eq!(
		failure.downcast_ref::<TestError>(),
		Some(&TestError::Boom("kaput".to_string()))
	);

	let reason = counter.join().await;
	assert!(reason.is_abnormal());
	assert!(!counter.alive());
	assert!(matches!(
		counter.call("get", args![]).await,
		Err(CallError::DeadActor)
	));
	Ok(())
}

#[tokio::test]
async fn test_abort_keeps_actor_alive() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(3)?;

	let err = counter.call("abort", args![]).await.unwrap_err();
	assert!(err.failure().is_some_and(|failure| failure.is_abort()));
	assert_eq!(err.to_string(), "RuntimeError: bad input");

	assert_eq!(counter.call("add", args![1]).await?, Value::Int(4));
	Ok(())
}

#[tokio::test]
async fn test_panic_is_an_execution_failure() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;

	let err = counter.call("explode", args![]).await.unwrap_err();
	let failure = err.failure().expect("execution failure");
	assert_eq!(failure.kind(), "panic");
	assert_eq!(failure.message(), "exploded in handler");

	assert!(counter.join().await.is_abnormal());
	Ok(())
}

#[tokio::test]
async fn test_casts_run_in_order() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;

	for _ in 0..10 {
		counter.cast("add", args![1])?;
	}
	assert_eq!(counter.call("get", args![]).await?, Value::Int(10));
	Ok(())
}

#[tokio::test]
async fn test_failed_cast_crashes_actor() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;
	counter.cast("fail", args![])?;

	let reason = tokio::time::timeout(Duration::from_secs(5), counter.join()).await?;
	let failure = reason.failure().expect("abnormal exit");
	assert_eq!(failure.kind(), std::any::type_name::<TestError>());
	Ok(())
}

#[tokio::test]
async fn test_cast_to_dead_actor_is_silent() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;
	counter.terminate_and_wait().await;

	assert!(counter.cast("add", args![1]).is_ok());
	assert!(matches!(
		counter.call("add", args![1]).await,
		Err(CallError::DeadActor)
	));
	Ok(())
}

#[tokio::test]
async fn test_concurrent_callers_are_serialized() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;

	let mut handles = Vec::new();
	for _ in 0..8 {
		let counter = counter.clone();
		handles.push(tokio::spawn(async move {
			for _ in 0..25 {
				counter.call("add", args![1]).await?;
			}
			Ok::<_, CallError>(())
		}));
	}
	for handle in handles {
		handle.await??;
	}

	assert_eq!(counter.call("get", args![]).await?, Value::Int(200));
	Ok(())
}

#[tokio::test]
async fn test_call_timeout_leaves_actor_usable() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(0)?;

	let err = counter
		.call_timeout("nap", args![500], Duration::from_millis(50))
		.await
		.unwrap_err();
	assert!(matches!(err, CallError::Timeout(_)));

	// sleeping holds nothing, the actor keeps serving
	let value = counter
		.call_timeout("add", args![2], Duration::from_millis(200))
		.await?;
	assert_eq!(value, Value::Int(2));
	Ok(())
}

#[tokio::test]
async fn test_default_timeout_from_options() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn_with(0, Options::new().call_timeout(Duration::from_millis(50)))?;
	assert_eq!(counter.timeout(), Some(Duration::from_millis(50)));

	let err = counter.call("nap", args![300]).await.unwrap_err();
	assert!(matches!(err, CallError::Timeout(_)));

	let patient = counter.with_timeout(Duration::from_secs(5));
	assert_eq!(patient.call("nap", args![10]).await?, Value::Nil);
	Ok(())
}

#[test]
fn test_call_blocking_from_plain_thread() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn(5)?;

	let remote = counter.clone();
	let value = std::thread::spawn(move || remote.call_blocking("add", args![2]))
		.join()
		.expect("caller thread");
	assert_eq!(value?, Value::Int(7));

	counter.terminate();
	Ok(())
}

#[test]
fn test_call_blocking_honors_proxy_timeout() -> anyhow::Result<()> {
	init_tracing();
	let counter = Counter::spawn_with(0, Options::new().call_timeout(Duration::from_millis(100)))?;

	let remote = counter.clone();
	let result = std::thread::spawn(move || remote.call_blocking("wait", args!["never"]))
		.join()
		.expect("caller thread");
	assert!(matches!(result, Err(CallError::Timeout(limit)) if limit == Duration::from_millis(100)));

	// the actor keeps serving while that call stays parked
	let patient = counter.with_timeout(Duration::from_secs(5));
	assert_eq!(patient.call_blocking("add", args![4])?, Value::Int(4));

	counter.terminate();
	Ok(())
}
