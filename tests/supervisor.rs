mod common;

use std::time::Duration;

use common::Counter;
use common::init_tracing;
use pretty_assertions::assert_eq;
use runy_cell::Restart;
use runy_cell::Supervisor;
use runy_cell::SupervisorConfig;
use runy_cell::Value;
use runy_cell::args;

#[tokio::test]
async fn test_crashed_child_is_restarted_from_spec() -> anyhow::Result<()> {
	init_tracing();
	let supervised = Supervisor::<Counter>::start(10, SupervisorConfig::default())?;

	let first = supervised.actor();
	assert_eq!(first.call("add", args![5]).await?, Value::Int(15));
	assert!(first.call("fail", args![]).await.is_err());

	let second = supervised
		.wait_restart(first.id(), Duration::from_secs(5))
		.await
		.expect("child restarted");
	assert_ne!(second.id(), first.id());
	assert_eq!(second.call("get", args![]).await?, Value::Int(10));
	assert_eq!(supervised.call("add", args![1]).await?, Value::Int(11));

	let restarts = supervised.supervisor().call("restarts", args![]).await?;
	assert_eq!(restarts, Value::Int(1));
	let child = supervised.supervisor().call("child_id", args![]).await?;
	assert_eq!(child, Value::Int(second.id().get() as i64));
	Ok(())
}

#[tokio::test]
async fn test_transient_child_exiting_normally_stops_supervisor() -> anyhow::Result<()> {
	init_tracing();
	let config = SupervisorConfig::default().restart(Restart::Transient);
	let supervised = Supervisor::<Counter>::start(0, config)?;

	supervised.call("stop", args![]).await?;

	let reason = tokio::time::timeout(Duration::from_secs(5), supervised.supervisor().join()).await?;
	assert!(!reason.is_abnormal());
	Ok(())
}

#[tokio::test]
async fn test_restart_intensity_gives_up() -> anyhow::Result<()> {
	init_tracing();
	let config = SupervisorConfig::default().intensity(1, Duration::from_secs(10));
	let supervised = Supervisor::<Counter>::start(0, config)?;

	let first = supervised.actor();
	assert!(first.call("fail", args![]).await.is_err());
	let second = supervised
		.wait_restart(first.id(), Duration::from_secs(5))
		.await
		.expect("first restart");
	assert!(second.call("fail", args![]).await.is_err());

	let reason = tokio::time::timeout(Duration::from_secs(5), supervised.supervisor().join()).await?;
	let failure = reason.failure().expect("supervisor gave up");
	assert_eq!(failure.kind(), "RestartIntensity");
	Ok(())
}

#[tokio::test]
async fn test_stopping_supervisor_stops_child() -> anyhow::Result<()> {
	init_tracing();
	let supervised = Supervisor::<Counter>::start(0, SupervisorConfig::default())?;
	let child = supervised.actor();
	child.call("get", args![]).await?;

	supervised.supervisor().terminate_and_wait().await;

	let reason = tokio::time::timeout(Duration::from_secs(5), child.join()).await?;
	assert!(!reason.is_abnormal());
	Ok(())
}
