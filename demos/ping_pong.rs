//! Two actors calling each other synchronously within one call chain.
//!
//! Run with `cargo run --example ping_pong`.

use runy_cell::args;
use runy_cell::prelude::*;

struct Player {
	name: &'static str,
	partner: Option<Proxy<Player>>,
	hits: i64,
}

impl Player {
	async fn meet(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let partner = args.any::<Proxy<Player>>(0)?;
		task.with(|player| player.partner = Some(partner));
		Ok(Value::Nil)
	}

	async fn ball(task: Task<Self>, args: Args) -> Result<Value, Failure> {
		let remaining = args.take::<i64>(0)?;
		let (name, partner) = task.with(|player| {
			player.hits += 1;
			(player.name, player.partner.clone())
		});
		println!("{name} hits the ball ({remaining} left) in chain {}", task.chain());

		match partner {
			Some(partner) if remaining > 0 => {
				Ok(task.call(&partner, "ball", args![remaining - 1]).await?)
			}
			_ => Ok(Value::from(name)),
		}
	}

	async fn hits(task: Task<Self>, _args: Args) -> Result<Value, Failure> {
		Ok(Value::from(task.with(|player| player.hits)))
	}
}

impl Actor for Player {
	type Spec = &'static str;

	fn init(ctx: Init<Self>) -> Result<Self, Failure> {
		Ok(Player {
			name: ctx.spec,
			partner: None,
			hits: 0,
		})
	}

	fn methods(methods: &mut Methods<Self>) {
		methods
			.method("meet", 1, Self::meet)
			.method("ball", 1, Self::ball)
			.method("hits", 0, Self::hits);
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt().init();
	println!("{} processors available", runy_cell::cpu::cores());

	let ping = Player::spawn("ping")?;
	let pong = Player::spawn("pong")?;
	ping.call("meet", args![Value::any(pong.clone())]).await?;
	pong.call("meet", args![Value::any(ping.clone())]).await?;

	let last = ping.call("ball", args![6]).await?;
	println!("last hit by {last:?}");
	println!(
		"ping: {:?} hits, pong: {:?} hits",
		ping.call("hits", args![]).await?,
		pong.call("hits", args![]).await?
	);

	// the two players reference each other, so stop them explicitly
	ping.terminate_and_wait().await;
	pong.terminate_and_wait().await;
	print!("{}", runy_cell::countme::report_string());
	Ok(())
}
