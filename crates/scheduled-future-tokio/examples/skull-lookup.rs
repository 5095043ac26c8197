//! Skull lookup demo
//!
//! Resolves player skins off the primary thread and hands the finished skull
//! items back to the primary thread, the way a server plugin would.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p scheduled-future-tokio --example skull-lookup -- Notch jeb_
//! ```

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use scheduled_future::{AsyncTask, Scheduler, TaskError};
use scheduled_future_tokio::{TokioScheduler, TokioSchedulerConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "skull-lookup")]
#[command(about = "Resolve player skulls on worker threads")]
struct Args {
    /// Player names to resolve
    #[arg(required = true)]
    players: Vec<String>,

    /// Simulated lookup latency in milliseconds
    #[arg(long, default_value_t = 100)]
    latency_ms: u64,
}

#[derive(Debug, Clone)]
struct Skin {
    owner: String,
    texture: String,
}

fn fetch_skin(player: &str, latency: Duration) -> Result<Skin, TaskError> {
    thread::sleep(latency);
    if player.is_empty() || !player.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TaskError::msg(format!("invalid player name '{player}'")));
    }
    Ok(Skin {
        owner: player.to_string(),
        texture: format!("textures/{:x}", player.len().wrapping_mul(0x5f37_59df)),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let scheduler = TokioScheduler::start(
        TokioSchedulerConfig::default().with_primary_thread_name("server-main"),
    )?;
    let latency = Duration::from_millis(args.latency_ms);

    let (done_tx, done_rx) = mpsc::channel();
    let mut tasks = Vec::new();
    for player in &args.players {
        let name = player.clone();
        let skull = AsyncTask::supply_async(scheduler.clone(), move || fetch_skin(&name, latency))
            .then_apply(|skin| Ok(format!("{}'s Head [{}]", skin.owner, skin.texture)));

        let observer = scheduler.clone();
        let done_tx = done_tx.clone();
        let player = player.clone();
        skull.when_complete(move |item, failure| {
            // Giving items to players is only allowed on the primary thread.
            let line = match (item, failure) {
                (_, Some(err)) => format!("{player}: lookup failed: {err}"),
                (Some(item), None) => format!("{player}: {item}"),
                (None, None) => format!("{player}: no skull"),
            };
            let _ = done_tx.send((line, observer.is_primary_thread()));
        });
        tasks.push(skull);
    }
    drop(done_tx);

    for (line, on_primary) in done_rx {
        info!(on_primary, "{line}");
        println!("{line}");
    }

    // Everything has settled; join just reads the frozen outcomes.
    let resolved = tasks.iter().filter(|task| task.join().is_ok()).count();
    println!("Resolved {resolved}/{} skulls", tasks.len());

    scheduler.shutdown();
    Ok(())
}
