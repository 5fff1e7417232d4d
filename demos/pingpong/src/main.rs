//! pingpong — smallest demo for the rust_evsim scheduler.
//!
//! Two simulation threads trade a ball through pulse events while a referee
//! waits for both to leave the table.  Every print goes through the
//! marshaller, so output always comes from the manager thread.  A native
//! scoreboard thread outside the simulation asks for the final score the
//! same way.
//!
//! The rally length is drawn from the pinger's RNG; rerun with the same
//! `SEED` and the transcript is identical.  `RUST_LOG=es_sim=trace` shows
//! every state transition.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use es_sim::{Event, SimulationManager, ThreadContext, ThreadResult};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:      u64   = 42;
const MIN_RALLY: usize = 3;
const MAX_RALLY: usize = 9;

// ── Players ───────────────────────────────────────────────────────────────────

struct Table {
    ping:    Event,
    pong:    Event,
    over:    Event,
    strokes: AtomicUsize,
}

fn say(ctx: &ThreadContext, line: String) -> ThreadResult {
    ctx.marshal(move || println!("{line}"))?;
    Ok(())
}

fn pinger(table: Arc<Table>) -> impl FnOnce(&ThreadContext) -> ThreadResult + Send + 'static {
    move |ctx| {
        let rally = ctx.random().gen_range(MIN_RALLY..=MAX_RALLY);
        say(ctx, format!("{}: serving a rally of {rally}", ctx.name()))?;
        for stroke in 1..=rally {
            table.strokes.fetch_add(1, Ordering::Relaxed);
            say(ctx, format!("{:>3}  ping", stroke))?;
            ctx.notify_of(&table.ping);
            ctx.wait_for(&table.pong)?;
        }
        ctx.notify_of(&table.over);
        Ok(())
    }
}

fn ponger(table: Arc<Table>) -> impl FnOnce(&ThreadContext) -> ThreadResult + Send + 'static {
    move |ctx| {
        loop {
            ctx.wait_for_any([table.ping.clone(), table.over.clone()])?;
            if table.over.has_occurred() {
                return Ok(());
            }
            table.strokes.fetch_add(1, Ordering::Relaxed);
            say(ctx, "       pong".to_string())?;
            ctx.notify_of(&table.pong);
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let manager = SimulationManager::builder()
        .name("pingpong")
        .seed(SEED)
        .build()
        .context("building simulation manager")?;

    let table = Arc::new(Table {
        ping:    Event::pulse("ping"),
        pong:    Event::pulse("pong"),
        over:    Event::step("rally.over"),
        strokes: AtomicUsize::new(0),
    });

    // The ponger must be waiting before the first serve.
    let pong_thread = manager.fork("ponger", ponger(Arc::clone(&table)))?;
    let ping_thread = manager.fork("pinger", pinger(Arc::clone(&table)))?;
    manager.fork("referee", move |ctx| {
        ctx.join_all(&[ping_thread, pong_thread])?;
        say(ctx, format!("{}: both players have left the table", ctx.name()))
    })?;

    manager.execute_threads().context("running the rally")?;
    anyhow::ensure!(
        !manager.has_active_threads()?,
        "threads still blocked after the rally: {:?}",
        manager.active_threads()
    );

    // ── Scoreboard from outside the simulation ────────────────────────────
    let handle = manager.marshal_handle();
    let scoreboard_table = Arc::clone(&table);
    let scoreboard = thread::spawn(move || {
        handle.call(move || scoreboard_table.strokes.load(Ordering::Relaxed))
    });
    while !scoreboard.is_finished() {
        if manager.process_calls()? == 0 {
            thread::yield_now();
        }
    }
    let strokes = scoreboard
        .join()
        .map_err(|_| anyhow::anyhow!("scoreboard thread panicked"))??;

    info!(manager = %manager, strokes, "rally finished");
    println!("total strokes: {strokes}");
    Ok(())
}
