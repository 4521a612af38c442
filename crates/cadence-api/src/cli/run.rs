//! Long-running mode: arm schedules, run cleanup, wait for a signal.

use std::future::Future;

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Run the runtime in the foreground until `shutdown` resolves.
///
/// The caller performs the actual shutdown afterwards, which drains
/// background work and flushes the memory store.
pub async fn run(state: &AppState, quiet: bool, shutdown: impl Future<Output = ()>) -> Result<()> {
    state.store.spawn_cleanup_loop();
    let armed = state.manager.arm_schedules(&state.config.schedules);
    let skipped = state.config.schedules.len() - armed;

    tracing::info!(
        data_dir = %state.data_dir.display(),
        schedules = armed,
        skipped,
        "cadence runtime started"
    );

    if !quiet {
        println!();
        println!(
            "  {} Cadence running: {} skill(s) active, {} schedule(s) armed",
            style("▶").green().bold(),
            style(state.manager.stats().active_skills).bold(),
            style(armed).bold(),
        );
        if skipped > 0 {
            println!(
                "  {} {} configured schedule(s) skipped, see logs",
                style("!").yellow().bold(),
                skipped
            );
        }
        println!("  Press Ctrl+C to stop.");
        println!();
    }

    shutdown.await;
    tracing::info!("shutdown signal received");

    if !quiet {
        let stats = state.manager.stats();
        println!();
        println!(
            "  {} Stopping after {} execution(s), {} scheduled run(s)",
            style("■").dim(),
            stats.submitted,
            stats.scheduled_runs,
        );
    }
    Ok(())
}
