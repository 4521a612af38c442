//! Runtime status dashboard command.

use anyhow::Result;
use console::style;

use cadence_types::skill::SkillState;

use crate::state::AppState;

/// Display the runtime status dashboard.
///
/// Shows skill states, memory usage, execution counters, and version.
pub fn status(state: &AppState, json: bool) -> Result<()> {
    let skills = state.manager.list_skills();
    let count = |wanted: SkillState| skills.iter().filter(|s| s.state == wanted).count();
    let active = count(SkillState::Active);
    let inactive = count(SkillState::Inactive);
    let errored = count(SkillState::Error);

    let stats = state.manager.stats();
    let memory = state.store.stats();
    let live = state.store.len();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "skills": {
                "total": skills.len(),
                "active": active,
                "inactive": inactive,
                "error": errored,
            },
            "memory": {
                "live_entries": live,
                "usage": memory,
            },
            "manager": stats,
            "schedules_configured": state.config.schedules.len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Cadence v{}", style("⏱").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Skills ──").dim());
    println!("  Total:    {}", style(skills.len()).bold());
    println!("  Active:   {}", style(active).green());
    if inactive > 0 {
        println!("  Inactive: {}", style(inactive).yellow());
    }
    if errored > 0 {
        println!("  Error:    {}", style(errored).red());
    }
    println!("  Gate:     {} concurrent", stats.gate_capacity);
    println!();

    println!("  {}", style("── Memory ──").dim());
    println!("  Entries:  {}", style(live).bold());
    println!("  Reads:    {}", memory.total_accesses);
    println!("  Cleanups: {}", memory.cleanup_count);
    println!();

    println!("  {}", style("── Executions ──").dim());
    println!("  Submitted: {}", stats.submitted);
    println!("  Succeeded: {}", style(stats.succeeded).green());
    if stats.failed > 0 {
        println!("  Failed:    {}", style(stats.failed).red());
    }
    if stats.rejected > 0 {
        println!("  Rejected:  {}", style(stats.rejected).yellow());
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir:  {}", style(state.data_dir.display()).dim());
    println!(
        "  Scheduler: {}",
        style(if state.config.scheduler.enabled {
            format!(
                "every {}s, {} configured",
                state.config.scheduler.tick_secs,
                state.config.schedules.len()
            )
        } else {
            "disabled".to_string()
        })
        .dim()
    );
    println!();

    Ok(())
}
