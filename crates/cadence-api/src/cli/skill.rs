//! Skill CLI commands: list, exec, extra, schedule, schedules.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use cadence_core::skill::SkillContext;
use cadence_types::skill::{
    Caller, ExecutionMode, ExtraOperation, ScheduleInfo, SkillResult, SkillState,
};

use crate::cli::memory::truncate;
use crate::state::AppState;

/// Platform label recorded on CLI-originated executions.
const PLATFORM: &str = "cli";

/// List registered skills in initialization order.
pub fn list_skills(state: &AppState, json: bool) -> Result<()> {
    let skills = state.manager.list_skills();

    if json {
        println!("{}", serde_json::to_string_pretty(&skills)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Version").fg(Color::White),
        Cell::new("State").fg(Color::White),
        Cell::new("Depends on").fg(Color::White),
        Cell::new("Description").fg(Color::White),
    ]);

    for info in &skills {
        let meta = &info.metadata;
        let deps = if meta.dependencies.is_empty() {
            "-".to_string()
        } else {
            meta.dependencies.join(", ")
        };
        let description = match &info.last_error {
            Some(reason) => format!("{} ({reason})", meta.description),
            None => meta.description.clone(),
        };

        table.add_row(vec![
            Cell::new(&meta.name).fg(Color::Cyan),
            Cell::new(&meta.version).fg(Color::DarkGrey),
            state_cell(info.state),
            Cell::new(deps).fg(Color::DarkGrey),
            Cell::new(truncate(&description, 70)).fg(Color::White),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Execute a skill in the requested mode.
///
/// Queued requests are awaited through their result handle, so the printed
/// outcome is the run itself rather than the acknowledgement. Background
/// requests are awaited by shutdown.
///
/// # Examples
///
/// ```bash
/// cadence skill exec note --input "call the plumber" -p importance=8
/// cadence skill exec recall --input plumber --mode queued
/// ```
pub async fn exec_skill(
    state: &AppState,
    name: &str,
    input: String,
    mode: ExecutionMode,
    params: Vec<(String, serde_json::Value)>,
    user: String,
    json: bool,
) -> Result<()> {
    if mode == ExecutionMode::Scheduled {
        bail!("use `cadence skill schedule` to run a skill on an interval");
    }

    let ctx = SkillContext::new(Caller::new(user, PLATFORM), input).with_params(params.into_iter().collect());

    let result = if mode == ExecutionMode::Queued {
        let request_id = ctx.request_id;
        match state.manager.enqueue_with_handle(name, ctx) {
            Ok(handle) => handle.await.unwrap_or_else(|_| {
                SkillResult::failure(
                    request_id,
                    name,
                    mode,
                    "queued request was dropped before it ran",
                    0,
                )
            }),
            Err(ack) => ack,
        }
    } else {
        state.manager.execute(name, ctx, mode).await
    };

    print_result(&result, json)?;
    if !result.success {
        bail!("skill '{name}' failed");
    }
    Ok(())
}

/// Run an optional operation described as JSON.
///
/// # Examples
///
/// ```bash
/// cadence skill extra echo '{"operation":"summarization","text":"One. Two. Three.","max_sentences":1}'
/// ```
pub async fn exec_extra(state: &AppState, name: &str, operation: &str, json: bool) -> Result<()> {
    let operation: ExtraOperation =
        serde_json::from_str(operation).context("invalid operation JSON")?;
    let ctx = SkillContext::new(Caller::new("cli", PLATFORM), "");

    let result = state.manager.execute_extra(name, operation, ctx).await;
    print_result(&result, json)?;
    if !result.success {
        bail!("operation on '{name}' failed");
    }
    Ok(())
}

/// Schedule a skill and keep the process alive until `shutdown` resolves
/// or the schedule runs out.
pub async fn schedule_skill(
    state: &AppState,
    name: &str,
    every: u64,
    max_runs: Option<u32>,
    input: String,
    json: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut params = serde_json::Map::new();
    if !input.is_empty() {
        params.insert("input".to_string(), serde_json::Value::String(input));
    }

    if !state
        .manager
        .schedule_skill(name, Duration::from_secs(every), max_runs, params, true)
    {
        bail!("could not schedule '{name}' (unknown, inactive, or zero interval)");
    }

    if !json {
        println!();
        println!(
            "  {} Running {} every {}s{}. Press Ctrl+C to stop.",
            style("▶").green().bold(),
            style(name).cyan(),
            every,
            max_runs.map(|n| format!(" for {n} runs")).unwrap_or_default(),
        );
        println!();
    }

    let exhausted = async {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let done = state
                .manager
                .list_schedules()
                .iter()
                .find(|s| s.skill == name)
                .is_none_or(|s| !s.enabled);
            if done {
                break;
            }
        }
    };

    tokio::select! {
        _ = shutdown => {}
        _ = exhausted => {}
    }

    let schedules: Vec<ScheduleInfo> = state
        .manager
        .list_schedules()
        .into_iter()
        .filter(|s| s.skill == name)
        .collect();
    state.manager.cancel_schedule(name);

    if json {
        println!("{}", serde_json::to_string_pretty(&schedules)?);
    } else if let Some(info) = schedules.first() {
        println!("  Completed {} run(s) of {}", style(info.runs).bold(), style(name).cyan());
        println!();
    }
    Ok(())
}

/// Show the schedules declared in configuration and the live table.
pub fn list_schedules(state: &AppState, json: bool) -> Result<()> {
    let configured = &state.config.schedules;
    let live = state.manager.list_schedules();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "configured": configured,
                "active": live,
            }))?
        );
        return Ok(());
    }

    if configured.is_empty() {
        println!();
        println!(
            "  {} No schedules configured. Add [[schedules]] entries to config.toml.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Skill").fg(Color::White),
        Cell::new("Every").fg(Color::White),
        Cell::new("Max runs").fg(Color::White),
        Cell::new("Start now").fg(Color::White),
        Cell::new("Skill state").fg(Color::White),
    ]);

    for schedule in configured {
        let state_cell = match state.manager.skill_state(&schedule.skill) {
            Some(skill_state) => state_cell(skill_state),
            None => Cell::new("unknown").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&schedule.skill).fg(Color::Cyan),
            Cell::new(format!("{}s", schedule.interval_secs)),
            Cell::new(
                schedule
                    .max_runs
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "∞".to_string()),
            ),
            Cell::new(if schedule.start_now { "yes" } else { "no" }).fg(Color::DarkGrey),
            state_cell,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_result(result: &SkillResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!();
    if result.success {
        println!(
            "  {} {} ({}, {}ms)",
            style("✓").green().bold(),
            style(&result.skill).cyan(),
            result.mode,
            result.execution_time_ms,
        );
        if let Some(output) = &result.output {
            println!();
            for line in serde_json::to_string_pretty(output)?.lines() {
                println!("  {line}");
            }
        }
    } else {
        println!(
            "  {} {} ({}): {}",
            style("✗").red().bold(),
            style(&result.skill).cyan(),
            result.mode,
            result.error.as_deref().unwrap_or("unknown error"),
        );
    }
    println!();
    Ok(())
}

fn state_cell(state: SkillState) -> Cell {
    let color = match state {
        SkillState::Active => Color::Green,
        SkillState::Loading => Color::Yellow,
        SkillState::Inactive | SkillState::Disabled => Color::DarkGrey,
        SkillState::Error => Color::Red,
    };
    Cell::new(state.to_string()).fg(color)
}

#[cfg(test)]
mod tests {
    use cadence_types::config::RuntimeConfig;

    use super::*;

    #[tokio::test]
    async fn test_queued_exec_reports_the_run_not_the_acknowledgement() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(dir.path().to_path_buf(), RuntimeConfig::default())
            .await
            .unwrap();

        let empty_note = exec_skill(
            &state,
            "note",
            String::new(),
            ExecutionMode::Queued,
            vec![],
            "tester".to_string(),
            true,
        )
        .await;
        assert!(empty_note.is_err());

        exec_skill(
            &state,
            "note",
            "water the plants".to_string(),
            ExecutionMode::Queued,
            vec![],
            "tester".to_string(),
            true,
        )
        .await
        .unwrap();
        assert_eq!(state.manager.stats().failed, 1);
        assert_eq!(state.manager.stats().succeeded, 1);
        state.shutdown().await.unwrap();
    }
}
