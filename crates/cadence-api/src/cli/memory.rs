//! Memory store CLI commands: add, query, get, update, delete, stats, cleanup.

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use cadence_types::memory::{MemoryEntry, MemoryQuery, MemoryUpdate, NewMemory, SortBy};

use crate::state::AppState;

/// Store a new entry.
///
/// # Examples
///
/// ```bash
/// cadence memory add "dentist on Tuesday" --tag health --importance 8
/// ```
pub async fn add_memory(
    state: &AppState,
    content: String,
    tags: Vec<String>,
    importance: i32,
    source: String,
    json: bool,
) -> Result<()> {
    if content.trim().is_empty() {
        bail!("memory content cannot be empty");
    }

    let id = state
        .store
        .store(NewMemory::new(content).tags(tags).importance(importance).source(source))
        .await;

    if json {
        println!("{}", serde_json::json!({ "id": id }));
        return Ok(());
    }

    println!();
    println!("  {} Stored memory {}", style("✓").green().bold(), style(&id).cyan());
    println!();
    Ok(())
}

/// Search entries and print them as a table.
///
/// # Examples
///
/// ```bash
/// cadence memory query rust --tag work --sort recency
/// ```
#[allow(clippy::too_many_arguments)]
pub fn query_memories(
    state: &AppState,
    keywords: Vec<String>,
    tags: Vec<String>,
    min_importance: Option<u8>,
    since_days: Option<i64>,
    limit: usize,
    sort: SortBy,
    json: bool,
) -> Result<()> {
    let mut query = MemoryQuery::new().limit(limit).sort_by(sort);
    query.keywords = keywords;
    query.tags = tags;
    if let Some(importance) = min_importance {
        query = query.min_importance(importance);
    }
    if let Some(days) = since_days {
        let now = Utc::now();
        query = query.between(now - Duration::days(days), now);
    }

    let memories = state.store.query(&query);

    if json {
        println!("{}", serde_json::to_string_pretty(&memories)?);
        return Ok(());
    }

    if memories.is_empty() {
        println!();
        println!("  {} No matching memories.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Content").fg(Color::White),
        Cell::new("Tags").fg(Color::White),
        Cell::new("Importance").fg(Color::White),
        Cell::new("Reads").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for mem in &memories {
        let tags = mem.tags.iter().cloned().collect::<Vec<_>>().join(", ");
        table.add_row(vec![
            Cell::new(short_id(&mem.id)).fg(Color::DarkGrey),
            Cell::new(truncate(&mem.content, 60)).fg(Color::White),
            Cell::new(tags).fg(Color::Cyan),
            Cell::new(format_importance(mem.importance)).fg(Color::Yellow),
            Cell::new(mem.access_count).fg(Color::DarkGrey),
            Cell::new(mem.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} memor{}",
        style(memories.len()).bold(),
        if memories.len() == 1 { "y" } else { "ies" }
    );
    println!();
    Ok(())
}

/// Show one entry in full.
pub fn show_memory(state: &AppState, id: &str, json: bool) -> Result<()> {
    let entry = state
        .store
        .get(id)
        .with_context(|| format!("Memory '{id}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    print_entry(&entry);
    Ok(())
}

/// Change content, tags, or importance of an entry.
pub async fn update_memory(
    state: &AppState,
    id: &str,
    content: Option<String>,
    tags: Vec<String>,
    importance: Option<i32>,
    json: bool,
) -> Result<()> {
    let update = MemoryUpdate {
        content,
        tags: if tags.is_empty() { None } else { Some(tags) },
        importance,
    };
    if update.is_empty() {
        bail!("nothing to update: pass --content, --tag, or --importance");
    }

    if !state.store.update(id, update).await {
        bail!("Memory '{id}' not found");
    }

    if json {
        println!("{}", serde_json::json!({ "id": id, "updated": true }));
        return Ok(());
    }

    println!();
    println!("  {} Updated memory {}", style("✓").green().bold(), style(id).cyan());
    println!();
    Ok(())
}

/// Delete an entry. Deleting an unknown id is reported, not an error.
pub async fn delete_memory(state: &AppState, id: &str, json: bool) -> Result<()> {
    let deleted = state.store.delete(id).await;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
        return Ok(());
    }

    println!();
    if deleted {
        println!("  {} Deleted memory {}", style("✓").green().bold(), style(id).cyan());
    } else {
        println!("  {} No memory with id {}", style("i").blue().bold(), style(id).cyan());
    }
    println!();
    Ok(())
}

/// Print usage statistics.
pub fn memory_stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.store.stats();
    let live = state.store.len();

    if json {
        let mut value = serde_json::to_value(&stats)?;
        value["live_entries"] = serde_json::json!(live);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let last_cleanup = stats
        .last_cleanup
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!();
    println!("  {}", style("── Memory ──").dim());
    println!("  Live entries:    {}", style(live).bold());
    println!("  Created (total): {}", stats.total_entries);
    println!("  Reads (total):   {}", stats.total_accesses);
    println!("  Cleanups:        {}", stats.cleanup_count);
    println!("  Last cleanup:    {last_cleanup} ({} removed)", stats.last_cleanup_deleted);
    println!();
    Ok(())
}

/// Run an eviction pass now.
pub async fn cleanup(state: &AppState, json: bool) -> Result<()> {
    let report = state.store.cleanup().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Removed {} stale and {} over-cap entr{}, {} remaining",
        style("✓").green().bold(),
        style(report.stale_deleted).bold(),
        style(report.cap_deleted).bold(),
        if report.cap_deleted == 1 { "y" } else { "ies" },
        report.remaining,
    );
    println!();
    Ok(())
}

fn print_entry(entry: &MemoryEntry) {
    let tags = entry.tags.iter().cloned().collect::<Vec<_>>().join(", ");
    println!();
    println!("  {}", style(&entry.id).cyan().bold());
    println!();
    println!("  {}", entry.content);
    println!();
    println!("  Tags:        {}", if tags.is_empty() { "-".to_string() } else { tags });
    println!("  Importance:  {} ({})", format_importance(entry.importance), entry.importance);
    println!("  Source:      {}", entry.source);
    println!("  Created:     {}", entry.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Updated:     {}", entry.updated_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Reads:       {}", entry.access_count);
    println!();
}

/// Five-star rendering of a 1-10 importance.
fn format_importance(level: u8) -> String {
    let stars = (level.min(10) as usize).div_ceil(2);
    let empty = 5 - stars;
    format!("{}{}", "*".repeat(stars), "-".repeat(empty))
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_importance() {
        assert_eq!(format_importance(1), "*----");
        assert_eq!(format_importance(5), "***--");
        assert_eq!(format_importance(10), "*****");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("héllo wörld, again", 8), "héllo...");
    }
}
