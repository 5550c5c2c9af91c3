//! Status command: recent sync runs, the operator's window into the
//! pipeline.

use console::style;

use crate::config::Settings;
use crate::models::SyncRunStatus;
use crate::portal::urls::COUNTIES;
use crate::repository::SyncStore;

pub fn cmd_status(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let store = SyncStore::open(&settings.database_path())?;

    println!(
        "{} facilities on record",
        store.facilities.count()?
    );

    let runs = store.runs.recent(limit)?;
    if runs.is_empty() {
        println!("No sync runs recorded yet.");
        return Ok(());
    }

    for run in runs {
        let glyph = match run.status {
            SyncRunStatus::Success => style("✓").green(),
            SyncRunStatus::Failed => style("✗").red(),
            SyncRunStatus::Running => style("→").cyan(),
        };
        let finished = run
            .finished_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} #{} {} started {} finished {} | checked {} added {} updated {} inspections {}",
            glyph,
            run.id,
            run.run_type.as_str(),
            run.started_at.format("%Y-%m-%d %H:%M"),
            finished,
            run.counters.checked,
            run.counters.added,
            run.counters.updated,
            run.counters.inspections_added,
        );
        if let Some(ref error) = run.error_message {
            println!("    {} {}", style("!").yellow(), error);
        }
    }
    Ok(())
}

pub fn cmd_counties() {
    for county in COUNTIES {
        println!("{county}");
    }
}
