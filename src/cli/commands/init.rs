//! Init command: create the data directory and database.

use console::style;

use crate::config::Settings;
use crate::repository::SyncStore;

pub fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let db_path = settings.database_path();
    SyncStore::open(&db_path)?;
    println!(
        "{} Initialized database at {}",
        style("✓").green(),
        db_path.display()
    );
    Ok(())
}
