//! Sync command: run the registry sync against the live portal.

use console::style;

use crate::config::Settings;
use crate::portal::urls::is_known_county;
use crate::portal::PortalNavigator;
use crate::repository::SyncStore;
use crate::sync::{SyncResult, SyncService};

pub async fn cmd_sync(settings: &Settings, county: Option<&str>) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let store = SyncStore::open(&settings.database_path())?;
    let service = SyncService::new(store, settings.sync.clone());
    let mut portal = PortalNavigator::new(settings.browser.clone());

    let result = match county {
        Some(county) => {
            if !is_known_county(county) {
                anyhow::bail!("unknown county '{county}'; see `dshs-sync counties`");
            }
            println!("{} Syncing {} county...", style("→").cyan(), county);
            service.sync_single_county(&mut portal, county).await
        }
        None => {
            println!("{} Syncing all counties...", style("→").cyan());
            service.full_sync(&mut portal).await
        }
    };

    print_result(&result);
    if result.success {
        Ok(())
    } else {
        anyhow::bail!(result
            .error
            .unwrap_or_else(|| "sync failed".to_string()))
    }
}

fn print_result(result: &SyncResult) {
    let glyph = if result.success {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!(
        "{} checked {}, added {}, updated {}, inspections {}",
        glyph, result.checked, result.added, result.updated, result.inspections
    );
    if let Some(ref error) = result.error {
        println!("  {} {}", style("!").yellow(), error);
    }
}
