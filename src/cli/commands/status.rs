//! `status` command implementation.

use crate::core::store::Store;
use crate::models::catalog::UnaccountedOutcome;
use crate::models::config::Config;
use anyhow::Result;
use colored::Colorize;

/// Print state store counts and recent unaccounted failures.
pub async fn show_status(config: &Config) -> Result<()> {
    let store = Store::open(&config.database_path)?;
    let stats = store.stats()?;

    println!("{}", "Media Symlinker Status".bold().cyan());
    println!();
    println!("  Source:          {}", config.source_dir.display());
    println!("  Database:        {}", config.database_path.display());
    println!();
    println!(
        "  Catalog rows:    {} ({} pending)",
        stats.catalog_total,
        stats.catalog_pending.to_string().yellow()
    );
    println!("  Unaccounted:     {}", stats.unaccounted);
    println!("  Links:           {}", stats.links.to_string().green());
    println!("  Ignored sources: {}", stats.ignored);
    println!(
        "  Pending matches: {}",
        stats.pending_matches.to_string().yellow()
    );

    let failures: Vec<_> = store
        .unaccounted()?
        .into_iter()
        .filter(|r| r.outcome != UnaccountedOutcome::Linked)
        .collect();
    if !failures.is_empty() {
        println!();
        println!("{}", "Unplaced directories".bold());
        for record in failures.iter().take(20) {
            println!(
                "  {:<11} {} {}",
                record.outcome.as_str().red(),
                record.dir_name,
                record.error.as_deref().unwrap_or("").dimmed()
            );
        }
        if failures.len() > 20 {
            println!("  ... and {} more", failures.len() - 20);
        }
    }

    Ok(())
}
