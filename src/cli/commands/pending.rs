//! `pending` command implementation.

use crate::cli::args::PendingAction;
use crate::core::store::Store;
use crate::models::catalog::PendingAnswer;
use crate::models::config::Config;
use anyhow::{bail, Result};
use colored::Colorize;

/// Execute pending subcommand.
pub async fn execute_pending(action: PendingAction, config: &Config) -> Result<()> {
    let store = Store::open(&config.database_path)?;
    match action {
        PendingAction::List => list(&store),
        PendingAction::Resolve { id, answer } => resolve(&store, id, &answer),
    }
}

fn list(store: &Store) -> Result<()> {
    let pending = store.pending_matches()?;
    if pending.is_empty() {
        println!("No titles waiting for review.");
        return Ok(());
    }

    for item in pending {
        let year = item.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        println!(
            "{} {}{} [{}]",
            format!("#{}", item.id).bold().cyan(),
            item.title.bold(),
            year,
            item.kind
        );
        for (i, c) in item.shortlist.iter().enumerate() {
            let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "????".to_string());
            println!("    {}. {} ({}) {}", i + 1, c.name, year, c.id.to_string().dimmed());
        }
    }
    println!();
    println!("Answer with: media-symlinker pending resolve <ID> <NUMBER|imdb-ttID>");
    Ok(())
}

fn resolve(store: &Store, id: i64, answer: &str) -> Result<()> {
    let Some(item) = store.get_pending(id)? else {
        bail!("No pending entry #{}", id);
    };
    let Some(parsed) = PendingAnswer::parse(answer, item.shortlist.len()) else {
        bail!(
            "'{}' is neither 1-{} nor a namespaced id",
            answer,
            item.shortlist.len()
        );
    };

    store.answer_pending(id, &parsed)?;
    let chosen = match &parsed {
        PendingAnswer::Index(i) => item
            .shortlist
            .get(*i)
            .map(|c| format!("{} ({})", c.name, c.id))
            .unwrap_or_default(),
        PendingAnswer::Id(ext) => ext.to_string(),
    };
    println!(
        "{} #{} {} -> {}",
        "Answered".green().bold(),
        id,
        item.title,
        chosen
    );
    println!("The next pass will place it.");
    Ok(())
}
