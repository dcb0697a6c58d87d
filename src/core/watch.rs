//! Folder watch loop.
//!
//! Filesystem events under the source root trigger passes. The loop is
//! single-flight: events that arrive while a pass runs are coalesced into one
//! follow-up pass after the debounce window.

use crate::core::orchestrator::Orchestrator;
use crate::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;

/// Whether an event can change what a pass would do.
pub fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Wait until no event arrives for `window`. Returns `false` when the
/// event source is gone.
async fn settle(rx: &mut mpsc::UnboundedReceiver<()>, window: Duration) -> bool {
    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(())) => continue,
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}

/// Watch `source` and run a pass after each settled burst of events.
///
/// Returns when Ctrl-C is received or the orchestrator's cancel flag is set.
pub async fn watch_source(
    orchestrator: &Orchestrator,
    source: &Path,
    debounce: Duration,
) -> Result<()> {
    let cancel = orchestrator.cancel_flag();
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) if is_relevant(&event) => {
                tracing::debug!("Watch event: {:?} {:?}", event.kind, event.paths);
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Watch error: {}", e),
        },
        Config::default(),
    )?;
    watcher.watch(source, RecursiveMode::Recursive)?;
    tracing::info!("Watching {} (debounce {:?})", source.display(), debounce);

    loop {
        tokio::select! {
            received = rx.recv() => {
                if received.is_none() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                cancel.store(true, Ordering::SeqCst);
                break;
            }
        }

        if !settle(&mut rx, debounce).await || cancel.load(Ordering::SeqCst) {
            break;
        }

        tracing::info!("Changes detected, starting pass");
        let summary = orchestrator.run_pass().await?;
        summary.print();
        if summary.cancelled {
            break;
        }
    }

    tracing::info!("Watch loop stopped");
    Ok(())
}
