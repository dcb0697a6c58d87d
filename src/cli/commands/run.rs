//! `run` and `watch` command implementations.

use crate::core::disambiguation::{DeferredDisambiguator, Disambiguator, InteractiveDisambiguator};
use crate::core::linker::Materializer;
use crate::core::orchestrator::{Orchestrator, PassSummary};
use crate::core::resolver::{Resolver, ResolverCache, ResolverOptions};
use crate::core::store::Store;
use crate::core::watch;
use crate::models::config::{Config, DisambiguationMode};
use crate::services::cinemeta::{CatalogSearch, CinemetaClient};
use crate::services::ffprobe::{self, Ffprobe, MediaProbe, NoProbe};
use crate::services::tmdb::{TmdbClient, TmdbConfig};
use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wire the pipeline from a configuration.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let store = Store::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open state store at {}",
            config.database_path.display()
        )
    })?;

    let search: Arc<dyn CatalogSearch> = Arc::new(CinemetaClient::new(&config.catalog)?);
    let disambiguator: Arc<dyn Disambiguator> = match config.resolver.disambiguation {
        DisambiguationMode::Interactive => Arc::new(InteractiveDisambiguator),
        DisambiguationMode::Deferred => Arc::new(DeferredDisambiguator::new(store.clone())),
    };
    let options = ResolverOptions {
        force: config.resolver.force,
        split: config.resolver.split,
    };

    let mut resolver = Resolver::new(search, disambiguator, Arc::new(ResolverCache::new()), options);
    if config.resolver.split {
        let key = config
            .tmdb
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(crate::Error::TmdbApiKeyMissing)?;
        let client = TmdbClient::new(TmdbConfig::new(key, config.catalog.timeout))?;
        resolver = resolver.with_classifier(Arc::new(client));
    }

    let probe: Arc<dyn MediaProbe> = if ffprobe::is_installed() {
        Arc::new(Ffprobe::new())
    } else {
        tracing::debug!("ffprobe not installed, resolution falls back to names");
        Arc::new(NoProbe)
    };

    let materializer = Materializer::new(store.clone(), config.destination.clone());
    Ok(Orchestrator::new(
        &config.source_dir,
        store,
        resolver,
        materializer,
        probe,
    ))
}

/// Set `flag` on Ctrl-C so the pass stops between items.
fn cancel_on_ctrl_c(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current item");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

/// Run one pass.
pub async fn run(config: &Config) -> Result<PassSummary> {
    println!(
        "{} {}",
        "Processing".bold().cyan(),
        config.source_dir.display()
    );

    let orchestrator = build_orchestrator(config)?;
    cancel_on_ctrl_c(orchestrator.cancel_flag());

    let summary = orchestrator.run_pass().await?;
    summary.print();
    Ok(summary)
}

/// Run a startup pass, then watch for changes.
pub async fn watch(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    cancel_on_ctrl_c(orchestrator.cancel_flag());

    println!(
        "{} {}",
        "Startup pass over".bold().cyan(),
        config.source_dir.display()
    );
    let summary = orchestrator.run_pass().await?;
    summary.print();
    if summary.cancelled {
        return Ok(());
    }

    println!();
    println!(
        "{} {} {}",
        "Watching".bold().cyan(),
        config.source_dir.display(),
        "(Ctrl-C to stop)".dimmed()
    );
    watch::watch_source(
        &orchestrator,
        &config.source_dir,
        Duration::from_millis(config.watch.debounce_ms),
    )
    .await?;
    Ok(())
}
