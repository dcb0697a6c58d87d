//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use media_symlinker::core::disambiguation::{Choice, DisambiguationRequest, Disambiguator};
use media_symlinker::core::linker::Materializer;
use media_symlinker::core::orchestrator::Orchestrator;
use media_symlinker::core::resolver::{Resolver, ResolverCache, ResolverOptions};
use media_symlinker::core::store::Store;
use media_symlinker::error::ResolutionFailure;
use media_symlinker::models::config::DestinationConfig;
use media_symlinker::models::media::{Candidate, ExternalId, MediaKind};
use media_symlinker::services::cinemeta::CatalogSearch;
use media_symlinker::services::ffprobe::NoProbe;
use media_symlinker::services::tmdb::AnimeClassifier;
use media_symlinker::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn candidate(name: &str, year: Option<u16>, id: &str) -> Candidate {
    Candidate {
        name: name.to_string(),
        year,
        id: ExternalId::imdb(id),
    }
}

/// In-memory catalog keyed by lowercase query.
#[derive(Default)]
pub struct FakeCatalog {
    results: HashMap<String, Vec<Candidate>>,
    details: HashMap<String, Candidate>,
    failing: AtomicBool,
    calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, candidates: Vec<Candidate>) -> Self {
        self.results.insert(query.to_lowercase(), candidates);
        self
    }

    pub fn with_detail(mut self, detail: Candidate) -> Self {
        self.details.insert(detail.id.value.clone(), detail);
        self
    }

    /// Every search times out.
    pub fn failing() -> Self {
        let catalog = Self::default();
        catalog.set_failing(true);
        catalog
    }

    /// Start or end an outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSearch for FakeCatalog {
    async fn search(&self, _kind: MediaKind, query: &str, _year: Option<u16>) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ResolutionFailure::Timeout {
                query: query.to_string(),
            }
            .into());
        }
        Ok(self
            .results
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn details(&self, _kind: MediaKind, id: &ExternalId) -> Result<Option<Candidate>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(found) = self.details.get(&id.value) {
            return Ok(Some(found.clone()));
        }
        Ok(self
            .results
            .values()
            .flatten()
            .find(|c| &c.id == id)
            .cloned())
    }
}

/// Anime classifier with a fixed verdict that counts lookups.
pub struct CountingClassifier {
    pub anime: bool,
    calls: AtomicUsize,
}

impl CountingClassifier {
    pub fn new(anime: bool) -> Self {
        Self {
            anime,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnimeClassifier for CountingClassifier {
    async fn is_anime(&self, _kind: MediaKind, _id: &ExternalId) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.anime)
    }
}

/// Disambiguator returning a fixed answer and remembering every question.
pub struct ScriptedDisambiguator {
    pub choice: Choice,
    pub requests: Mutex<Vec<DisambiguationRequest>>,
}

impl ScriptedDisambiguator {
    pub fn new(choice: Choice) -> Self {
        Self {
            choice,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Disambiguator for ScriptedDisambiguator {
    async fn choose(&self, request: &DisambiguationRequest) -> Result<Choice> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.choice.clone())
    }
}

pub fn resolver(
    catalog: Arc<FakeCatalog>,
    disambiguator: Arc<dyn Disambiguator>,
    force: bool,
) -> Resolver {
    Resolver::new(
        catalog,
        disambiguator,
        Arc::new(ResolverCache::new()),
        ResolverOptions { force, split: false },
    )
}

/// Source and destination roots inside a temp dir.
pub struct Library {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl Library {
    pub fn new(root: &Path) -> Self {
        let source = root.join("source");
        let dest = root.join("dest");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        Self { source, dest }
    }

    pub fn destinations(&self) -> DestinationConfig {
        DestinationConfig::under(&self.dest)
    }

    /// Write a file of `size` bytes under the source root.
    pub fn add_file(&self, rel: &str, size: usize) -> PathBuf {
        let path = self.source.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    pub fn orchestrator(&self, store: &Store, resolver: Resolver) -> Orchestrator {
        Orchestrator::new(
            &self.source,
            store.clone(),
            resolver,
            Materializer::new(store.clone(), self.destinations()),
            Arc::new(NoProbe),
        )
    }

    /// Every path under the destination root with its link target.
    pub fn snapshot(&self) -> Vec<(PathBuf, Option<PathBuf>)> {
        let mut entries: Vec<_> = walkdir::WalkDir::new(&self.dest)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| {
                let target = std::fs::read_link(e.path()).ok();
                (e.path().to_path_buf(), target)
            })
            .collect();
        entries.sort();
        entries
    }
}

/// Resolve a relative link to the path it names.
pub fn link_target(link: &Path) -> PathBuf {
    let target = std::fs::read_link(link).unwrap();
    assert!(target.is_relative(), "link {:?} is absolute", link);
    link.parent().unwrap().join(target).canonicalize().unwrap()
}
