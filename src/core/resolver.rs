//! Metadata resolver.
//!
//! Maps a parsed title guess onto a canonical catalog identity:
//! 1. Search the catalog service for candidates
//! 2. Select one with the ordered rules in [`select`]
//! 3. Hand genuinely ambiguous shortlists to a [`Disambiguator`]
//! 4. Fill a missing year from the detail endpoint and pick a destination root
//!
//! Every lookup, success or failure, is memoized in a [`ResolverCache`] until
//! the next pass starts. Anime classifications are kept across passes.

use crate::core::disambiguation::{Choice, DisambiguationRequest, Disambiguator};
use crate::error::ResolutionFailure;
use crate::models::media::{Candidate, DestinationRoot, ExternalId, MediaKind, ResolvedMedia};
use crate::services::cinemeta::CatalogSearch;
use crate::services::tmdb::AnimeClassifier;
use crate::utils::similarity;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Fuzzy threshold when a year narrows the candidates.
pub const YEAR_FUZZY_THRESHOLD: f64 = 0.9;
/// Fuzzy threshold against all candidates.
pub const FUZZY_THRESHOLD: f64 = 0.85;
/// Two top candidates this similar cannot be told apart by name.
pub const TWIN_THRESHOLD: f64 = 0.9;
/// Shortlist length offered to a disambiguator.
pub const SHORTLIST_LEN: usize = 3;

/// Outcome of the pure selection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Accept the candidate at this index.
    Pick(usize),
    /// Ask a disambiguator; ranked candidate indexes.
    Ambiguous(Vec<usize>),
    /// A year was given and nothing matched it.
    NoYearMatch,
}

fn fuzzy(a: &str, b: &str) -> f64 {
    similarity::ratio(&a.to_lowercase(), &b.to_lowercase())
}

fn best_fuzzy<'a>(
    query: &str,
    candidates: impl Iterator<Item = (usize, &'a Candidate)>,
    threshold: f64,
) -> Option<usize> {
    candidates
        .map(|(i, c)| (i, fuzzy(query, &c.name)))
        .filter(|(_, score)| *score >= threshold)
        .fold(None, |best: Option<(usize, f64)>, (i, score)| match best {
            Some((_, s)) if s >= score => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
}

/// Top candidate named `"<query>: <subtitle>"`.
fn colon_split(query: &str, candidates: &[Candidate], year: Option<u16>) -> Option<usize> {
    let top = candidates.first()?;
    let (head, _) = top.name.split_once(':')?;
    if year.is_some() && top.year != year {
        return None;
    }
    similarity::are_similar(head, query, YEAR_FUZZY_THRESHOLD).then_some(0)
}

/// Exact, then fuzzy, match with punctuation removed on both sides.
fn stripped_match(query: &str, candidates: &[Candidate], year: Option<u16>) -> Option<usize> {
    let wanted = similarity::normalize_title(query);
    let eligible = || {
        candidates
            .iter()
            .enumerate()
            .filter(move |(_, c)| year.is_none() || c.year == year)
    };
    if let Some((i, _)) = eligible().find(|(_, c)| similarity::normalize_title(&c.name) == wanted) {
        return Some(i);
    }
    eligible()
        .map(|(i, c)| (i, similarity::ratio(&wanted, &similarity::normalize_title(&c.name))))
        .filter(|(_, score)| *score >= YEAR_FUZZY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

fn ranked(query: &str, candidates: &[Candidate]) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, fuzzy(query, &c.name)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(SHORTLIST_LEN).map(|(i, _)| i).collect()
}

/// Apply the selection rules in order; the first rule that applies wins.
///
/// `candidates` must be non-empty.
pub fn select(query: &str, year: Option<u16>, candidates: &[Candidate], force: bool) -> Selection {
    let lower = query.to_lowercase();

    // Exact name, and year when given.
    if let Some(i) = candidates
        .iter()
        .position(|c| c.name.to_lowercase() == lower && (year.is_none() || c.year == year))
    {
        return Selection::Pick(i);
    }

    if candidates.len() == 1 && year.is_none() {
        return Selection::Pick(0);
    }

    if force {
        let i = year
            .and_then(|y| candidates.iter().position(|c| c.year == Some(y)))
            .unwrap_or(0);
        return Selection::Pick(i);
    }

    if let Some(y) = year {
        let same_year = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.year == Some(y));
        if let Some(i) = best_fuzzy(query, same_year, YEAR_FUZZY_THRESHOLD) {
            return Selection::Pick(i);
        }
        if let Some(i) =
            colon_split(query, candidates, year).or_else(|| stripped_match(query, candidates, year))
        {
            return Selection::Pick(i);
        }
        return Selection::NoYearMatch;
    }

    let twins = candidates.len() >= 2
        && fuzzy(&candidates[0].name, &candidates[1].name) >= TWIN_THRESHOLD;
    let best = best_fuzzy(query, candidates.iter().enumerate(), FUZZY_THRESHOLD);

    if twins || best.is_none() {
        if let Some(i) =
            colon_split(query, candidates, None).or_else(|| stripped_match(query, candidates, None))
        {
            return Selection::Pick(i);
        }
        return Selection::Ambiguous(ranked(query, candidates));
    }

    Selection::Pick(best.unwrap_or(0))
}

/// Strip characters that only confuse the search endpoint.
pub fn clean_query(title: &str) -> String {
    title
        .trim()
        .trim_end_matches(|c: char| matches!(c, '-' | '.' | ',' | ':' | '(' | '['))
        .trim()
        .to_string()
}

type CacheKey = (String, Option<u16>, MediaKind);
type CachedResolution = std::result::Result<ResolvedMedia, ResolutionFailure>;

/// Pass-scoped memo of resolutions, plus anime classifications by id.
#[derive(Debug, Default)]
pub struct ResolverCache {
    entries: Mutex<HashMap<CacheKey, CachedResolution>>,
    anime: Mutex<HashMap<ExternalId, bool>>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(title: &str, year: Option<u16>, kind: MediaKind) -> CacheKey {
        (similarity::normalize_title(title), year, kind)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CachedResolution>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::other("resolver cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn insert(&self, key: CacheKey, value: CachedResolution) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::other("resolver cache lock poisoned"))?;
        entries.insert(key, value);
        Ok(())
    }

    /// Forget every memoized resolution. Anime classifications are kept.
    pub fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| Error::other("resolver cache lock poisoned"))?
            .clear();
        Ok(())
    }

    fn anime(&self, id: &ExternalId) -> Option<bool> {
        self.anime.lock().ok()?.get(id).copied()
    }

    fn remember_anime(&self, id: &ExternalId, anime: bool) {
        if let Ok(mut known) = self.anime.lock() {
            known.insert(id.clone(), anime);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolver behavior flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Never defer; take the year match or the first candidate.
    pub force: bool,
    /// Route anime to the anime roots.
    pub split: bool,
}

/// Title → canonical identity.
pub struct Resolver {
    search: Arc<dyn CatalogSearch>,
    classifier: Option<Arc<dyn AnimeClassifier>>,
    disambiguator: Arc<dyn Disambiguator>,
    cache: Arc<ResolverCache>,
    options: ResolverOptions,
}

impl Resolver {
    pub fn new(
        search: Arc<dyn CatalogSearch>,
        disambiguator: Arc<dyn Disambiguator>,
        cache: Arc<ResolverCache>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            search,
            classifier: None,
            disambiguator,
            cache,
            options,
        }
    }

    /// Attach the anime classifier used in split mode.
    pub fn with_classifier(mut self, classifier: Arc<dyn AnimeClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    /// Drop resolutions memoized by the previous pass.
    pub fn begin_pass(&self) -> Result<()> {
        self.cache.clear()
    }

    /// Resolve a title guess.
    ///
    /// A catalog with no candidates yields an unidentified result carrying the
    /// input title. State store failures are not cached.
    pub async fn resolve(
        &self,
        title: &str,
        year: Option<u16>,
        kind: MediaKind,
    ) -> Result<ResolvedMedia> {
        let query = clean_query(title);
        let key = ResolverCache::key(&query, year, kind);

        if let Some(hit) = self.cache.get(&key)? {
            tracing::debug!("Resolver cache hit: {} ({:?}) [{}]", query, year, kind);
            return hit.map_err(Error::from);
        }

        let outcome = self.resolve_uncached(&query, year, kind).await;
        match &outcome {
            Ok(media) => self.cache.insert(key, Ok(media.clone()))?,
            Err(Error::Resolution(failure)) => self.cache.insert(key, Err(failure.clone()))?,
            Err(_) => {}
        }
        outcome
    }

    async fn resolve_uncached(
        &self,
        query: &str,
        year: Option<u16>,
        kind: MediaKind,
    ) -> Result<ResolvedMedia> {
        let candidates = self.search.search(kind, query, year).await?;
        if candidates.is_empty() {
            tracing::info!("No catalog candidates for '{}' [{}]", query, kind);
            return Ok(ResolvedMedia::unidentified(query, year, kind));
        }

        let chosen = match select(query, year, &candidates, self.options.force) {
            Selection::Pick(i) => candidates[i].clone(),
            Selection::Ambiguous(indexes) => {
                let shortlist: Vec<Candidate> =
                    indexes.into_iter().map(|i| candidates[i].clone()).collect();
                self.disambiguate(query, year, kind, shortlist).await?
            }
            Selection::NoYearMatch => match self.year_shifted(query, year, kind).await? {
                Some(c) => c,
                None => {
                    tracing::debug!("No year match for '{}', taking top candidate", query);
                    candidates[0].clone()
                }
            },
        };

        self.finish(chosen, kind).await
    }

    /// Re-run the search at year−1, then year+1.
    async fn year_shifted(
        &self,
        query: &str,
        year: Option<u16>,
        kind: MediaKind,
    ) -> Result<Option<Candidate>> {
        let Some(year) = year else {
            return Ok(None);
        };
        for shifted in [year.saturating_sub(1), year.saturating_add(1)] {
            let candidates = self.search.search(kind, query, Some(shifted)).await?;
            if candidates.is_empty() {
                continue;
            }
            if let Selection::Pick(i) = select(query, Some(shifted), &candidates, false) {
                tracing::debug!("Matched '{}' with shifted year {}", query, shifted);
                return Ok(Some(candidates[i].clone()));
            }
        }
        Ok(None)
    }

    async fn disambiguate(
        &self,
        query: &str,
        year: Option<u16>,
        kind: MediaKind,
        shortlist: Vec<Candidate>,
    ) -> Result<Candidate> {
        let request = DisambiguationRequest {
            title: query.to_string(),
            year,
            kind,
            shortlist,
        };

        match self.disambiguator.choose(&request).await? {
            Choice::Index(i) => request
                .shortlist
                .get(i)
                .cloned()
                .ok_or_else(|| ResolutionFailure::InvalidChoice((i + 1).to_string()).into()),
            Choice::Id(id) => self.lookup_id(query, year, kind, id).await,
            Choice::Deferred(pending_id) => Err(ResolutionFailure::Deferred {
                title: query.to_string(),
                pending_id,
            }
            .into()),
        }
    }

    async fn lookup_id(
        &self,
        query: &str,
        year: Option<u16>,
        kind: MediaKind,
        id: ExternalId,
    ) -> Result<Candidate> {
        if !id.is_imdb() {
            // The search service cannot look these up; keep the query title.
            return Ok(Candidate {
                name: query.to_string(),
                year,
                id,
            });
        }
        self.search
            .details(kind, &id)
            .await?
            .ok_or_else(|| ResolutionFailure::UnknownId(id.to_string()).into())
    }

    async fn finish(&self, mut chosen: Candidate, kind: MediaKind) -> Result<ResolvedMedia> {
        if chosen.year.is_none() && chosen.id.is_imdb() {
            match self.search.details(kind, &chosen.id).await {
                Ok(Some(detail)) => chosen.year = detail.year,
                Ok(None) => {}
                Err(e) => tracing::debug!("Detail lookup for {} failed: {}", chosen.id, e),
            }
        }

        let root = self.route(kind, &chosen.id).await;
        let media = ResolvedMedia {
            title: chosen.name,
            year: chosen.year,
            id: Some(chosen.id),
            kind,
            root,
        };
        tracing::debug!("Resolved: {}", media.display());
        Ok(media)
    }

    /// Destination root for an identified title.
    ///
    /// Classifications are memoized per id; failed lookups are not.
    pub async fn route(&self, kind: MediaKind, id: &ExternalId) -> DestinationRoot {
        let anime = match (&self.classifier, self.options.split) {
            (Some(classifier), true) => match self.cache.anime(id) {
                Some(anime) => anime,
                None => match classifier.is_anime(kind, id).await {
                    Ok(anime) => {
                        self.cache.remember_anime(id, anime);
                        anime
                    }
                    Err(e) => {
                        tracing::warn!("Anime classification for {} failed: {}", id, e);
                        false
                    }
                },
            },
            _ => false,
        };
        DestinationRoot::for_kind(kind, anime)
    }
}
