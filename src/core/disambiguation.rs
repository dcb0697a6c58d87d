//! Settling ambiguous catalog matches.
//!
//! The resolver hands a ranked shortlist to a [`Disambiguator`]. The
//! interactive implementation asks on the terminal; the deferred one queues the
//! question in the state store and answers it on a later pass once a human has
//! replied through `pending resolve`.

use crate::core::store::Store;
use crate::error::ResolutionFailure;
use crate::models::catalog::PendingAnswer;
use crate::models::media::{Candidate, ExternalId, MediaKind};
use crate::Result;
use async_trait::async_trait;
use colored::Colorize;
use std::io::{BufRead, Write};

/// A question put to a disambiguator.
#[derive(Debug, Clone)]
pub struct DisambiguationRequest {
    pub title: String,
    pub year: Option<u16>,
    pub kind: MediaKind,
    /// Best candidates first.
    pub shortlist: Vec<Candidate>,
}

/// Answer from a disambiguator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Zero-based shortlist index.
    Index(usize),
    /// Direct namespaced id.
    Id(ExternalId),
    /// Queued for later review.
    Deferred(i64),
}

impl From<PendingAnswer> for Choice {
    fn from(answer: PendingAnswer) -> Self {
        match answer {
            PendingAnswer::Index(i) => Choice::Index(i),
            PendingAnswer::Id(id) => Choice::Id(id),
        }
    }
}

/// Picks one candidate out of an ambiguous shortlist.
#[async_trait]
pub trait Disambiguator: Send + Sync {
    async fn choose(&self, request: &DisambiguationRequest) -> Result<Choice>;
}

/// Prompts on stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractiveDisambiguator;

impl InteractiveDisambiguator {
    fn prompt(request: &DisambiguationRequest) -> Result<String> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        let year = request
            .year
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        writeln!(out)?;
        writeln!(
            out,
            "{} {}{} [{}]",
            "Ambiguous match for".yellow().bold(),
            request.title.bold(),
            year,
            request.kind
        )?;
        for (i, c) in request.shortlist.iter().enumerate() {
            let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "????".to_string());
            writeln!(out, "  {}. {} ({}) {}", i + 1, c.name, year, c.id.to_string().dimmed())?;
        }
        write!(out, "Choose 1-{} or enter an id [1]: ", request.shortlist.len())?;
        out.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

#[async_trait]
impl Disambiguator for InteractiveDisambiguator {
    async fn choose(&self, request: &DisambiguationRequest) -> Result<Choice> {
        let owned = request.clone();
        let line = tokio::task::spawn_blocking(move || Self::prompt(&owned))
            .await
            .map_err(|e| crate::Error::other(format!("prompt task failed: {}", e)))??;

        let line = line.trim();
        if line.is_empty() {
            return Ok(Choice::Index(0));
        }
        PendingAnswer::parse(line, request.shortlist.len())
            .map(Choice::from)
            .ok_or_else(|| ResolutionFailure::InvalidChoice(line.to_string()).into())
    }
}

/// Queues questions in the state store and replays stored answers.
#[derive(Debug, Clone)]
pub struct DeferredDisambiguator {
    store: Store,
}

impl DeferredDisambiguator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Disambiguator for DeferredDisambiguator {
    async fn choose(&self, request: &DisambiguationRequest) -> Result<Choice> {
        if let Some(answered) =
            self.store
                .answered_pending(&request.title, request.year, request.kind)?
        {
            if let Some(answer) = answered.answer {
                tracing::debug!("Using stored answer #{} for '{}'", answered.id, request.title);
                // Indexes refer to the shortlist shown at the time of answering.
                return Ok(match answer {
                    PendingAnswer::Index(i) => match answered.shortlist.get(i) {
                        Some(c) => Choice::Id(c.id.clone()),
                        None => Choice::Index(i),
                    },
                    PendingAnswer::Id(id) => Choice::Id(id),
                });
            }
        }

        let id = self.store.queue_pending(
            &request.title,
            request.year,
            request.kind,
            &request.shortlist,
        )?;
        tracing::info!(
            pending_id = id,
            title = %request.title,
            "Queued ambiguous title for review"
        );
        Ok(Choice::Deferred(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DisambiguationRequest {
        DisambiguationRequest {
            title: "The Office".to_string(),
            year: None,
            kind: MediaKind::Series,
            shortlist: vec![
                Candidate {
                    name: "The Office".to_string(),
                    year: Some(2005),
                    id: ExternalId::imdb("tt0386676"),
                },
                Candidate {
                    name: "The Office".to_string(),
                    year: Some(2001),
                    id: ExternalId::imdb("tt0290978"),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_deferred_queues_then_replays_answer() {
        let store = Store::open_in_memory().unwrap();
        let disambiguator = DeferredDisambiguator::new(store.clone());

        let id = match disambiguator.choose(&request()).await.unwrap() {
            Choice::Deferred(id) => id,
            other => panic!("expected deferral, got {:?}", other),
        };

        // Asking again before an answer reuses the queued entry.
        assert_eq!(disambiguator.choose(&request()).await.unwrap(), Choice::Deferred(id));

        store.answer_pending(id, &PendingAnswer::Index(1)).unwrap();
        assert_eq!(
            disambiguator.choose(&request()).await.unwrap(),
            Choice::Id(ExternalId::imdb("tt0290978"))
        );
    }
}
