//! Release name parser.
//!
//! Turns loosely-named torrent/debrid files and folders into structured tokens:
//! - Season/episode, through an ordered list of independent matchers
//! - Release year, bounded to [1900, current year]
//! - Resolution tag, from file name, parent folder, or a media probe
//! - A title guess reconciled between folder and file names

use crate::error::ParseFailure;
use crate::models::media::ParsedName;
use crate::services::ffprobe::MediaProbe;
use crate::utils::similarity;
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Folder and file guesses at or above this ratio are considered the same title.
const FOLDER_TITLE_SIMILARITY: f64 = 0.8;

/// Extensions stripped before parsing.
const KNOWN_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts", "flv", "webm", "mpg", "mpeg", "srt",
    "ass", "ssa", "sub", "idx", "vtt", "nfo",
];

/// Grammar that produced an episode match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeGrammar {
    /// `S01E02E03`, `S01E02+E03`, `S01 E02+E03`
    MultiEpisode,
    /// `S01E02-E03`
    EpisodeRange,
    /// `S01E02`, `S01 E02`
    SeasonEpisode,
    /// `S001E02`
    WideSeason,
    /// `1x02`
    Cross,
    /// `Title - 02 [1080p]`
    AnimeEpisode,
    /// `S2 - 05`
    AnimeSeason,
}

/// A season/episode token found in a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMatch {
    pub grammar: EpisodeGrammar,
    pub season: u16,
    pub episode: u16,
    /// Last episode of a multi-episode token. The item is represented by `episode`.
    pub last_episode: Option<u16>,
    /// Byte offset of the token in the parsed text.
    pub start: usize,
    /// Title text captured by the grammar itself (anime grammars only).
    pub title: Option<String>,
    /// Resolution captured by the grammar itself (anime grammars only).
    pub resolution: Option<String>,
}

/// Tagged classification of a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameKind {
    /// Standard scene episode grammar.
    Episode(EpisodeMatch),
    /// Anime fallback grammar.
    Anime(EpisodeMatch),
    /// No season/episode token.
    NotEpisode,
}

type Matcher = fn(&str) -> Option<EpisodeMatch>;

/// Standard grammars, most specific first. The first match wins.
const EPISODE_MATCHERS: &[Matcher] = &[
    match_multi_episode,
    match_episode_range,
    match_season_episode,
    match_wide_season,
    match_cross,
];

/// Anime grammars, tried only when no standard grammar matched.
const ANIME_MATCHERS: &[Matcher] = &[match_anime_episode, match_anime_season];

static MULTI_EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)S(\d{2,3}) ?E(\d{2,3})(?:E| ?\+ ?E)(\d{2,3})").expect("valid regex")
});
static EPISODE_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d{2}) ?E(\d{2,3}) ?- ?E(\d{2,3})").expect("valid regex"));
static SEASON_EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d{2}) ?E(\d{2,3})").expect("valid regex"));
static WIDE_SEASON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d{3}) ?E(\d{2,3})").expect("valid regex"));
static CROSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})x(\d{2})\b").expect("valid regex"));
static ANIME_EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*) - (\d{2,3})(?:v\d)?\b(?: [\[(]?(\d{3,4}p)[\])]?)?").expect("valid regex")
});
static ANIME_SIZE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i) - \d+(?:\.\d+)?GB").expect("valid regex"));
static ANIME_SEASON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d{1,2}) - (\d{2,3})").expect("valid regex"));
static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])(\d{3,4}p)(?:$|[^a-z0-9])").expect("valid regex"));
static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static SEASON_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s._\-\[(])(?:S\d{1,3}(?:E\d+)?|season[\s._\-]*\d+)(?:$|[\s._\-\])])")
        .expect("valid regex")
});
static SEASON_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS\d{1,2}\s?-\s?S?\d{1,2}\b").expect("valid regex"));
static QUALITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[\s._\-\[(])(?:blu-?ray|web-?dl|webrip|hdtv|bdrip|brrip|dvdrip|remux|x26[45]|h\.?26[45]|hevc|10bit|uhd|hdr|proper|repack|extended|unrated|imax|4k)(?:$|[\s._\-\])])",
    )
    .expect("valid regex")
});
static GROUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\[[^\]]*\]\s*)+").expect("valid regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

fn number(caps: &regex::Captures, i: usize) -> Option<u16> {
    caps.get(i)?.as_str().parse().ok()
}

/// `S01E02E03`, `S01E02+E03`.
pub fn match_multi_episode(text: &str) -> Option<EpisodeMatch> {
    let caps = MULTI_EPISODE_RE.captures(text)?;
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::MultiEpisode,
        season: number(&caps, 1)?,
        episode: number(&caps, 2)?,
        last_episode: number(&caps, 3),
        start: caps.get(0)?.start(),
        title: None,
        resolution: None,
    })
}

/// `S01E02-E03`.
pub fn match_episode_range(text: &str) -> Option<EpisodeMatch> {
    let caps = EPISODE_RANGE_RE.captures(text)?;
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::EpisodeRange,
        season: number(&caps, 1)?,
        episode: number(&caps, 2)?,
        last_episode: number(&caps, 3),
        start: caps.get(0)?.start(),
        title: None,
        resolution: None,
    })
}

/// `S01E02`.
pub fn match_season_episode(text: &str) -> Option<EpisodeMatch> {
    let caps = SEASON_EPISODE_RE.captures(text)?;
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::SeasonEpisode,
        season: number(&caps, 1)?,
        episode: number(&caps, 2)?,
        last_episode: None,
        start: caps.get(0)?.start(),
        title: None,
        resolution: None,
    })
}

/// `S001E02`.
pub fn match_wide_season(text: &str) -> Option<EpisodeMatch> {
    let caps = WIDE_SEASON_RE.captures(text)?;
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::WideSeason,
        season: number(&caps, 1)?,
        episode: number(&caps, 2)?,
        last_episode: None,
        start: caps.get(0)?.start(),
        title: None,
        resolution: None,
    })
}

/// `1x02`.
pub fn match_cross(text: &str) -> Option<EpisodeMatch> {
    let caps = CROSS_RE.captures(text)?;
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::Cross,
        season: number(&caps, 1)?,
        episode: number(&caps, 2)?,
        last_episode: None,
        start: caps.get(0)?.start(),
        title: None,
        resolution: None,
    })
}

/// `[Group] Title - 02v2 [1080p]`. Names with a ` - 1.4GB` size suffix are not episodes.
pub fn match_anime_episode(text: &str) -> Option<EpisodeMatch> {
    if ANIME_SIZE_SUFFIX_RE.is_match(text) {
        return None;
    }
    let caps = ANIME_EPISODE_RE.captures(text)?;
    let title = GROUP_TAG_RE.replace(caps.get(1)?.as_str(), "").trim().to_string();
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::AnimeEpisode,
        season: 1,
        episode: number(&caps, 2)?,
        last_episode: None,
        start: caps.get(2)?.start(),
        title: Some(title),
        resolution: caps.get(3).map(|m| m.as_str().to_lowercase()),
    })
}

/// `Title S2 - 05`.
pub fn match_anime_season(text: &str) -> Option<EpisodeMatch> {
    let caps = ANIME_SEASON_RE.captures(text)?;
    let start = caps.get(0)?.start();
    let title = GROUP_TAG_RE.replace(&text[..start], "").trim().to_string();
    Some(EpisodeMatch {
        grammar: EpisodeGrammar::AnimeSeason,
        season: number(&caps, 1)?,
        episode: number(&caps, 2)?,
        last_episode: None,
        start,
        title: Some(title),
        resolution: None,
    })
}

/// Classify a name by running the matcher lists in order.
pub fn classify(name: &str) -> NameKind {
    if let Some(m) = EPISODE_MATCHERS.iter().find_map(|matcher| matcher(name)) {
        return NameKind::Episode(m);
    }
    if let Some(m) = ANIME_MATCHERS.iter().find_map(|matcher| matcher(name)) {
        return NameKind::Anime(m);
    }
    NameKind::NotEpisode
}

/// Whether a name carries any standard season/episode token.
pub fn contains_episode(name: &str) -> bool {
    EPISODE_MATCHERS.iter().any(|matcher| matcher(name).is_some())
}

/// Whether a folder or file name looks like series content.
///
/// Tests episode tokens, `Season N`, bare `S01` and season ranges.
pub fn looks_like_series(name: &str) -> bool {
    contains_episode(name) || SEASON_MARKER_RE.is_match(name) || SEASON_RANGE_RE.is_match(name)
}

/// Current year, the upper bound for year tokens.
pub fn current_year() -> u16 {
    chrono::Utc::now().year() as u16
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '.' | '-' | '_' | '(' | ')' | '[' | ']')
}

/// Every separator-bounded 4-digit token in `[1900, current year]`, with its offset.
pub fn year_tokens(text: &str) -> Vec<(usize, u16)> {
    let max = current_year();
    DIGIT_RUN_RE
        .find_iter(text)
        .filter(|m| m.as_str().len() == 4)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            before.map_or(true, is_separator) && after.map_or(true, is_separator)
        })
        .filter_map(|m| {
            let year: u16 = m.as_str().parse().ok()?;
            (1900..=max).contains(&year).then_some((m.start(), year))
        })
        .collect()
}

/// Release year of a name. When several tokens qualify the last one wins.
pub fn extract_year(text: &str) -> Option<u16> {
    year_tokens(text).last().map(|(_, y)| *y)
}

/// `<3-4 digits>p` token, lowercased.
pub fn extract_resolution(text: &str) -> Option<String> {
    RESOLUTION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Split off a known extension. Returns the stem and `.ext`.
pub fn split_extension(name: &str) -> (&str, Option<String>) {
    if let Some(idx) = name.rfind('.') {
        let ext = &name[idx + 1..];
        if KNOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return (&name[..idx], Some(format!(".{}", ext.to_lowercase())));
        }
    }
    (name, None)
}

/// Dots, dashes and underscores become spaces; whitespace collapses.
pub fn normalize_separators(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect();
    let collapsed = SPACES_RE.replace_all(&replaced, " ");
    collapsed
        .trim()
        .trim_end_matches(|c: char| matches!(c, '(' | '[' | ' '))
        .trim()
        .to_string()
}

/// Title portion of a name: everything before the first season, year,
/// resolution or quality token, with group tags and separators cleaned.
///
/// A year token at the very start is kept as the title when nothing else
/// precedes it (e.g. `1917.1080p.mkv`).
pub fn title_guess(text: &str) -> String {
    let cleaned = GROUP_TAG_RE.replace(text, "");
    let text: &str = &cleaned;

    let mut cut = text.len();
    if let Some(m) = EPISODE_MATCHERS.iter().find_map(|matcher| matcher(text)) {
        cut = cut.min(m.start);
    }
    for re in [&*SEASON_MARKER_RE, &*RESOLUTION_RE, &*QUALITY_RE] {
        if let Some(m) = re.find(text) {
            cut = cut.min(m.start());
        }
    }

    let without_year = normalize_separators(&text[..cut]);
    if let Some((pos, _)) = year_tokens(&text[..cut]).last() {
        let with_year_cut = normalize_separators(&text[..*pos]);
        if !with_year_cut.is_empty() {
            return strip_parenthesized_year(&with_year_cut);
        }
    }
    strip_parenthesized_year(&without_year)
}

fn strip_parenthesized_year(title: &str) -> String {
    static PAREN_YEAR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\s*\(\d{4}\)$").expect("valid regex"));
    PAREN_YEAR_RE.replace(title, "").trim().to_string()
}

/// Folder-derived title guess for an episode's parent folder.
pub fn folder_title_guess(folder: &str) -> String {
    title_guess(folder)
}

/// Parse a file or folder name into structured tokens.
///
/// `parent_folder` supplies the folder-derived title guess and fallback
/// year/resolution.
pub fn parse_name(name: &str, parent_folder: Option<&str>) -> Result<ParsedName, ParseFailure> {
    let (stem, extension) = split_extension(name);
    let folder = parent_folder.unwrap_or("");

    let mut parsed = ParsedName {
        extension,
        ..Default::default()
    };

    match classify(stem) {
        NameKind::Episode(m) => {
            parsed.season = Some(m.season);
            parsed.episode = Some(m.episode);
            parsed.last_episode = m.last_episode;

            let file_guess = normalize_separators(&GROUP_TAG_RE.replace(&stem[..m.start], ""));
            let folder_guess = folder_title_guess(folder);
            parsed.title = choose_title(&folder_guess, &file_guess);

            parsed.year = extract_year(folder).or_else(|| extract_year(&stem[..m.start]));
        }
        NameKind::Anime(m) => {
            parsed.season = Some(m.season);
            parsed.episode = Some(m.episode);
            parsed.is_anime = true;
            parsed.resolution = m.resolution.clone();

            let file_guess = normalize_separators(m.title.as_deref().unwrap_or(""));
            let folder_guess = folder_title_guess(folder);
            parsed.title = choose_title(&folder_guess, &file_guess);
            parsed.year = extract_year(folder);
        }
        NameKind::NotEpisode => {
            parsed.title = title_guess(stem);
            if parsed.title.is_empty() {
                parsed.title = folder_title_guess(folder);
            }
            parsed.year = extract_year(stem).or_else(|| extract_year(folder));
        }
    }

    // A bare number title such as "1923" or "24" is the show's name, not a year.
    if let Some(year) = parsed.year {
        if parsed.title == year.to_string() {
            parsed.year = None;
        }
    }

    if parsed.resolution.is_none() {
        parsed.resolution = extract_resolution(stem).or_else(|| extract_resolution(folder));
    }

    if parsed.title.is_empty() {
        return Err(ParseFailure::NoTitle(name.to_string()));
    }
    Ok(parsed)
}

/// Prefer the folder guess when it names the same title as the file guess,
/// or when the file carries no title of its own.
fn choose_title(folder_guess: &str, file_guess: &str) -> String {
    if file_guess.is_empty() {
        return folder_guess.to_string();
    }
    if !folder_guess.is_empty()
        && similarity::are_similar(folder_guess, file_guess, FOLDER_TITLE_SIMILARITY)
    {
        return folder_guess.to_string();
    }
    file_guess.to_string()
}

/// Parse a file on disk, falling back to the media probe for resolution.
pub fn parse_file(path: &Path, probe: &dyn MediaProbe) -> Result<ParsedName, ParseFailure> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string());

    let mut parsed = parse_name(&name, parent.as_deref())?;
    if parsed.resolution.is_none() && path.is_file() {
        match probe.dimensions(path) {
            Ok(Some(dims)) => parsed.resolution = Some(dims.resolution_tag()),
            Ok(None) => {}
            Err(e) => tracing::debug!("Media probe failed for {:?}: {}", path, e),
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matchers_are_independent() {
        assert_eq!(match_season_episode("Show.S01E02.mkv").unwrap().episode, 2);
        assert!(match_season_episode("Show.1x02.mkv").is_none());
        assert_eq!(match_cross("Show.1x02.mkv").unwrap().season, 1);
        assert!(match_cross("Show.1920x1080.mkv").is_none());
        assert_eq!(match_wide_season("Show.S001E05").unwrap().season, 1);
    }

    #[test]
    fn test_multi_episode_folds_to_leading() {
        let m = match_multi_episode("Show.S01E02E03.720p").unwrap();
        assert_eq!((m.season, m.episode, m.last_episode), (1, 2, Some(3)));

        let m = match_multi_episode("Show S01 E02+E03").unwrap();
        assert_eq!((m.episode, m.last_episode), (2, Some(3)));

        let m = match_episode_range("Show.S02E05-E06").unwrap();
        assert_eq!((m.season, m.episode, m.last_episode), (2, 5, Some(6)));
    }

    #[test]
    fn test_classify_order() {
        match classify("Show.S01E02-E03.mkv") {
            NameKind::Episode(m) => assert_eq!(m.grammar, EpisodeGrammar::EpisodeRange),
            other => panic!("expected episode, got {:?}", other),
        }
        match classify("[SubsPlease] Frieren - 12 (1080p)") {
            NameKind::Anime(m) => {
                assert_eq!(m.episode, 12);
                assert_eq!(m.title.as_deref(), Some("Frieren"));
                assert_eq!(m.resolution.as_deref(), Some("1080p"));
            }
            other => panic!("expected anime, got {:?}", other),
        }
        assert_eq!(classify("Movie.Name.2010.1080p"), NameKind::NotEpisode);
        assert_eq!(classify("Some Movie - 4.5GB"), NameKind::NotEpisode);
    }

    #[test]
    fn test_year_bounds() {
        assert_eq!(extract_year("Movie.1899.mkv"), None);
        assert_eq!(extract_year("Movie.1900.mkv"), Some(1900));
        assert_eq!(extract_year("Movie.2999.mkv"), None);
        assert_eq!(extract_year(&format!("Movie.{}.mkv", current_year() + 1)), None);
        assert_eq!(extract_year("Movie.1080.mkv"), None);
        assert_eq!(extract_year("Movie.20201.mkv"), None);
        assert_eq!(extract_year("Blade.Runner.2049.2017.1080p"), Some(2017));
    }

    #[test]
    fn test_resolution() {
        assert_eq!(extract_resolution("Show.S01E02.1080P.mkv").as_deref(), Some("1080p"));
        assert_eq!(extract_resolution("Movie [2160p]").as_deref(), Some("2160p"));
        assert_eq!(extract_resolution("Movie.x264"), None);
    }

    #[test]
    fn test_title_guess() {
        assert_eq!(title_guess("The.Matrix.1999.1080p.BluRay"), "The Matrix");
        assert_eq!(title_guess("2001.A.Space.Odyssey.1968.1080p"), "2001 A Space Odyssey");
        assert_eq!(title_guess("1917.1080p.WEB"), "1917");
        assert_eq!(title_guess("Charlottes.Web.2006.720p"), "Charlottes Web");
        assert_eq!(title_guess("[Group] Some_Show_S02_1080p"), "Some Show");
        assert_eq!(title_guess("Dune (2021)"), "Dune");
    }

    #[test]
    fn test_looks_like_series() {
        assert!(looks_like_series("Show.Name.S01.1080p.WEB"));
        assert!(looks_like_series("Show Name Season 2"));
        assert!(looks_like_series("Show.Name.S01-S03.Complete"));
        assert!(!looks_like_series("Movie.Name.2010.1080p"));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.b.mkv"), ("a.b", Some(".mkv".to_string())));
        assert_eq!(split_extension("Show.S01E02"), ("Show.S01E02", None));
    }
}
