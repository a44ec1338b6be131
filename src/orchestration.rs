// src/orchestration.rs
//! Poster orchestration: guesses a movie's title, genres and mood from a
//! vision caption and a semantic search over the movie catalogue.
//!
//! Everything past the two tool calls is plain string heuristics, kept as
//! free functions so they can be tested without any tools.

use crate::errors::AppError;
use crate::models::{MovieHit, PosterAnalysis, PosterCaption};
use crate::tools::{RetrieverTool, VisionTool};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const DEFAULT_SEARCH_K: usize = 5;

/// Minimum score for trusting the top search hit without a caption title.
pub const STRONG_HIT_SCORE: f32 = 0.8;

const NEUTRAL_MOOD: &str = "neutral";
const CONNECTORS: &[&str] = &["of", "the", "and", "a", "an", "in", "on"];
const GENERIC_TITLES: &[&str] = &["the", "poster", "movie", "film", "movie poster", "title"];

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["“]([^"“”]{2,80})["”]"#).unwrap());

static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:[Tt]itled|[Cc]alled|[Nn]amed)\s+([A-Z0-9][\w'’:&-]*(?:\s+(?:[A-Z0-9][\w'’:&-]*|of|the|and|a|an|in|on))*)",
    )
    .unwrap()
});

static FILM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[Mm]ovie|[Ff]ilm)\s+([A-Z][\w'’:&-]*(?:\s+[A-Z0-9][\w'’:&-]*){0,6})")
        .unwrap()
});

fn word_regex(words: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", words)).unwrap()
}

static GENRE_KEYWORDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Horror", "ghosts?|haunted|skulls?|bloody|blood|zombies?|demons?|creepy|monsters?|horror|screaming"),
        ("Sci-Fi", "spaceships?|outer space|robots?|aliens?|futuristic|planets?|astronauts?|cyborgs?|galaxy"),
        ("Action", "explosions?|guns?|weapons?|car chase|fighting|soldiers?|helicopters?|action"),
        ("Romance", "couple|kissing|kiss|embrace|romantic|love|hearts?|wedding"),
        ("Comedy", "funny|comical|laughing|clowns?|goofy|cartoonish"),
        ("Animation", "animated|cartoon|pixar"),
        ("Fantasy", "dragons?|wizards?|castles?|magical|magic|swords?|elves|fairy"),
        ("Crime", "detectives?|police|gangsters?|mafia|heist|crime"),
        ("Thriller", "suspense|suspenseful|mysterious|shadowy|thriller"),
        ("Western", "cowboys?|saloon|western|horseback"),
        ("War", "war|battlefield|tanks|troops"),
        ("Drama", "tearful|melancholy|drama"),
    ]
    .into_iter()
    .map(|(genre, words)| (genre, word_regex(words)))
    .collect()
});

static MOOD_KEYWORDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("terrifying", "blood|bloody|skulls?|screaming|terrified|gore|corpses?"),
        ("dark and suspenseful", "dark|shadows?|shadowy|ominous|menacing|eerie|foggy|silhouetted?"),
        ("intense", "explosions?|fire|flames|battle|chase|guns?|fighting"),
        ("romantic", "kiss|kissing|embrace|embracing|couple|romantic|hearts?|sunset"),
        ("whimsical", "magical|whimsical|fairy|cartoon|animated"),
        ("lighthearted", "smiling|laughing|bright|cheerful|funny|sunny|colorful|colourful"),
        ("melancholic", "tears|crying|lonely|rain|grief|somber|sombre"),
        ("epic", "vast|epic|armies|sweeping|mountains|galaxy"),
    ]
    .into_iter()
    .map(|(mood, words)| (mood, word_regex(words)))
    .collect()
});

fn genre_mood(genre: &str) -> Option<&'static str> {
    let mood = match genre.to_ascii_lowercase().as_str() {
        "horror" => "eerie",
        "thriller" | "mystery" => "tense",
        "crime" => "gritty",
        "action" | "adventure" => "intense",
        "sci-fi" | "science fiction" => "mysterious",
        "romance" => "romantic",
        "comedy" => "lighthearted",
        "animation" | "fantasy" | "family" => "whimsical",
        "drama" => "melancholic",
        "war" => "somber",
        "western" => "rugged",
        _ => return None,
    };
    Some(mood)
}

pub struct PosterOrchestrator {
    vision: Arc<dyn VisionTool>,
    retriever: Arc<dyn RetrieverTool>,
    search_k: usize,
}

impl PosterOrchestrator {
    pub fn new(vision: Arc<dyn VisionTool>, retriever: Arc<dyn RetrieverTool>) -> Self {
        Self {
            vision,
            retriever,
            search_k: DEFAULT_SEARCH_K,
        }
    }

    pub fn with_search_k(mut self, k: usize) -> Self {
        self.search_k = k.max(1);
        self
    }

    pub async fn analyze(&self, image: &[u8]) -> Result<PosterAnalysis, AppError> {
        let described = self.vision.describe(image).await?;
        info!(
            "{} caption: {:?}, genre hints: {:?}",
            self.vision.name(),
            described.caption,
            described.genres
        );

        let candidate = extract_title_candidate(&described);
        let inferred_genres = infer_genres(&described.caption, &described.genres);
        let query = build_search_query(candidate.as_deref(), &described.caption);

        // A failed search only costs us the catalogue match.
        let candidates = match self.retriever.search(&query, self.search_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("{} failed, continuing without hits: {}", self.retriever.name(), e);
                Vec::new()
            }
        };

        let (title, confidence) = resolve_title(candidate.as_deref(), &candidates, &inferred_genres);
        let mood = infer_mood(&described.caption, &inferred_genres);

        info!(
            "Poster resolved - title: {:?}, candidate: {:?}, mood: {}, confidence: {}, hits: {}",
            title,
            candidate,
            mood,
            confidence,
            candidates.len()
        );

        Ok(PosterAnalysis {
            title,
            caption: described.caption,
            mood,
            confidence,
            inferred_genres,
            candidates,
        })
    }
}

fn clean_title(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || "“”’".contains(c) || c.is_whitespace())
        .split_whitespace()
        .collect();
    while words
        .last()
        .is_some_and(|w| CONNECTORS.contains(&w.to_ascii_lowercase().as_str()))
    {
        words.pop();
    }

    let title = words
        .join(" ")
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string();
    let generic = GENERIC_TITLES.contains(&title.to_ascii_lowercase().as_str());
    (title.chars().count() >= 2 && !generic).then_some(title)
}

/// Best guess at a title printed on or named by the poster description.
pub fn extract_title_candidate(described: &PosterCaption) -> Option<String> {
    if let Some(title) = described.visible_text.as_deref().and_then(clean_title) {
        return Some(title);
    }

    let caption = described.caption.as_str();
    [&*QUOTED, &*NAMED, &*FILM]
        .into_iter()
        .filter_map(|re| re.captures(caption))
        .find_map(|caps| caps.get(1).and_then(|m| clean_title(m.as_str())))
}

/// Vision genre hints first, then genres implied by caption keywords,
/// without case-insensitive duplicates.
pub fn infer_genres(caption: &str, hinted: &[String]) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    let keyword_genres = GENRE_KEYWORDS
        .iter()
        .filter(|(_, re)| re.is_match(caption))
        .map(|(genre, _)| genre.to_string());

    for genre in hinted.iter().map(|g| g.trim().to_string()).chain(keyword_genres) {
        if genre.is_empty() || genres.iter().any(|g| g.eq_ignore_ascii_case(&genre)) {
            continue;
        }
        genres.push(genre);
    }
    genres
}

pub fn infer_mood(caption: &str, genres: &[String]) -> String {
    MOOD_KEYWORDS
        .iter()
        .find(|(_, re)| re.is_match(caption))
        .map(|(mood, _)| *mood)
        .or_else(|| genres.iter().find_map(|g| genre_mood(g)))
        .unwrap_or(NEUTRAL_MOOD)
        .to_string()
}

pub fn build_search_query(candidate: Option<&str>, caption: &str) -> String {
    match candidate {
        Some(title) => format!("{} {}", title, caption),
        None => caption.to_string(),
    }
}

/// Lowercase, punctuation-free, without a leading "the".
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    match words.split_first() {
        Some((&"the", rest)) if !rest.is_empty() => rest.join(" "),
        _ => words.join(" "),
    }
}

fn titles_equal(candidate: &str, hit: &str) -> bool {
    let a = normalize_title(candidate);
    !a.is_empty() && a == normalize_title(hit)
}

fn titles_overlap(candidate: &str, hit: &str) -> bool {
    let a = normalize_title(candidate);
    let b = normalize_title(hit);
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn round_confidence(value: f32) -> f32 {
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Picks the final title and how sure we are about it.
pub fn resolve_title(
    candidate: Option<&str>,
    hits: &[MovieHit],
    genres: &[String],
) -> (Option<String>, f32) {
    if let Some(candidate) = candidate {
        // An exact title beats one that merely contains the other.
        let matched = hits
            .iter()
            .find(|h| titles_equal(candidate, &h.title))
            .or_else(|| hits.iter().find(|h| titles_overlap(candidate, &h.title)));
        if let Some(hit) = matched {
            return (Some(hit.title.clone()), round_confidence(0.7 + 0.3 * hit.score));
        }
    }

    let top = hits
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score));
    if let Some(top) = top.filter(|h| h.score >= STRONG_HIT_SCORE) {
        let overlap = top
            .genres
            .iter()
            .any(|hg| genres.iter().any(|g| g.eq_ignore_ascii_case(hg)));
        let bonus = if overlap { 0.1 } else { 0.0 };
        return (Some(top.title.clone()), round_confidence(0.75 * top.score + bonus));
    }

    match candidate {
        Some(candidate) => (Some(candidate.to_string()), 0.4),
        None => (None, 0.1),
    }
}
