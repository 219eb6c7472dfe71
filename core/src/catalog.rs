//! Catalog of titles: the records the gallery lists and the watch view plays.

mod store;

use chrono::Datelike;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use store::{CatalogStore, JsonCatalog, MemoryCatalog};

/// Shown when a title has no poster or the poster cannot be displayed
pub const FALLBACK_POSTER_URL: &str =
    "https://images.unsplash.com/photo-1598899134739-24c46f58b8c0?w=800&auto=format&fit=crop&q=60";

/// Earliest year a film can have been released
pub const FIRST_RELEASE_YEAR: i32 = 1888;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("title {0} not found")]
    NotFound(i64),
    #[error("invalid title: {0}")]
    Invalid(String),
    #[error("catalog file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Title {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub poster_url: String,
    pub video_url: String,
    pub genre: String,
    pub release_year: i32,
    #[serde(default)]
    pub is_series: bool,
    #[serde(default, with = "episodes_text")]
    pub episodes: Vec<Episode>,
}

impl Title {
    pub fn poster_or_fallback(&self) -> &str {
        if self.poster_url.trim().is_empty() {
            FALLBACK_POSTER_URL
        } else {
            &self.poster_url
        }
    }

    /// Playable sources as `(label, url)`, in play order.
    ///
    /// A series plays its episodes; anything else, or a series without
    /// episodes, plays `video_url`.
    pub fn playback_sources(&self) -> Vec<(String, String)> {
        if self.is_series && !self.episodes.is_empty() {
            return self
                .episodes
                .iter()
                .enumerate()
                .map(|(i, episode)| {
                    let label = if episode.title.trim().is_empty() {
                        format!("Episode {}", i + 1)
                    } else {
                        episode.title.clone()
                    };
                    (label, episode.url.clone())
                })
                .collect();
        }
        if self.video_url.trim().is_empty() {
            Vec::new()
        } else {
            vec![(self.title.clone(), self.video_url.clone())]
        }
    }

    /// Case-insensitive substring match on title or genre
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.title.to_lowercase().contains(&query)
            || self.genre.to_lowercase().contains(&query)
    }
}

/// Fields of a new title. `episodes` is the raw JSON text the editor takes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleDraft {
    pub title: String,
    pub description: String,
    pub poster_url: String,
    pub video_url: String,
    pub genre: String,
    pub release_year: i32,
    pub is_series: bool,
    pub episodes: String,
}

impl TitleDraft {
    /// Check the draft and build the title it describes
    pub fn validate(&self, id: i64) -> Result<Title, CatalogError> {
        validate_with_year(self, id, current_year())
    }
}

/// Partial update; `None` leaves the field as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitlePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub video_url: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
    pub is_series: Option<bool>,
    pub episodes: Option<String>,
}

impl TitlePatch {
    pub fn is_empty(&self) -> bool {
        *self == TitlePatch::default()
    }

    /// Apply to `title` and re-validate the result
    pub fn apply(self, title: &Title) -> Result<Title, CatalogError> {
        let episodes = match self.episodes {
            Some(raw) => raw,
            None if title.episodes.is_empty() => String::new(),
            None => serde_json::to_string(&title.episodes)?,
        };
        let draft = TitleDraft {
            title: self.title.unwrap_or_else(|| title.title.clone()),
            description: self.description.unwrap_or_else(|| title.description.clone()),
            poster_url: self.poster_url.unwrap_or_else(|| title.poster_url.clone()),
            video_url: self.video_url.unwrap_or_else(|| title.video_url.clone()),
            genre: self.genre.unwrap_or_else(|| title.genre.clone()),
            release_year: self.release_year.unwrap_or(title.release_year),
            is_series: self.is_series.unwrap_or(title.is_series),
            episodes,
        };
        draft.validate(title.id)
    }
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn validate_with_year(draft: &TitleDraft, id: i64, current_year: i32) -> Result<Title, CatalogError> {
    let invalid = |msg: &str| Err(CatalogError::Invalid(msg.to_string()));

    if draft.title.trim().is_empty() {
        return invalid("title must not be empty");
    }
    if draft.genre.trim().is_empty() {
        return invalid("genre must not be empty");
    }
    let latest = current_year + 5;
    if !(FIRST_RELEASE_YEAR..=latest).contains(&draft.release_year) {
        return Err(CatalogError::Invalid(format!(
            "release year must be between {} and {}",
            FIRST_RELEASE_YEAR, latest
        )));
    }

    // the editor only keeps episodes for series
    let episodes = if draft.is_series {
        parse_episodes(&draft.episodes)?
    } else {
        Vec::new()
    };

    let title = Title {
        id,
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        poster_url: draft.poster_url.trim().to_string(),
        video_url: draft.video_url.trim().to_string(),
        genre: draft.genre.trim().to_string(),
        release_year: draft.release_year,
        is_series: draft.is_series,
        episodes,
    };
    if title.playback_sources().is_empty() {
        return invalid("a video url or at least one episode is required");
    }
    Ok(title)
}

/// Parse the editor's episode list; blank text means no episodes
pub fn parse_episodes(raw: &str) -> Result<Vec<Episode>, CatalogError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let episodes: Vec<Episode> = serde_json::from_str(raw)
        .map_err(|e| CatalogError::Invalid(format!("episodes must be a JSON array of {{title, url}}: {}", e)))?;
    if let Some(pos) = episodes.iter().position(|e| e.url.trim().is_empty()) {
        return Err(CatalogError::Invalid(format!("episode {} has no url", pos + 1)));
    }
    Ok(episodes)
}

/// Titles matching `query`, best fuzzy match on the title first, then by id
pub fn search<'a>(titles: impl IntoIterator<Item = &'a Title>, query: &str) -> Vec<Title> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let pattern = query.trim();
    let mut hits: Vec<(i64, &Title)> = titles
        .into_iter()
        .filter(|t| t.matches(pattern))
        .map(|t| (matcher.fuzzy_match(&t.title, pattern).unwrap_or(0), t))
        .collect();
    hits.sort_by(|(a_score, a), (b_score, b)| b_score.cmp(a_score).then(a.id.cmp(&b.id)));
    hits.into_iter().map(|(_, t)| t.clone()).collect()
}

/// `episodes` is stored as a JSON array inside a string, empty when there are none
mod episodes_text {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::Episode;

    pub fn serialize<S: Serializer>(episodes: &[Episode], serializer: S) -> Result<S::Ok, S::Error> {
        if episodes.is_empty() {
            return serializer.serialize_str("");
        }
        let text = serde_json::to_string(episodes).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Episode>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(D::Error::custom)
    }
}
