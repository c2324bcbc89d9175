use serde::{Deserialize, Serialize};

/// Coarse media classification derived from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    TvEpisode,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::TvEpisode => "tv_episode",
            MediaKind::Other => "other",
        }
    }

    /// Lenient parse for values read back from storage.
    pub fn parse(s: &str) -> MediaKind {
        match s {
            "movie" => MediaKind::Movie,
            "tv_episode" => MediaKind::TvEpisode,
            _ => MediaKind::Other,
        }
    }
}

/// One catalog row. `media_key` is the content identity; everything else
/// is observation (path, size, mtime) or enrichment (guesses, linkage).
#[derive(Debug, Clone)]
pub struct MediaRecord {
    pub media_key: String,
    pub share_id: String,
    pub path: String,
    pub size: Option<i64>,
    pub mtime: Option<i64>,
    pub kind: MediaKind,
    pub series_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub title_guess: Option<String>,
    pub year_guess: Option<i64>,
    pub discovered_at: i64,
    pub last_seen_at: i64,
}
