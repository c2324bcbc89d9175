//! Filename classification.
//!
//! Best-effort only: the guesses seed the catalog and are kept once a
//! richer source (user edit, metadata lookup) fills the field in.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::MediaKind;

static EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s(\d{1,2})e(\d{1,3})").expect("episode regex"));

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])((?:19|20)\d{2})(?:[^0-9]|$)").expect("year regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct MediaGuess {
    pub kind: MediaKind,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
}

/// Classify a file by its name alone. A season/episode marker wins over
/// everything else; anything without one is treated as a movie.
pub fn classify_name(file_name: &str) -> MediaGuess {
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    let title = clean_title(stem);

    if let Some(caps) = EPISODE_RE.captures(stem) {
        return MediaGuess {
            kind: MediaKind::TvEpisode,
            title,
            year: None,
            season: caps[1].parse().ok(),
            episode: caps[2].parse().ok(),
        };
    }

    MediaGuess {
        kind: MediaKind::Movie,
        title,
        year: extract_year(stem),
        season: None,
        episode: None,
    }
}

/// Release-style separators become spaces; runs collapse to one.
fn clean_title(stem: &str) -> Option<String> {
    let cleaned = stem
        .replace(['_', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn extract_year(stem: &str) -> Option<i64> {
    YEAR_RE
        .captures(stem)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_episode_marker_means_tv() {
        let guess = classify_name("Show.S02E05.mkv");
        assert_eq!(guess.kind, MediaKind::TvEpisode);
        assert_eq!(guess.season, Some(2));
        assert_eq!(guess.episode, Some(5));
        assert_eq!(guess.title.as_deref(), Some("Show S02E05"));
        assert_eq!(guess.year, None);
    }

    #[test]
    fn marker_is_case_insensitive() {
        let guess = classify_name("show.s01e10.720p.mkv");
        assert_eq!(guess.kind, MediaKind::TvEpisode);
        assert_eq!(guess.season, Some(1));
        assert_eq!(guess.episode, Some(10));
    }

    #[test]
    fn plain_file_is_a_movie_with_year() {
        let guess = classify_name("Movie.2020.mkv");
        assert_eq!(guess.kind, MediaKind::Movie);
        assert_eq!(guess.season, None);
        assert_eq!(guess.episode, None);
        assert_eq!(guess.title.as_deref(), Some("Movie 2020"));
        assert_eq!(guess.year, Some(2020));
    }

    #[test]
    fn underscores_and_dots_become_spaces() {
        let guess = classify_name("My_Great__Film.final.mkv");
        assert_eq!(guess.title.as_deref(), Some("My Great Film final"));
    }

    #[test]
    fn resolution_digits_are_not_a_year() {
        let guess = classify_name("Concert 1080p.mkv");
        assert_eq!(guess.year, None);
    }
}
