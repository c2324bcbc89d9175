//! Legacy `LIST` output parsing.
//!
//! Servers still answer `LIST` with ls-style lines. The format was never
//! standardized; this parser handles the common Unix shape:
//!
//! `drwxr-xr-x  4 user group 4096 Jan 01 12:34 Name with spaces`

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::{join_path, RemoteEntry};

/// Parse one listing line. Returns `None` for lines that do not look like
/// a Unix listing entry, and for the `.`/`..` pseudo-entries.
pub(crate) fn parse_unix_line(line: &str, base: &str) -> Option<RemoteEntry> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    if columns.len() < 9 {
        return None;
    }

    let permissions = columns[0];
    let size: Option<u64> = columns[4].parse().ok();
    let date_raw = columns[5..8].join(" ");
    // Filenames may contain spaces; everything past the date is the name.
    let name = columns[8..].join(" ");
    if name == "." || name == ".." {
        return None;
    }

    let is_directory = permissions.starts_with('d');
    let modified_at = parse_listing_date(&date_raw, Utc::now());

    Some(RemoteEntry {
        path: join_path(base, &name),
        name,
        is_directory,
        size: if is_directory { None } else { size },
        modified_at,
    })
}

/// Unix listings omit the year for recent entries (`Jan 01 12:34`) and the
/// time for old ones (`Feb 14 2023`). Try the recent form with the current
/// year first; a result in the future means the entry is from last year
/// and the guess overshot, so roll it back.
pub(crate) fn parse_listing_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let guessed = format!("{raw} {}", now.year());
    if let Ok(naive) = NaiveDateTime::parse_from_str(&guessed, "%b %d %H:%M %Y") {
        let parsed = Utc.from_utc_datetime(&naive);
        if parsed > now {
            return parsed.with_year(now.year() - 1).or(Some(parsed));
        }
        return Some(parsed);
    }
    NaiveDate::parse_from_str(raw, "%b %d %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_line_has_no_size() {
        let entry =
            parse_unix_line("drwxr-xr-x 2 user group 4096 Jan 01 12:34 Movies", "/").unwrap();
        assert!(entry.is_directory);
        assert_eq!(entry.name, "Movies");
        assert_eq!(entry.path, "/Movies");
        assert_eq!(entry.size, None);
    }

    #[test]
    fn file_line_keeps_size_and_year() {
        let entry = parse_unix_line(
            "-rw-r--r-- 1 user group 104857600 Feb 14 2023 Show.mkv",
            "/tv",
        )
        .unwrap();
        assert!(!entry.is_directory);
        assert_eq!(entry.size, Some(104_857_600));
        assert_eq!(entry.path, "/tv/Show.mkv");
        let modified = entry.modified_at.unwrap();
        assert_eq!((modified.year(), modified.month(), modified.day()), (2023, 2, 14));
    }

    #[test]
    fn names_with_spaces_are_joined() {
        let entry = parse_unix_line(
            "-rw-r--r-- 1 user group 1024 Jan 01 12:34 The Long Movie.mkv",
            "/",
        )
        .unwrap();
        assert_eq!(entry.name, "The Long Movie.mkv");
        assert_eq!(entry.path, "/The Long Movie.mkv");
    }

    #[test]
    fn dot_entries_and_short_lines_are_skipped() {
        assert!(parse_unix_line("drwxr-xr-x 2 user group 4096 Jan 01 12:34 .", "/").is_none());
        assert!(parse_unix_line("drwxr-xr-x 2 user group 4096 Jan 01 12:34 ..", "/").is_none());
        assert!(parse_unix_line("total 42", "/").is_none());
    }

    #[test]
    fn recent_date_uses_current_year() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap();
        let parsed = parse_listing_date("Mar 02 10:15", now).unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2026, 3, 2));
    }

    #[test]
    fn future_date_rolls_back_one_year() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap();
        let parsed = parse_listing_date("Dec 24 18:00", now).unwrap();
        assert_eq!(parsed.year(), 2025);
    }

    #[test]
    fn unparseable_date_is_none() {
        let now = Utc::now();
        assert!(parse_listing_date("??? 99 xx:yy", now).is_none());
    }
}
