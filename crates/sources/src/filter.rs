//! Visibility filtering for directory entries.

use std::collections::HashSet;

/// Decides whether a listed entry is shown to callers. Pure and total:
/// no I/O, no side effects.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    /// Lowercase extensions admitted for files. Empty set admits everything.
    pub allowed_extensions: HashSet<String>,
    pub include_directories: bool,
    pub include_hidden: bool,
}

impl ItemFilter {
    /// The canonical video container set used across the app.
    pub fn video_extensions() -> HashSet<String> {
        [
            "mp4", "m4v", "mkv", "mov", "avi", "wmv", "flv", "mpg", "mpeg", "ts", "m2ts",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    /// Videos plus directories, hidden entries excluded.
    pub fn video_and_directories() -> Self {
        ItemFilter {
            allowed_extensions: Self::video_extensions(),
            include_directories: true,
            include_hidden: false,
        }
    }

    pub fn allows(&self, name: &str, is_directory: bool) -> bool {
        if !self.include_hidden && name.starts_with('.') {
            return false;
        }
        // A visible directory passes regardless of the extension set.
        if is_directory {
            return self.include_directories;
        }
        let ext = name.rsplit_once('.').map(|(_, e)| e.to_lowercase());
        match ext {
            Some(ext) => self.allowed_extensions.is_empty() || self.allowed_extensions.contains(&ext),
            None => self.allowed_extensions.is_empty(),
        }
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::video_and_directories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_names_rejected_unless_opted_in() {
        let filter = ItemFilter::video_and_directories();
        assert!(!filter.allows(".foo.mkv", false));
        assert!(!filter.allows(".git", true));

        let lenient = ItemFilter {
            include_hidden: true,
            ..ItemFilter::video_and_directories()
        };
        assert!(lenient.allows(".foo.mkv", false));
    }

    #[test]
    fn directories_ignore_the_extension_set() {
        let filter = ItemFilter::video_and_directories();
        assert!(filter.allows("Season 1", true));
        assert!(filter.allows("notes.txt", true));

        let no_dirs = ItemFilter {
            include_directories: false,
            ..ItemFilter::video_and_directories()
        };
        assert!(!no_dirs.allows("Season 1", true));
    }

    #[test]
    fn files_match_against_lowercased_extension() {
        let filter = ItemFilter::video_and_directories();
        assert!(filter.allows("Show.MKV", false));
        assert!(filter.allows("movie.mp4", false));
        assert!(!filter.allows("notes.txt", false));
        assert!(!filter.allows("README", false));
    }

    #[test]
    fn empty_extension_set_admits_everything() {
        let filter = ItemFilter {
            allowed_extensions: HashSet::new(),
            ..ItemFilter::video_and_directories()
        };
        assert!(filter.allows("notes.txt", false));
        assert!(filter.allows("README", false));
        assert!(!filter.allows(".hidden", false));
    }
}
