//! Locations, content records and the path arithmetic used to rewrite targets
//!
//! Paths handled here are alias-stripped backend paths. Every path produced for a target is
//! forward-slash separated, independent of the separator used by the backend it came from.

use chrono::{DateTime, Utc};

/// Observed type of a backend entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryType {
    pub fn is_regular(&self) -> bool {
        matches!(self, EntryType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryType::Directory)
    }
}

/// A parsed, alias-stripped backend location.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub path: String,
    pub separator: char,
}

impl Location {
    /// Wraps a forward-slash separated path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            separator: '/',
        }
    }

    pub fn with_separator(path: impl Into<String>, separator: char) -> Self {
        Self {
            path: path.into(),
            separator,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Description of a single backend entry as reported by stat or list.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Content {
    pub location: Location,
    pub entry_type: EntryType,
    pub size: u64,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// Replaces `separator` with `/`.
pub fn to_slash(path: &str, separator: char) -> String {
    if separator == '/' {
        path.to_string()
    } else {
        path.replace(separator, "/")
    }
}

/// Joins `suffix` onto `base` with exactly one `/` between them.
pub fn join_path(base: &str, suffix: &str) -> String {
    let suffix = suffix.trim_start_matches('/');
    if base.is_empty() {
        return suffix.to_string();
    }
    if base.ends_with('/') {
        format!("{base}{suffix}")
    } else {
        format!("{base}/{suffix}")
    }
}

/// Last non-empty component of `path`.
pub fn base_name(path: &str, separator: char) -> &str {
    let trimmed = path.trim_end_matches(separator);
    if trimmed.is_empty() {
        return path;
    }
    match trimmed.rfind(separator) {
        Some(index) => &trimmed[index + separator.len_utf8()..],
        None => trimmed,
    }
}
