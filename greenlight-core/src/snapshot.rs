//! Snapshot data contracts for a single evaluation run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of GitLab target a snapshot describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A project: repository contents plus project settings.
    Project,
    /// A user profile, backed by the user's profile project.
    UserProfile,
}

/// One resolved path in the snapshot file index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Whether the path exists on the target.
    pub exists: bool,
    /// File size in bytes, when the fetcher reported one.
    pub size: Option<u64>,
    /// File contents, when fetched and textual.
    pub content: Option<String>,
}

impl FileEntry {
    /// Entry for a path that exists but whose contents were not fetched.
    pub fn present() -> Self {
        Self {
            exists: true,
            size: None,
            content: None,
        }
    }

    /// Entry for a path the fetcher resolved as absent.
    pub fn absent() -> Self {
        Self {
            exists: false,
            size: None,
            content: None,
        }
    }

    /// Entry for a path with fetched text contents.
    pub fn with_content(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            exists: true,
            size: Some(content.len() as u64),
            content: Some(content),
        }
    }
}

/// Scalar metadata value supplied by the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer count or identifier.
    Int(i64),
    /// Free-form text.
    Text(String),
}

/// Immutable view of one target's artifacts at evaluation time.
///
/// A path missing from `file_index` means the fetcher never attempted it; a
/// key missing from `metadata` means the value is unknown. Neither stands for
/// "absent" or "false".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Kind of target the snapshot was captured from.
    pub target_kind: TargetKind,
    /// Identifier the fetcher resolved, e.g. a project path or username.
    pub target_ref: String,
    /// Normalized relative path mapped to its resolution result.
    pub file_index: BTreeMap<String, FileEntry>,
    /// README text, when a README-like file was found and is text.
    pub readme_text: Option<String>,
    /// Scalar metadata supplied by the fetcher.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Snapshot {
    /// Create an empty snapshot for the given target.
    pub fn new(target_kind: TargetKind, target_ref: impl Into<String>) -> Self {
        Self {
            target_kind,
            target_ref: target_ref.into(),
            file_index: BTreeMap::new(),
            readme_text: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Look up a file-index entry by path, case-insensitively.
    pub fn entry(&self, path: &str) -> Option<&FileEntry> {
        let normalized = normalize_path(path);
        if let Some(entry) = self.file_index.get(&normalized) {
            return Some(entry);
        }
        self.file_index
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&normalized))
            .map(|(_, entry)| entry)
    }

    /// Entries at or under a directory prefix, case-insensitively, in index
    /// order.
    pub fn entries_under<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a str, &'a FileEntry)> {
        let dir_key = normalize_path(dir).to_ascii_lowercase();
        let prefix = format!("{dir_key}/");
        self.file_index
            .iter()
            .filter(move |(key, _)| {
                let key = key.to_ascii_lowercase();
                key == dir_key || key.starts_with(&prefix)
            })
            .map(|(key, entry)| (key.as_str(), entry))
    }
}

/// Normalize a relative path for index storage and lookup.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::{FileEntry, Snapshot, TargetKind, normalize_path};

    #[test]
    fn normalize_strips_leading_and_trailing_separators() {
        assert_eq!(normalize_path("./README.md"), "README.md");
        assert_eq!(normalize_path("/docs/guide.md/"), "docs/guide.md");
        assert_eq!(normalize_path("  LICENSE "), "LICENSE");
    }

    #[test]
    fn entry_lookup_is_case_insensitive() {
        let mut snapshot = Snapshot::new(TargetKind::Project, "group/project");
        snapshot
            .file_index
            .insert("readme.md".to_string(), FileEntry::present());

        let entry = snapshot.entry("README.md").expect("entry");
        assert!(entry.exists);
        assert!(snapshot.entry("CHANGELOG").is_none());
    }

    #[test]
    fn entries_under_matches_directory_and_children() {
        let mut snapshot = Snapshot::new(TargetKind::Project, "group/project");
        snapshot.file_index.insert(
            ".github/ISSUE_TEMPLATE/bug.md".to_string(),
            FileEntry::present(),
        );
        snapshot.file_index.insert(
            ".github/PULL_REQUEST_TEMPLATE".to_string(),
            FileEntry::absent(),
        );
        snapshot
            .file_index
            .insert("README.md".to_string(), FileEntry::present());

        let issue_entries: Vec<&str> = snapshot
            .entries_under(".github/issue_template")
            .map(|(path, _)| path)
            .collect();
        assert_eq!(issue_entries, vec![".github/ISSUE_TEMPLATE/bug.md"]);

        let mr_entries: Vec<&str> = snapshot
            .entries_under(".github/PULL_REQUEST_TEMPLATE")
            .map(|(path, _)| path)
            .collect();
        assert_eq!(mr_entries, vec![".github/PULL_REQUEST_TEMPLATE"]);
    }

    #[test]
    fn with_content_records_size() {
        let entry = FileEntry::with_content("# Title\n");
        assert!(entry.exists);
        assert_eq!(entry.size, Some(8));
        assert_eq!(entry.content.as_deref(), Some("# Title\n"));
    }
}
