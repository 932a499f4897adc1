//! Workspace folder manifest and folder path helpers.
//!
//! Folder paths are stored relative and slash-separated without leading or
//! trailing slashes (`"Analytics/Daily"`). The repository root itself is the
//! empty path and never appears as a folder.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::catalog::FOLDER_MANIFEST;
use crate::error::{io_err, parse_err, CoreError};

/// Folder path → folder id.
pub type FolderMap = BTreeMap<String, String>;

/// Characters the remote workspace rejects in folder names.
const INVALID_FOLDER_CHARS: &str = r##"[~"#.%&*:<>?/\\{|}]"##;

#[derive(Debug, Deserialize)]
struct FolderRecord {
    path: String,
    id: String,
}

/// Load `<root>/.workspace_folders.json`. A missing manifest yields an empty map.
pub fn load_folder_manifest(root: &Path) -> Result<FolderMap, CoreError> {
    let path = root.join(FOLDER_MANIFEST);
    if !path.exists() {
        return Ok(FolderMap::new());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let records: Vec<FolderRecord> =
        serde_json::from_str(&contents).map_err(|e| parse_err(&path, e.to_string()))?;

    let mut folders = FolderMap::new();
    for record in records {
        let normalized = normalize_folder_path(&record.path);
        if normalized.is_empty() {
            continue;
        }
        validate_folder_path(&normalized).map_err(|msg| parse_err(&path, msg))?;
        folders.insert(normalized, record.id);
    }
    Ok(folders)
}

/// Strip surrounding slashes and convert backslashes.
pub fn normalize_folder_path(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

/// Reject empty segments and characters the remote workspace does not accept.
pub fn validate_folder_path(path: &str) -> Result<(), String> {
    let invalid = Regex::new(INVALID_FOLDER_CHARS).map_err(|e| e.to_string())?;
    for segment in path.split('/') {
        if segment.trim().is_empty() {
            return Err(format!("folder path '{path}' contains an empty segment"));
        }
        if invalid.is_match(segment) {
            return Err(format!(
                "folder name '{segment}' in '{path}' contains invalid characters"
            ));
        }
    }
    Ok(())
}

/// Parent folder path, or `None` for a top-level folder.
pub fn parent_folder(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Last path segment.
pub fn folder_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Number of segments; used to order creates parent-first and deletes child-first.
pub fn folder_depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(load_folder_manifest(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn manifest_paths_are_normalized() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(FOLDER_MANIFEST),
            r#"[{"path":"/Analytics/","id":"f1"},{"path":"Analytics/Daily","id":"f2"}]"#,
        )
        .unwrap();
        let folders = load_folder_manifest(tmp.path()).unwrap();
        assert_eq!(folders.get("Analytics").map(String::as_str), Some("f1"));
        assert_eq!(folders.get("Analytics/Daily").map(String::as_str), Some("f2"));
    }

    #[test]
    fn invalid_folder_name_fails_manifest_load() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(FOLDER_MANIFEST),
            r#"[{"path":"Bad*Name","id":"f1"}]"#,
        )
        .unwrap();
        let err = load_folder_manifest(tmp.path()).unwrap_err();
        assert!(matches!(err, CoreError::Parsing { .. }), "got: {err}");
    }

    #[test]
    fn path_helpers() {
        assert_eq!(parent_folder("a/b/c"), Some("a/b"));
        assert_eq!(parent_folder("a"), None);
        assert_eq!(folder_name("a/b/c"), "c");
        assert_eq!(folder_depth("a/b/c"), 3);
        assert_eq!(folder_depth(""), 0);
    }
}
