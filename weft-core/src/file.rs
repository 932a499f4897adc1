//! [`FileItem`] — one physical file backing an item.
//!
//! Files are classified by extension: `.json` and `.txt` are text, everything
//! else is binary. Text files keep their raw string plus a parsed JSON view
//! when the text is valid JSON; a parse failure only means the view is absent.
//! Every mutation goes through this type so the raw text and the JSON view
//! never drift apart.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::catalog::MARKER_FILE;
use crate::error::{io_err, parse_err, CoreError};

/// Content classification, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Binary,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") | Some("txt") => FileKind::Text,
            _ => FileKind::Binary,
        }
    }
}

/// Loaded file contents.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContents {
    Text { raw: String, json: Option<Value> },
    Binary(Vec<u8>),
}

/// One entry of a `definition.parts` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionPart {
    pub path: String,
    pub payload: String,
    pub payload_type: &'static str,
}

/// A file inside an item directory.
#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    item_path: PathBuf,
    file_path: PathBuf,
    contents: FileContents,
}

impl FileItem {
    /// Read `file_path` from disk, classifying it by extension.
    pub fn load(
        item_path: impl Into<PathBuf>,
        file_path: impl Into<PathBuf>,
    ) -> Result<Self, CoreError> {
        let item_path = item_path.into();
        let file_path = file_path.into();
        let item = match FileKind::from_path(&file_path) {
            FileKind::Text => {
                let raw =
                    std::fs::read_to_string(&file_path).map_err(|e| io_err(&file_path, e))?;
                Self::from_text(item_path, file_path, raw)
            }
            FileKind::Binary => {
                let bytes = std::fs::read(&file_path).map_err(|e| io_err(&file_path, e))?;
                Self::from_bytes(item_path, file_path, bytes)
            }
        };
        Ok(item)
    }

    /// Build a text file from an in-memory string.
    pub fn from_text(
        item_path: impl Into<PathBuf>,
        file_path: impl Into<PathBuf>,
        raw: impl Into<String>,
    ) -> Self {
        let raw = raw.into();
        let json = serde_json::from_str(&raw).ok();
        Self {
            item_path: item_path.into(),
            file_path: file_path.into(),
            contents: FileContents::Text { raw, json },
        }
    }

    /// Build a binary file from in-memory bytes.
    pub fn from_bytes(
        item_path: impl Into<PathBuf>,
        file_path: impl Into<PathBuf>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            item_path: item_path.into(),
            file_path: file_path.into(),
            contents: FileContents::Binary(bytes),
        }
    }

    pub fn item_path(&self) -> &Path {
        &self.item_path
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn contents(&self) -> &FileContents {
        &self.contents
    }

    pub fn kind(&self) -> FileKind {
        match self.contents {
            FileContents::Text { .. } => FileKind::Text,
            FileContents::Binary(_) => FileKind::Binary,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_path.file_name().and_then(|n| n.to_str())
    }

    /// True for the item's `.platform` marker.
    pub fn is_marker(&self) -> bool {
        self.file_name() == Some(MARKER_FILE)
    }

    /// Item-root-relative path with forward slashes.
    pub fn relative_path(&self) -> String {
        let rel = self
            .file_path
            .strip_prefix(&self.item_path)
            .unwrap_or(&self.file_path);
        rel.to_string_lossy().replace('\\', "/")
    }

    pub fn text(&self) -> Option<&str> {
        match &self.contents {
            FileContents::Text { raw, .. } => Some(raw),
            FileContents::Binary(_) => None,
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.contents {
            FileContents::Text { json, .. } => json.as_ref(),
            FileContents::Binary(_) => None,
        }
    }

    /// Replace the raw text and re-derive the JSON view. No-op for binary files.
    pub fn set_text(&mut self, new_raw: String) {
        if let FileContents::Text { raw, json } = &mut self.contents {
            *json = serde_json::from_str(&new_raw).ok();
            *raw = new_raw;
        }
    }

    /// Replace every occurrence of `find` in the raw text. Returns whether the
    /// text changed.
    pub fn replace_text(&mut self, find: &str, replace: &str) -> bool {
        let Some(raw) = self.text() else {
            return false;
        };
        if find.is_empty() || !raw.contains(find) {
            return false;
        }
        let updated = raw.replace(find, replace);
        self.set_text(updated);
        true
    }

    /// Run `edit` against the JSON view. When the document actually changed,
    /// the raw text is re-serialized in the layout it was written in (compact,
    /// or pretty with the same indent and trailing newline).
    pub fn edit_json(&mut self, edit: impl FnOnce(&mut Value) -> bool) -> bool {
        let FileContents::Text { raw, json } = &mut self.contents else {
            return false;
        };
        let Some(doc) = json.as_mut() else {
            return false;
        };
        let before = doc.clone();
        if !edit(doc) || *doc == before {
            *doc = before;
            return false;
        }
        match serialize_like(raw, doc) {
            Some(serialized) => {
                *raw = serialized;
                true
            }
            None => false,
        }
    }

    /// Parse the payload as YAML into a JSON value.
    pub fn yaml(&self) -> Result<Value, CoreError> {
        let text = std::str::from_utf8(self.payload_bytes())
            .map_err(|e| parse_err(&self.file_path, e.to_string()))?;
        serde_yaml::from_str(text).map_err(|e| parse_err(&self.file_path, e.to_string()))
    }

    /// Set `key` to `value` on every JSON object in the document that already
    /// has that key. Returns the number of values that changed.
    pub fn replace_json_key(&mut self, key: &str, value: &str) -> usize {
        let mut changed = 0;
        self.edit_json(|doc| {
            changed = replace_key_recursive(doc, key, value);
            changed > 0
        });
        changed
    }

    /// Bytes that go on the wire.
    pub fn payload_bytes(&self) -> &[u8] {
        match &self.contents {
            FileContents::Text { raw, .. } => raw.as_bytes(),
            FileContents::Binary(bytes) => bytes,
        }
    }

    /// Base64 inline part for a `definition.parts` array.
    pub fn definition_part(&self) -> DefinitionPart {
        DefinitionPart {
            path: self.relative_path(),
            payload: STANDARD.encode(self.payload_bytes()),
            payload_type: "InlineBase64",
        }
    }
}

/// Serialize `doc` following the layout of `original`.
fn serialize_like(original: &str, doc: &Value) -> Option<String> {
    let body = original.trim_end();
    let mut out = if body.contains('\n') {
        let indent = detect_indent(body);
        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
        doc.serialize(&mut ser).ok()?;
        String::from_utf8(buf).ok()?
    } else {
        serde_json::to_string(doc).ok()?
    };
    out.push_str(&original[body.len()..]);
    Some(out)
}

/// Leading whitespace of the first indented line; two spaces when none is.
fn detect_indent(text: &str) -> String {
    text.lines()
        .skip(1)
        .map(|line| {
            line.chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect::<String>()
        })
        .find(|ws| !ws.is_empty())
        .unwrap_or_else(|| "  ".to_string())
}

fn replace_key_recursive(node: &mut Value, key: &str, value: &str) -> usize {
    match node {
        Value::Object(map) => {
            let mut changed = 0;
            if let Some(existing) = map.get_mut(key) {
                if existing.as_str() != Some(value) {
                    *existing = Value::String(value.to_string());
                    changed += 1;
                }
            }
            for (k, child) in map.iter_mut() {
                if k != key {
                    changed += replace_key_recursive(child, key, value);
                }
            }
            changed
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|child| replace_key_recursive(child, key, value))
            .sum(),
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
