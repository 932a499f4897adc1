//! Caller input validation. Every failure is a [`CoreError::Input`].

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::CoreError;
use crate::types::{ItemType, WorkspaceId};

const GUID_PATTERN: &str =
    r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12}$";

/// Accept only GUID-shaped workspace ids.
pub fn validate_workspace_id(input: &str) -> Result<WorkspaceId, CoreError> {
    let guid = Regex::new(GUID_PATTERN).map_err(|e| CoreError::Input(e.to_string()))?;
    if !guid.is_match(input) {
        return Err(CoreError::Input(format!(
            "the provided workspace id '{input}' is not a valid guid"
        )));
    }
    Ok(WorkspaceId(input.to_string()))
}

/// The repository directory must exist; the returned path is canonical.
pub fn validate_repository_directory(input: &Path) -> Result<PathBuf, CoreError> {
    if !input.is_dir() {
        return Err(CoreError::Input(format!(
            "the provided repository directory '{}' does not exist",
            input.display()
        )));
    }
    let canonical = input.canonicalize().map_err(|e| {
        CoreError::Input(format!("cannot resolve '{}': {e}", input.display()))
    })?;
    if canonical != input {
        tracing::info!(
            "relative directory path '{}' resolved as '{}'",
            input.display(),
            canonical.display()
        );
    }
    Ok(canonical)
}

/// Parse item type names; an empty list means the full catalog.
pub fn validate_item_types(inputs: &[String]) -> Result<Vec<ItemType>, CoreError> {
    if inputs.is_empty() {
        return Ok(ItemType::ALL.to_vec());
    }
    let mut types = Vec::with_capacity(inputs.len());
    for input in inputs {
        let parsed: ItemType = input.parse()?;
        if !types.contains(&parsed) {
            types.push(parsed);
        }
    }
    Ok(types)
}

/// Compile a user-supplied regex, naming the option it came from on failure.
pub fn compile_regex(pattern: &str, option: &str) -> Result<Regex, CoreError> {
    Regex::new(pattern).map_err(|e| CoreError::Input(format!("invalid {option} regex: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("8f5d8f0c-1a2b-4c3d-9e8f-0123456789ab", true)]
    #[case("8F5D8F0C-1A2B-4C3D-9E8F-0123456789AB", true)]
    #[case("not-a-guid", false)]
    #[case("8f5d8f0c1a2b4c3d9e8f0123456789ab", false)]
    fn workspace_id_format(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(validate_workspace_id(input).is_ok(), ok);
    }

    #[test]
    fn missing_directory_is_input_error() {
        let tmp = TempDir::new().unwrap();
        let err = validate_repository_directory(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, CoreError::Input(_)));
    }

    #[test]
    fn existing_directory_is_canonicalized() {
        let tmp = TempDir::new().unwrap();
        let resolved = validate_repository_directory(tmp.path()).unwrap();
        assert!(resolved.is_absolute());
    }

    #[test]
    fn item_types_dedup_and_reject_unknown() {
        let parsed = validate_item_types(&["Notebook".into(), "Notebook".into()]).unwrap();
        assert_eq!(parsed, vec![ItemType::Notebook]);
        assert!(validate_item_types(&["Nope".into()]).is_err());
        assert_eq!(validate_item_types(&[]).unwrap().len(), ItemType::ALL.len());
    }

    #[test]
    fn bad_regex_names_the_option() {
        let err = compile_regex("(", "item name exclude").unwrap_err();
        assert!(err.to_string().contains("item name exclude"));
    }
}
