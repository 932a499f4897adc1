//! Parameter file loading.
//!
//! Loading is fail-closed: `$ENV:` interpolation, YAML parsing, record shape
//! and every load-time check must all succeed, otherwise no rule is returned.

use std::path::Path;

use globset::Glob;
use regex::Regex;
use tracing::{debug, info, warn};
use weft_core::ItemType;

use crate::error::{invalid, io_err, ParameterError};
use crate::model::{EnvironmentParameter, ParameterFile, ParameterRule, StringList};
use crate::resolve::ReplaceValue;

const ENV_TOKEN: &str = r"\$ENV:([A-Za-z_][A-Za-z0-9_]*)";

/// Load the parameter file at `path`.
///
/// Returns `Ok(None)` when the file does not exist. `environment` is only used
/// to report how many rules target it.
pub fn load(
    path: &Path,
    environment: Option<&str>,
) -> Result<Option<EnvironmentParameter>, ParameterError> {
    load_with_env(path, environment, |name| std::env::var(name).ok())
}

/// [`load`] with an explicit environment-variable lookup.
pub fn load_with_env(
    path: &Path,
    environment: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<EnvironmentParameter>, ParameterError> {
    if !path.exists() {
        warn!("parameter file not found at {}, skipping parameterization", path.display());
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let params = parse(path, &raw, &lookup)?;

    match environment {
        Some(env) => {
            let targeting = params.rules().iter().filter(|r| r.targets(env)).count();
            info!(
                "parameter file loaded: {} rules, {targeting} with values for '{env}'",
                params.rules().len()
            );
        }
        None => info!("parameter file loaded: {} rules", params.rules().len()),
    }
    Ok(Some(params))
}

fn parse(
    path: &Path,
    raw: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<EnvironmentParameter, ParameterError> {
    if raw.trim().is_empty() {
        return Err(invalid(path, "file is empty"));
    }
    let text = interpolate_env(raw, lookup)?;
    let file: ParameterFile = serde_yaml::from_str(&text).map_err(|source| ParameterError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    let params = EnvironmentParameter::from_file(file);
    for (index, rule) in params.rules().iter().enumerate() {
        validate_rule(rule)
            .map_err(|message| invalid(path, format!("{} rule #{}: {message}", rule.category(), index + 1)))?;
    }
    debug!("parameter file content is valid");
    Ok(params)
}

/// Replace every `$ENV:NAME` token with the variable's value. An unset
/// variable is an error. Tokens in YAML comments are left alone.
pub fn interpolate_env(
    raw: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ParameterError> {
    let token = Regex::new(ENV_TOKEN).map_err(|e| ParameterError::RegexMatch {
        pattern: ENV_TOKEN.to_string(),
        message: e.to_string(),
    })?;
    let mut out = String::with_capacity(raw.len());
    for line in raw.split_inclusive('\n') {
        let (content, comment) = line.split_at(comment_start(line).unwrap_or(line.len()));
        let mut last = 0;
        for caps in token.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = lookup(name.as_str())
                .ok_or_else(|| ParameterError::MissingEnvVar(name.as_str().to_string()))?;
            out.push_str(&content[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
        }
        out.push_str(&content[last..]);
        out.push_str(comment);
    }
    Ok(out)
}

/// Byte offset of the `#` opening a YAML comment on `line`, if any. A `#`
/// starts a comment at line start or after whitespace, outside quotes.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some('"'), '\\') => {
                chars.next();
            }
            (Some('\''), '\'') if chars.peek().map(|&(_, n)| n) == Some('\'') => {
                chars.next();
            }
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if prev.map_or(true, |p| p.is_whitespace() || "[{,".contains(p)) => {
                quote = Some(c);
            }
            (None, '#') if prev.map_or(true, char::is_whitespace) => return Some(i),
            (None, _) => {}
        }
        prev = Some(c);
    }
    None
}

fn validate_rule(rule: &ParameterRule) -> Result<(), String> {
    match rule {
        ParameterRule::FindReplace(r) => {
            if r.find_value.is_empty() {
                return Err("find_value is empty".into());
            }
            if r.is_regex {
                let re = Regex::new(&r.find_value)
                    .map_err(|e| format!("find_value is not a valid regex: {e}"))?;
                if re.captures_len() != 2 {
                    return Err(format!(
                        "regex '{}' must contain exactly one capture group",
                        r.find_value
                    ));
                }
            }
            validate_item_types(r.item_type.as_ref())?;
            validate_globs(r.file_path.as_ref())?;
            validate_expressions(rule)
        }
        ParameterRule::KeyValueReplace(r) => {
            crate::apply::parse_json_path(&r.find_key)?;
            validate_item_types(r.item_type.as_ref())?;
            validate_globs(r.file_path.as_ref())?;
            validate_expressions(rule)
        }
        ParameterRule::SparkPool(r) => {
            if r.instance_pool_id.is_empty() {
                return Err("instance_pool_id is empty".into());
            }
            Ok(())
        }
    }
}

fn validate_item_types(filter: Option<&StringList>) -> Result<(), String> {
    for value in filter.map(StringList::values).unwrap_or_default() {
        value.parse::<ItemType>().map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn validate_globs(filter: Option<&StringList>) -> Result<(), String> {
    for value in filter.map(StringList::values).unwrap_or_default() {
        Glob::new(value).map_err(|e| format!("invalid file_path '{value}': {e}"))?;
    }
    Ok(())
}

fn validate_expressions(rule: &ParameterRule) -> Result<(), String> {
    for expr in rule.replace_expressions() {
        ReplaceValue::parse(expr).map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    fn write(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("parameter.yml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let loaded = load_with_env(&tmp.path().join("parameter.yml"), None, vars(&[])).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn env_tokens_are_interpolated_before_parsing() {
        let out = interpolate_env("a: $ENV:HOST_NAME/x and $ENV:PORT", vars(&[("HOST_NAME", "h"), ("PORT", "1")]))
            .unwrap();
        assert_eq!(out, "a: h/x and 1");
    }

    #[test]
    fn env_tokens_in_comments_are_ignored() {
        let raw = "# set $ENV:UNSET_IN_COMMENT before running\na: $ENV:HOST # or $ENV:OTHER\nb: \"x # $ENV:HOST\"\nc: 'it''s # $ENV:HOST'\nd: x#$ENV:HOST\n";
        let out = interpolate_env(raw, vars(&[("HOST", "h")])).unwrap();
        assert_eq!(
            out,
            "# set $ENV:UNSET_IN_COMMENT before running\na: h # or $ENV:OTHER\nb: \"x # h\"\nc: 'it''s # h'\nd: x#h\n"
        );
    }

    #[test]
    fn commented_out_token_does_not_fail_load() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "find_replace:\n  - find_value: a\n    # replace_value: { PROD: $ENV:NOT_SET }\n    replace_value: { PROD: b }\n",
        );
        let loaded = load_with_env(&path, Some("PROD"), vars(&[])).unwrap();
        assert!(loaded.is_some());
    }

    #[test]
    fn unset_env_var_fails() {
        let err = interpolate_env("$ENV:NOPE", vars(&[])).unwrap_err();
        assert!(matches!(err, ParameterError::MissingEnvVar(ref n) if n == "NOPE"));
    }

    #[test]
    fn find_replace_without_replace_value_fails_whole_load() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            r#"
find_replace:
  - find_value: ok
    replace_value: { PROD: fine }
  - find_value: broken
key_value_replace:
  - find_key: "$.a"
    replace_value: { PROD: 1 }
"#,
        );
        let err = load_with_env(&path, Some("PROD"), vars(&[])).unwrap_err();
        assert!(matches!(err, ParameterError::Yaml { .. }), "got: {err}");
        assert!(err.to_string().contains("replace_value"));
    }

    #[test]
    fn unknown_key_fails_whole_load() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "spark_pool:\n  - instance_pool_id: p\n    replace_value: { PROD: { type: Capacity, name: n } }\n    item_type: Environment\n",
        );
        assert!(load_with_env(&path, None, vars(&[])).is_err());
    }

    #[test]
    fn unknown_category_fails_whole_load() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "find_and_replace: []\n");
        assert!(load_with_env(&path, None, vars(&[])).is_err());
    }

    #[test]
    fn regex_needs_exactly_one_capture_group() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "find_replace:\n  - find_value: 'db=(\\w+);(\\w+)'\n    replace_value: { PROD: x }\n    is_regex: true\n",
        );
        let err = load_with_env(&path, None, vars(&[])).unwrap_err();
        assert!(err.to_string().contains("exactly one capture group"), "got: {err}");
    }

    #[test]
    fn item_type_filter_must_be_catalog_type() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "find_replace:\n  - find_value: a\n    replace_value: { PROD: b }\n    item_type: Spreadsheet\n",
        );
        let err = load_with_env(&path, None, vars(&[])).unwrap_err();
        assert!(matches!(err, ParameterError::Invalid { .. }), "got: {err}");
    }

    #[test]
    fn malformed_items_expression_fails_load() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "find_replace:\n  - find_value: a\n    replace_value: { PROD: \"$items.Lakehouse.lh.owner\" }\n",
        );
        assert!(load_with_env(&path, None, vars(&[])).is_err());
    }

    #[test]
    fn bad_spark_pool_type_fails_load() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "spark_pool:\n  - instance_pool_id: p\n    replace_value: { PROD: { type: Cluster, name: n } }\n",
        );
        assert!(load_with_env(&path, None, vars(&[])).is_err());
    }

    #[test]
    fn valid_file_loads_all_rules() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            r#"
find_replace:
  - find_value: "dev-conn"
    replace_value:
      PROD: "$ENV:PROD_CONN"
    item_type: [Notebook, DataPipeline]
    file_path: "**/*.json"
key_value_replace:
  - find_key: "$.properties.activities[*].typeProperties.workspaceId"
    replace_value: { PROD: "$workspace.id" }
spark_pool:
  - instance_pool_id: "72c68dbc"
    replace_value:
      PROD: { type: Capacity, name: ProdPool }
"#,
        );
        let params = load_with_env(&path, Some("PROD"), vars(&[("PROD_CONN", "prod-conn")]))
            .unwrap()
            .unwrap();
        assert_eq!(params.rules().len(), 3);
        match &params.rules()[0] {
            ParameterRule::FindReplace(r) => assert_eq!(r.replace_value["PROD"], "prod-conn"),
            other => panic!("unexpected rule {other:?}"),
        }
    }
}
