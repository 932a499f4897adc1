//! Applying parameter rules to an item's files.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;
use weft_core::{FileItem, Item, ItemType};

use crate::error::ParameterError;
use crate::model::{
    filter_matches, EnvironmentParameter, FindReplace, KeyValueReplace, ParameterRule, PoolTarget,
    StringList,
};
use crate::resolve::ResolveContext;

/// Inputs shared by every rule application in one publish.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub environment: &'a str,
    pub repository_root: &'a Path,
    pub values: ResolveContext<'a>,
}

/// Apply every rule to `item`. Returns the number of files changed.
pub fn apply_parameters(
    params: &EnvironmentParameter,
    item: &mut Item,
    ctx: &ApplyContext<'_>,
) -> Result<usize, ParameterError> {
    let mut changed = 0;
    for rule in params.rules() {
        if !rule.targets(ctx.environment) {
            debug!(
                "{} rule has no value for environment '{}', skipping",
                rule.category(),
                ctx.environment
            );
            continue;
        }
        changed += match rule {
            ParameterRule::FindReplace(r) => apply_find_replace(r, item, ctx)?,
            ParameterRule::KeyValueReplace(r) => apply_key_value(r, item, ctx)?,
            // Applied to the environment's compute settings at publish time.
            ParameterRule::SparkPool(_) => 0,
        };
    }
    Ok(changed)
}

fn item_selected(
    item: &Item,
    item_type: Option<&StringList>,
    item_name: Option<&StringList>,
) -> bool {
    filter_matches(item_type, item.item_type().as_str()) && filter_matches(item_name, item.name())
}

fn apply_find_replace(
    rule: &FindReplace,
    item: &mut Item,
    ctx: &ApplyContext<'_>,
) -> Result<usize, ParameterError> {
    if !item_selected(item, rule.item_type.as_ref(), rule.item_name.as_ref()) {
        return Ok(0);
    }
    let Some(expr) = rule.replace_value.get(ctx.environment) else {
        return Ok(0);
    };
    // Resolved on first use, so a `$items` reference only has to exist
    // for items that actually contain the find value.
    let mut replacement: Option<String> = None;
    let paths = PathFilter::new(rule.file_path.as_ref(), ctx.repository_root)?;
    let pattern = if rule.is_regex {
        Some(Regex::new(&rule.find_value).map_err(|e| ParameterError::RegexMatch {
            pattern: rule.find_value.clone(),
            message: e.to_string(),
        })?)
    } else {
        None
    };

    let mut changed = 0;
    for file in item.files.iter_mut() {
        if file.is_marker() || !paths.matches(file) {
            continue;
        }
        let Some(text) = file.text() else {
            continue;
        };
        let find = match &pattern {
            Some(re) => match captured_value(re, text, &rule.find_value)? {
                Some(value) => value,
                None => continue,
            },
            None => rule.find_value.clone(),
        };
        if !text.contains(find.as_str()) {
            continue;
        }
        let value = match &replacement {
            Some(v) => v.clone(),
            None => {
                let v = ctx.values.resolve_str(expr)?;
                replacement = Some(v.clone());
                v
            }
        };
        if file.replace_text(&find, &value) {
            debug!("replaced '{find}' in {}", file.relative_path());
            changed += 1;
        }
    }
    Ok(changed)
}

/// Value of capture group 1 at the first match, if any.
fn captured_value(re: &Regex, text: &str, pattern: &str) -> Result<Option<String>, ParameterError> {
    let Some(caps) = re.captures(text) else {
        return Ok(None);
    };
    match caps.get(1).map(|m| m.as_str()) {
        Some(value) if !value.is_empty() => Ok(Some(value.to_string())),
        _ => Err(ParameterError::RegexMatch {
            pattern: pattern.to_string(),
            message: "captured an empty value".into(),
        }),
    }
}

fn apply_key_value(
    rule: &KeyValueReplace,
    item: &mut Item,
    ctx: &ApplyContext<'_>,
) -> Result<usize, ParameterError> {
    if !item_selected(item, rule.item_type.as_ref(), rule.item_name.as_ref()) {
        return Ok(0);
    }
    let Some(raw) = rule.replace_value.get(ctx.environment) else {
        return Ok(0);
    };
    let segments = parse_json_path(&rule.find_key).map_err(|message| ParameterError::ReplaceValue {
        value: rule.find_key.clone(),
        message,
    })?;
    let paths = PathFilter::new(rule.file_path.as_ref(), ctx.repository_root)?;

    let mut resolved: Option<Value> = None;
    let mut changed = 0;
    for file in item.files.iter_mut() {
        if file.is_marker() || !paths.matches(file) {
            continue;
        }
        if !file.json().is_some_and(|doc| path_exists(doc, &segments)) {
            continue;
        }
        let value = match &resolved {
            Some(v) => v.clone(),
            None => {
                let v = match raw {
                    Value::String(expr) => Value::String(ctx.values.resolve_str(expr)?),
                    other => other.clone(),
                };
                resolved = Some(v.clone());
                v
            }
        };
        if file.edit_json(|doc| set_at_path(doc, &segments, &value) > 0) {
            changed += 1;
        }
    }
    Ok(changed)
}

/// Rebind instance pools in an environment's compute settings document.
/// Returns the number of pools replaced.
pub fn apply_spark_pools(
    params: &EnvironmentParameter,
    environment: &str,
    environment_name: &str,
    settings: &mut Value,
) -> usize {
    let mut changed = 0;
    for rule in params.rules() {
        let ParameterRule::SparkPool(rule) = rule else {
            continue;
        };
        if !filter_matches(rule.item_name.as_ref(), environment_name) {
            continue;
        }
        let Some(target) = rule.replace_value.get(environment) else {
            debug!("spark_pool rule has no value for environment '{environment}', skipping");
            continue;
        };
        changed += rebind_pool(settings, &rule.instance_pool_id, &pool_value(target));
    }
    changed
}

fn pool_value(target: &PoolTarget) -> Value {
    let mut pool = Map::new();
    pool.insert("name".into(), Value::String(target.name.clone()));
    pool.insert("type".into(), Value::String(target.pool_type.as_str().to_string()));
    Value::Object(pool)
}

/// Replace `instance_pool_id: <id>` with `instancePool: {name, type}` in every
/// object that carries it.
fn rebind_pool(node: &mut Value, pool_id: &str, pool: &Value) -> usize {
    match node {
        Value::Object(map) => {
            let mut changed = 0;
            if map.get("instance_pool_id").and_then(Value::as_str) == Some(pool_id) {
                map.remove("instance_pool_id");
                map.insert("instancePool".into(), pool.clone());
                changed += 1;
            }
            for child in map.values_mut() {
                changed += rebind_pool(child, pool_id, pool);
            }
            changed
        }
        Value::Array(items) => items.iter_mut().map(|c| rebind_pool(c, pool_id, pool)).sum(),
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// File path filter
// ---------------------------------------------------------------------------

/// `file_path` filter: repository-relative paths, absolute paths and globs.
struct PathFilter<'a> {
    globs: Option<GlobSet>,
    root: &'a Path,
}

impl<'a> PathFilter<'a> {
    fn new(filter: Option<&StringList>, root: &'a Path) -> Result<Self, ParameterError> {
        let Some(filter) = filter else {
            return Ok(Self { globs: None, root });
        };
        let mut builder = GlobSetBuilder::new();
        for pattern in filter.values() {
            let relative = Path::new(pattern)
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| pattern.replace('\\', "/"));
            let glob = Glob::new(relative.trim_start_matches("./")).map_err(|source| {
                ParameterError::Glob {
                    pattern: pattern.to_string(),
                    source,
                }
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| ParameterError::Glob {
            pattern: filter.values().join(", "),
            source,
        })?;
        Ok(Self {
            globs: Some(globs),
            root,
        })
    }

    fn matches(&self, file: &FileItem) -> bool {
        let Some(globs) = &self.globs else {
            return true;
        };
        let relative = file
            .file_path()
            .strip_prefix(self.root)
            .unwrap_or(file.file_path())
            .to_string_lossy()
            .replace('\\', "/");
        globs.is_match(relative)
    }
}

// ---------------------------------------------------------------------------
// JSON path subset: $.a.b, [n], [*]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Parse `$.a.b[0][*].c`. Keys are dot-separated; brackets hold an index or `*`.
pub fn parse_json_path(path: &str) -> Result<Vec<PathSegment>, String> {
    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| format!("JSON path '{path}' must start with '$'"))?;
    let mut segments = Vec::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                let mut key = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '.' || next == '[' {
                        break;
                    }
                    key.push(next);
                    chars.next();
                }
                if key.is_empty() {
                    return Err(format!("JSON path '{path}' has an empty key"));
                }
                segments.push(PathSegment::Key(key));
            }
            '[' => {
                let mut inner = String::new();
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    inner.push(next);
                }
                let inner = inner.trim();
                if inner == "*" {
                    segments.push(PathSegment::Wildcard);
                } else {
                    let index = inner
                        .parse()
                        .map_err(|_| format!("JSON path '{path}' has invalid index '{inner}'"))?;
                    segments.push(PathSegment::Index(index));
                }
            }
            other => return Err(format!("unexpected '{other}' in JSON path '{path}'")),
        }
    }
    if segments.is_empty() {
        return Err(format!("JSON path '{path}' selects the whole document"));
    }
    Ok(segments)
}

/// Set every existing value addressed by `segments`. Returns how many changed.
pub fn set_at_path(node: &mut Value, segments: &[PathSegment], value: &Value) -> usize {
    let Some((head, tail)) = segments.split_first() else {
        return 0;
    };
    let last = tail.is_empty();
    let mut visit = |child: &mut Value| -> usize {
        if last {
            if child != value {
                *child = value.clone();
                1
            } else {
                0
            }
        } else {
            set_at_path(child, tail, value)
        }
    };
    match (head, node) {
        (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key).map_or(0, &mut visit),
        (PathSegment::Index(i), Value::Array(items)) => items.get_mut(*i).map_or(0, &mut visit),
        (PathSegment::Wildcard, Value::Array(items)) => items.iter_mut().map(&mut visit).sum(),
        (PathSegment::Wildcard, Value::Object(map)) => map.values_mut().map(&mut visit).sum(),
        _ => 0,
    }
}

fn path_exists(node: &Value, segments: &[PathSegment]) -> bool {
    let Some((head, tail)) = segments.split_first() else {
        return true;
    };
    match (head, node) {
        (PathSegment::Key(key), Value::Object(map)) => {
            map.get(key).is_some_and(|c| path_exists(c, tail))
        }
        (PathSegment::Index(i), Value::Array(items)) => {
            items.get(*i).is_some_and(|c| path_exists(c, tail))
        }
        (PathSegment::Wildcard, Value::Array(items)) => items.iter().any(|c| path_exists(c, tail)),
        (PathSegment::Wildcard, Value::Object(map)) => map.values().any(|c| path_exists(c, tail)),
        _ => false,
    }
}
