//! Typed parameter rules.
//!
//! Each rule category deserializes into its own record with
//! `deny_unknown_fields`: a record missing a required key or carrying a key
//! outside its set fails the parse, and with it the whole file.
//!
//! ```yaml
//! find_replace:
//!   - find_value: "dev-server.database.windows.net"
//!     replace_value:
//!       PPE: "ppe-server.database.windows.net"
//!       PROD: "$ENV:PROD_SQL_SERVER"
//!     item_type: Notebook
//!     file_path: "**/notebook-content.py"
//!
//! key_value_replace:
//!   - find_key: "$.properties.activities[*].typeProperties.workspaceId"
//!     replace_value:
//!       PROD: "$workspace.id"
//!
//! spark_pool:
//!   - instance_pool_id: "72c68dbc-0775-4d59-909d-a47896f4573b"
//!     replace_value:
//!       PROD: { type: Capacity, name: ProdPool }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A filter that accepts either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    pub fn values(&self) -> Vec<&str> {
        match self {
            StringList::One(v) => vec![v.as_str()],
            StringList::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.values().contains(&candidate)
    }
}

/// `None` filters match everything.
pub(crate) fn filter_matches(filter: Option<&StringList>, candidate: &str) -> bool {
    filter.map_or(true, |f| f.contains(candidate))
}

/// Literal or regex text replacement in text files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindReplace {
    pub find_value: String,
    /// Environment → replacement expression.
    pub replace_value: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_regex: bool,
    #[serde(default)]
    pub item_type: Option<StringList>,
    #[serde(default)]
    pub item_name: Option<StringList>,
    #[serde(default)]
    pub file_path: Option<StringList>,
}

/// Target pool kind of a spark pool rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PoolType {
    Capacity,
    Workspace,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Capacity => "Capacity",
            PoolType::Workspace => "Workspace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolTarget {
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub name: String,
}

/// Rebinds an environment item's spark pool by instance pool id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SparkPool {
    pub instance_pool_id: String,
    pub replace_value: BTreeMap<String, PoolTarget>,
    #[serde(default)]
    pub item_name: Option<StringList>,
}

/// Replaces values addressed by a JSON path in JSON files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyValueReplace {
    pub find_key: String,
    pub replace_value: BTreeMap<String, Value>,
    #[serde(default)]
    pub item_type: Option<StringList>,
    #[serde(default)]
    pub item_name: Option<StringList>,
    #[serde(default)]
    pub file_path: Option<StringList>,
}

/// One rule from any category.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterRule {
    FindReplace(FindReplace),
    KeyValueReplace(KeyValueReplace),
    SparkPool(SparkPool),
}

impl ParameterRule {
    pub fn category(&self) -> &'static str {
        match self {
            ParameterRule::FindReplace(_) => "find_replace",
            ParameterRule::KeyValueReplace(_) => "key_value_replace",
            ParameterRule::SparkPool(_) => "spark_pool",
        }
    }

    /// Whether the rule defines a value for `environment`.
    pub fn targets(&self, environment: &str) -> bool {
        match self {
            ParameterRule::FindReplace(r) => r.replace_value.contains_key(environment),
            ParameterRule::KeyValueReplace(r) => r.replace_value.contains_key(environment),
            ParameterRule::SparkPool(r) => r.replace_value.contains_key(environment),
        }
    }

    /// String replacement expressions carried by the rule.
    pub(crate) fn replace_expressions(&self) -> Vec<&str> {
        match self {
            ParameterRule::FindReplace(r) => r.replace_value.values().map(String::as_str).collect(),
            ParameterRule::KeyValueReplace(r) => {
                r.replace_value.values().filter_map(Value::as_str).collect()
            }
            ParameterRule::SparkPool(_) => Vec::new(),
        }
    }
}

/// The whole file as written: a mapping of category → list of records.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ParameterFile {
    #[serde(default)]
    pub find_replace: Vec<FindReplace>,
    #[serde(default)]
    pub key_value_replace: Vec<KeyValueReplace>,
    #[serde(default)]
    pub spark_pool: Vec<SparkPool>,
}

/// Loaded parameter rules, in application order: every `find_replace`, then
/// every `key_value_replace`, then every `spark_pool`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentParameter {
    rules: Vec<ParameterRule>,
}

impl EnvironmentParameter {
    pub fn new(rules: Vec<ParameterRule>) -> Self {
        Self { rules }
    }

    pub(crate) fn from_file(file: ParameterFile) -> Self {
        let rules = file
            .find_replace
            .into_iter()
            .map(ParameterRule::FindReplace)
            .chain(file.key_value_replace.into_iter().map(ParameterRule::KeyValueReplace))
            .chain(file.spark_pool.into_iter().map(ParameterRule::SparkPool))
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[ParameterRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when any replacement refers to `$items.…`, which needs a fresh
    /// deployed snapshot before publishing.
    pub fn references_items(&self) -> bool {
        self.rules
            .iter()
            .flat_map(ParameterRule::replace_expressions)
            .any(|v| v.starts_with("$items"))
    }
}

fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "is_regex must be true or false, got '{other}'"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_order_is_find_then_key_value_then_spark_pool() {
        let file: ParameterFile = serde_yaml::from_str(
            r#"
spark_pool:
  - instance_pool_id: p
    replace_value: { PROD: { type: Workspace, name: pool } }
key_value_replace:
  - find_key: "$.a"
    replace_value: { PROD: 1 }
find_replace:
  - find_value: x
    replace_value: { PROD: y }
"#,
        )
        .unwrap();
        let params = EnvironmentParameter::from_file(file);
        let categories: Vec<_> = params.rules().iter().map(ParameterRule::category).collect();
        assert_eq!(categories, vec!["find_replace", "key_value_replace", "spark_pool"]);
    }

    #[test]
    fn is_regex_accepts_string_form() {
        let rule: FindReplace = serde_yaml::from_str(
            "find_value: 'a(b)'\nreplace_value: { PROD: c }\nis_regex: \"True\"\n",
        )
        .unwrap();
        assert!(rule.is_regex);
    }

    #[test]
    fn filters_accept_scalar_or_list() {
        let rule: FindReplace = serde_yaml::from_str(
            "find_value: a\nreplace_value: { PROD: b }\nitem_type: Notebook\nitem_name: [x, y]\n",
        )
        .unwrap();
        assert!(filter_matches(rule.item_type.as_ref(), "Notebook"));
        assert!(filter_matches(rule.item_name.as_ref(), "y"));
        assert!(!filter_matches(rule.item_name.as_ref(), "z"));
        assert!(filter_matches(rule.file_path.as_ref(), "anything"));
    }

    #[test]
    fn references_items_only_when_expression_used() {
        let rule: FindReplace = serde_yaml::from_str(
            "find_value: a\nreplace_value: { PROD: \"$items.Lakehouse.lh.id\" }\n",
        )
        .unwrap();
        let params = EnvironmentParameter::new(vec![ParameterRule::FindReplace(rule)]);
        assert!(params.references_items());
        assert!(!EnvironmentParameter::default().references_items());
    }
}
