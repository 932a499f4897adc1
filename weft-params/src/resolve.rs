//! Replacement value expressions.
//!
//! | expression                           | resolves to                          |
//! |--------------------------------------|--------------------------------------|
//! | `$workspace.id`                      | target workspace id                  |
//! | `$items.<type>.<name>.id`            | deployed item guid                   |
//! | `$items.<type>.<name>.sqlendpoint`   | lakehouse SQL endpoint               |
//! | anything else                        | itself                               |

use std::collections::BTreeMap;

use weft_core::ItemType;

use crate::error::ParameterError;

const WORKSPACE_ID: &str = "$workspace.id";
const ITEMS_PREFIX: &str = "$items.";

/// What the workspace knows about one deployed item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceItemRef {
    pub id: String,
    pub sql_endpoint: Option<String>,
}

/// `type → name → ref`, rebuilt with every deployed-state refresh.
pub type WorkspaceItems = BTreeMap<ItemType, BTreeMap<String, WorkspaceItemRef>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAttribute {
    Id,
    SqlEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceValue {
    Literal(String),
    WorkspaceId,
    Item {
        item_type: ItemType,
        name: String,
        attribute: ItemAttribute,
    },
}

impl ReplaceValue {
    /// Parse an expression. Only `$items.` references can fail.
    pub fn parse(raw: &str) -> Result<Self, ParameterError> {
        if raw == WORKSPACE_ID {
            return Ok(ReplaceValue::WorkspaceId);
        }
        let Some(rest) = raw.strip_prefix(ITEMS_PREFIX) else {
            return Ok(ReplaceValue::Literal(raw.to_string()));
        };

        let bad = |message: String| ParameterError::ReplaceValue {
            value: raw.to_string(),
            message,
        };
        // The item name may itself contain dots: type is the first segment,
        // attribute the last.
        let (item_type, rest) = rest
            .split_once('.')
            .ok_or_else(|| bad("expected $items.<type>.<name>.<attribute>".into()))?;
        let (name, attribute) = rest
            .rsplit_once('.')
            .ok_or_else(|| bad("expected $items.<type>.<name>.<attribute>".into()))?;
        if name.is_empty() {
            return Err(bad("item name is empty".into()));
        }
        let item_type: ItemType = item_type.parse().map_err(|e| bad(format!("{e}")))?;
        let attribute = match attribute.to_ascii_lowercase().as_str() {
            "id" => ItemAttribute::Id,
            "sqlendpoint" => ItemAttribute::SqlEndpoint,
            other => return Err(bad(format!("unsupported attribute '{other}'"))),
        };
        Ok(ReplaceValue::Item {
            item_type,
            name: name.to_string(),
            attribute,
        })
    }

    pub fn is_item_reference(&self) -> bool {
        matches!(self, ReplaceValue::Item { .. })
    }
}

/// Everything a replacement expression can refer to.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub workspace_id: &'a str,
    pub workspace_items: &'a WorkspaceItems,
}

impl<'a> ResolveContext<'a> {
    pub fn new(workspace_id: &'a str, workspace_items: &'a WorkspaceItems) -> Self {
        Self {
            workspace_id,
            workspace_items,
        }
    }

    /// Parse and resolve `raw` in one step.
    pub fn resolve_str(&self, raw: &str) -> Result<String, ParameterError> {
        self.resolve(&ReplaceValue::parse(raw)?)
    }

    pub fn resolve(&self, value: &ReplaceValue) -> Result<String, ParameterError> {
        match value {
            ReplaceValue::Literal(s) => Ok(s.clone()),
            ReplaceValue::WorkspaceId => Ok(self.workspace_id.to_string()),
            ReplaceValue::Item {
                item_type,
                name,
                attribute,
            } => {
                let item = self
                    .workspace_items
                    .get(item_type)
                    .and_then(|m| m.get(name))
                    .ok_or_else(|| ParameterError::UnresolvedItem {
                        item_type: item_type.to_string(),
                        name: name.clone(),
                    })?;
                match attribute {
                    ItemAttribute::Id => Ok(item.id.clone()),
                    ItemAttribute::SqlEndpoint => item
                        .sql_endpoint
                        .clone()
                        .ok_or_else(|| ParameterError::MissingSqlEndpoint(name.clone())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn items() -> WorkspaceItems {
        let mut items = WorkspaceItems::new();
        let lakehouses = items.entry(ItemType::Lakehouse).or_default();
        lakehouses.insert(
            "sales.v2".into(),
            WorkspaceItemRef {
                id: "lh-guid".into(),
                sql_endpoint: Some("sql.example.net".into()),
            },
        );
        lakehouses.insert(
            "raw".into(),
            WorkspaceItemRef {
                id: "raw-guid".into(),
                sql_endpoint: None,
            },
        );
        items
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("$workspace.id", "ws-1")]
    #[case("$items.Lakehouse.sales.v2.id", "lh-guid")]
    #[case("$items.Lakehouse.sales.v2.SQLEndpoint", "sql.example.net")]
    fn resolves_expressions(#[case] raw: &str, #[case] expected: &str) {
        let items = items();
        let ctx = ResolveContext::new("ws-1", &items);
        assert_eq!(ctx.resolve_str(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("$items.Lakehouse")]
    #[case("$items.Lakehouse.sales")]
    #[case("$items.Spreadsheet.sales.id")]
    #[case("$items.Lakehouse.sales.owner")]
    fn malformed_item_references_fail_to_parse(#[case] raw: &str) {
        assert!(matches!(
            ReplaceValue::parse(raw),
            Err(ParameterError::ReplaceValue { .. })
        ));
    }

    #[test]
    fn unknown_item_fails_fast() {
        let items = items();
        let ctx = ResolveContext::new("ws-1", &items);
        let err = ctx.resolve_str("$items.Notebook.missing.id").unwrap_err();
        assert!(matches!(err, ParameterError::UnresolvedItem { .. }), "got: {err}");
    }

    #[test]
    fn missing_sql_endpoint_is_an_error() {
        let items = items();
        let ctx = ResolveContext::new("ws-1", &items);
        let err = ctx.resolve_str("$items.Lakehouse.raw.sqlendpoint").unwrap_err();
        assert!(matches!(err, ParameterError::MissingSqlEndpoint(_)));
    }
}
