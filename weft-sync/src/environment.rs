//! Spark compute settings of Environment items.
//!
//! An Environment is published as a shell. Its `Setting/Sparkcompute.yml`
//! is staged separately: spark pool rules rebind the instance pool, keys are
//! camelCased, and the staged settings are then published.

use serde_json::{Map, Value};
use tracing::debug;
use weft_core::Item;
use weft_params::apply_spark_pools;

use crate::error::SyncError;
use crate::snapshot::SyncContext;

const COMPUTE_SETTINGS: &str = "Setting/Sparkcompute.yml";

/// The compute settings body to stage for `item`, if it has a settings file.
pub fn compute_settings(ctx: &SyncContext, item: &Item) -> Result<Option<Value>, SyncError> {
    let Some(file) = item
        .files
        .iter()
        .find(|f| f.relative_path().eq_ignore_ascii_case(COMPUTE_SETTINGS))
    else {
        return Ok(None);
    };
    let mut settings = file.yaml()?;

    if let (Some(params), Some(environment)) =
        (ctx.parameters.as_ref(), ctx.config.environment.as_deref())
    {
        let rebound = apply_spark_pools(params, environment, item.name(), &mut settings);
        debug!("rebound {rebound} spark pool(s) of '{}'", item.name());
    }
    Ok(Some(camel_case_keys(settings)))
}

/// `snake_case` object keys become `camelCase`, recursively.
fn camel_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (camel_case(&k), camel_case_keys(v)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camel_case_keys).collect()),
        other => other,
    }
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '_' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}
