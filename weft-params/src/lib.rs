//! weft-params: environment-specific substitution rules.
//!
//! A repository may carry a `parameter.yml` at its root. [`load`] turns it
//! into an [`EnvironmentParameter`]; [`apply_parameters`] rewrites an item's
//! files for the target environment just before publish.

pub mod apply;
pub mod error;
pub mod load;
pub mod model;
pub mod resolve;

pub use apply::{apply_parameters, apply_spark_pools, ApplyContext};
pub use error::ParameterError;
pub use load::{load, load_with_env};
pub use model::{
    EnvironmentParameter, FindReplace, KeyValueReplace, ParameterRule, PoolTarget, PoolType,
    SparkPool, StringList,
};
pub use resolve::{ReplaceValue, ResolveContext, WorkspaceItemRef, WorkspaceItems};
