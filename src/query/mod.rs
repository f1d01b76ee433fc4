//! Statement Builders
//!
//! State-machine driven builders that produce the statement text executed by
//! the verified engine. Values never reach the text directly: callers pass
//! `@name` placeholders and bind the data through the parameter map.

pub mod batch;
pub mod condition;
pub mod insert;
pub mod operator;
pub mod select;

use thiserror::Error;

pub use batch::BatchTransaction;
pub use condition::{Condition, ConditionBuilder};
pub use insert::{InsertQueryBuilder, InsertQueryState};
pub use operator::ComparisonOperator;
pub use select::{ReadQueryBuilder, SelectQueryState, SortDirection};

/// Errors raised while assembling a statement.
///
/// Both variants are caller defects: a builder driven out of order or an
/// empty transaction. They are surfaced immediately and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Cannot switch to state {attempted} from {current}")]
    InvalidBuildState { attempted: String, current: String },

    #[error("No queries added to batch transaction")]
    EmptyBatch,
}

/// Renders a named placeholder for a field at a row index, e.g. `@log0`.
pub fn placeholder(field: &str, index: usize) -> String {
    format!("@{}{}", field, index)
}

/// Parameter name (without the `@`) matching [`placeholder`].
pub fn param_name(field: &str, index: usize) -> String {
    format!("{}{}", field, index)
}
