use serde::{Deserialize, Serialize};
use std::fmt;

/// Relational operators understood by the engine's boolean expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[default]
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Ge => ">=",
        }
    }

    /// Parse the textual form back into an operator.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(ComparisonOperator::Eq),
            "<" => Some(ComparisonOperator::Lt),
            ">" => Some(ComparisonOperator::Gt),
            "<=" => Some(ComparisonOperator::Le),
            ">=" => Some(ComparisonOperator::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
