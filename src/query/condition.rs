//! Boolean condition trees rendered into WHERE clauses.

use std::fmt;

use super::operator::ComparisonOperator;

/// A composable boolean expression.
///
/// `Empty` means "no condition"; callers must omit the WHERE clause for it
/// instead of emitting a dangling `WHERE`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Condition {
    Leaf {
        field: String,
        operator: ComparisonOperator,
        value: String,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    #[default]
    Empty,
}

impl Condition {
    pub fn leaf(field: &str, operator: ComparisonOperator, value: impl fmt::Display) -> Self {
        Condition::Leaf {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    pub fn and(left: Condition, right: Condition) -> Self {
        Condition::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Condition, right: Condition) -> Self {
        Condition::Or(Box::new(left), Box::new(right))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Condition::Empty)
    }

    pub fn render(&self) -> String {
        match self {
            Condition::Leaf {
                field,
                operator,
                value,
            } => format!("{} {} {}", field, operator, value),
            Condition::And(left, right) => format!("({} AND {})", left.render(), right.render()),
            Condition::Or(left, right) => format!("({} OR {})", left.render(), right.render()),
            Condition::Empty => String::new(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Accumulates conditions one at a time into a single tree.
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    condition: Option<Condition>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `existing OR condition`
    pub fn add_or(&mut self, condition: Condition) -> &mut Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Condition::or(existing, condition),
            None => condition,
        });
        self
    }

    /// `existing AND condition`
    pub fn add_and(&mut self, condition: Condition) -> &mut Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Condition::and(existing, condition),
            None => condition,
        });
        self
    }

    /// `condition AND existing`, so the new predicate guards the whole
    /// group accumulated so far.
    pub fn add_and_on_left(&mut self, condition: Condition) -> &mut Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Condition::and(condition, existing),
            None => condition,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_none()
    }

    pub fn build(&self) -> Condition {
        self.condition.clone().unwrap_or_default()
    }
}
