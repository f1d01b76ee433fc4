//! Read query builder
//!
//! Builds a single SELECT statement. Every clause call is checked against a
//! fixed transition table so clauses can only be emitted in legal order.

use std::fmt;

use super::condition::Condition;
use super::operator::ComparisonOperator;
use super::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectQueryState {
    Start,
    Select,
    From,
    Where,
    Condition,
    Join,
    OrderBy,
    Limit,
    Build,
}

impl SelectQueryState {
    /// States reachable from `self`.
    pub fn transitions(&self) -> &'static [SelectQueryState] {
        use SelectQueryState::*;
        match self {
            Start => &[Select],
            Select => &[From],
            From => &[Join, Where, OrderBy, Limit, Build],
            Join => &[Join, Where, OrderBy, Limit, Build],
            Where => &[Condition, OrderBy, Limit, Build],
            Condition => &[Condition, OrderBy, Limit, Build],
            OrderBy => &[Limit, Build],
            Limit => &[Build],
            Build => &[],
        }
    }

    pub fn can_switch_to(&self, next: SelectQueryState) -> bool {
        self.transitions().contains(&next)
    }
}

impl fmt::Display for SelectQueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectQueryState::Start => "START",
            SelectQueryState::Select => "SELECT",
            SelectQueryState::From => "FROM",
            SelectQueryState::Where => "WHERE",
            SelectQueryState::Condition => "CONDITION",
            SelectQueryState::Join => "JOIN",
            SelectQueryState::OrderBy => "ORDER_BY",
            SelectQueryState::Limit => "LIMIT",
            SelectQueryState::Build => "BUILD",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadQueryBuilder {
    constructing: String,
    state: SelectQueryState,
}

impl Default for ReadQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadQueryBuilder {
    pub fn new() -> Self {
        Self {
            constructing: String::new(),
            state: SelectQueryState::Start,
        }
    }

    pub fn state(&self) -> SelectQueryState {
        self.state
    }

    fn switch_to(&mut self, next: SelectQueryState) -> Result<(), QueryError> {
        if !self.state.can_switch_to(next) {
            return Err(QueryError::InvalidBuildState {
                attempted: next.to_string(),
                current: self.state.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn select(&mut self, fields: &[&str]) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Select)?;
        self.constructing = format!("SELECT {}", fields.join(","));
        Ok(self)
    }

    pub fn from(&mut self, sources: &[&str]) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::From)?;
        self.constructing.push_str(&format!(" FROM {}", sources.join(", ")));
        Ok(self)
    }

    /// Inner join only.
    pub fn join(
        &mut self,
        table: &str,
        left_field: &str,
        right_field: &str,
    ) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Join)?;
        self.constructing.push_str(&format!(
            " INNER JOIN {} ON {} = {}",
            table, left_field, right_field
        ));
        Ok(self)
    }

    pub fn where_field(
        &mut self,
        field: &str,
        value: impl fmt::Display,
        operator: ComparisonOperator,
    ) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Where)?;
        self.constructing
            .push_str(&format!(" WHERE {} {} {}", field, operator, value));
        Ok(self)
    }

    /// Emits ` WHERE <condition>`. An empty condition is still a state
    /// transition but writes nothing, so no dangling `WHERE` is produced.
    pub fn where_condition(&mut self, condition: &Condition) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Where)?;
        if !condition.is_empty() {
            self.constructing
                .push_str(&format!(" WHERE {}", condition.render()));
        }
        Ok(self)
    }

    pub fn condition(&mut self, condition: &Condition) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Condition)?;
        self.constructing.push_str(&condition.render());
        Ok(self)
    }

    pub fn or(
        &mut self,
        field: &str,
        value: impl fmt::Display,
        operator: ComparisonOperator,
    ) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Condition)?;
        self.constructing
            .push_str(&format!(" OR {} {} {}", field, operator, value));
        Ok(self)
    }

    pub fn and(
        &mut self,
        field: &str,
        value: impl fmt::Display,
        operator: ComparisonOperator,
    ) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Condition)?;
        self.constructing
            .push_str(&format!(" AND {} {} {}", field, operator, value));
        Ok(self)
    }

    pub fn order_by(
        &mut self,
        field: &str,
        direction: SortDirection,
    ) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::OrderBy)?;
        self.constructing
            .push_str(&format!(" ORDER BY {} {}", field, direction));
        Ok(self)
    }

    pub fn limit(&mut self, limit: usize) -> Result<&mut Self, QueryError> {
        self.switch_to(SelectQueryState::Limit)?;
        self.constructing.push_str(&format!(" LIMIT {}", limit));
        Ok(self)
    }

    pub fn build(&mut self) -> Result<String, QueryError> {
        self.switch_to(SelectQueryState::Build)?;
        Ok(self.constructing.clone())
    }
}
