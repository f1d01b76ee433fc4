//! Parameterized multi-row INSERT builder.

use std::fmt;

use super::{placeholder, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertQueryState {
    Start,
    InsertInto,
    Values,
    Build,
}

impl InsertQueryState {
    pub fn transitions(&self) -> &'static [InsertQueryState] {
        use InsertQueryState::*;
        match self {
            Start => &[InsertInto],
            InsertInto => &[Values],
            Values => &[Values, Build],
            Build => &[],
        }
    }

    pub fn can_switch_to(&self, next: InsertQueryState) -> bool {
        self.transitions().contains(&next)
    }
}

impl fmt::Display for InsertQueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InsertQueryState::Start => "START",
            InsertQueryState::InsertInto => "INSERTINTO",
            InsertQueryState::Values => "VALUES",
            InsertQueryState::Build => "BUILD",
        };
        f.write_str(name)
    }
}

/// Builds `INSERT INTO t (a,b) VALUES(@a0,@b0), (@a1,@b1);`.
///
/// Every value is a named placeholder. The caller must bind a parameter for
/// each placeholder generated, see [`row_count`](Self::row_count).
#[derive(Debug, Clone)]
pub struct InsertQueryBuilder {
    constructing: String,
    state: InsertQueryState,
    rows: usize,
}

impl Default for InsertQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InsertQueryBuilder {
    pub fn new() -> Self {
        Self {
            constructing: String::new(),
            state: InsertQueryState::Start,
            rows: 0,
        }
    }

    pub fn state(&self) -> InsertQueryState {
        self.state
    }

    /// Number of value rows appended so far.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    fn switch_to(&mut self, next: InsertQueryState) -> Result<(), QueryError> {
        if !self.state.can_switch_to(next) {
            return Err(QueryError::InvalidBuildState {
                attempted: next.to_string(),
                current: self.state.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn insert_into(&mut self, table: &str, fields: &[&str]) -> Result<&mut Self, QueryError> {
        self.switch_to(InsertQueryState::InsertInto)?;
        self.constructing = format!("INSERT INTO {} ({})", table, fields.join(","));
        Ok(self)
    }

    /// Appends one row whose placeholders all share `index`.
    pub fn values(&mut self, index: usize, fields: &[&str]) -> Result<&mut Self, QueryError> {
        let params: Vec<String> = fields.iter().map(|f| placeholder(f, index)).collect();
        self.push_row(params)
    }

    /// Appends one row where each field carries its own index, for rows that
    /// reference parameters bound by other rows of the same statement batch.
    pub fn values_at_indexes(&mut self, fields: &[(&str, usize)]) -> Result<&mut Self, QueryError> {
        let params: Vec<String> = fields
            .iter()
            .map(|(field, index)| placeholder(field, *index))
            .collect();
        self.push_row(params)
    }

    fn push_row(&mut self, params: Vec<String>) -> Result<&mut Self, QueryError> {
        let was = self.state;
        self.switch_to(InsertQueryState::Values)?;
        if was == InsertQueryState::Values {
            self.constructing.push_str(&format!(", ({})", params.join(",")));
        } else {
            self.constructing.push_str(&format!(" VALUES({})", params.join(",")));
        }
        self.rows += 1;
        Ok(self)
    }

    pub fn build(&mut self) -> Result<String, QueryError> {
        self.switch_to(InsertQueryState::Build)?;
        Ok(format!("{};", self.constructing))
    }
}
