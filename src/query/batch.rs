use super::QueryError;

pub const BEGIN_MARKER: &str = "BEGIN TRANSACTION";
pub const COMMIT_MARKER: &str = "COMMIT";

/// Frames built statements between begin and commit markers.
///
/// Atomic execution is the engine's job; this only guarantees the framing.
#[derive(Debug, Clone, Default)]
pub struct BatchTransaction {
    queries: Vec<String>,
}

impl BatchTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_query(&mut self, query: impl Into<String>) -> &mut Self {
        self.queries.push(query.into());
        self
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn build(&self) -> Result<String, QueryError> {
        if self.queries.is_empty() {
            return Err(QueryError::EmptyBatch);
        }
        let mut lines = Vec::with_capacity(self.queries.len() + 2);
        lines.push(BEGIN_MARKER);
        lines.extend(self.queries.iter().map(String::as_str));
        lines.push(COMMIT_MARKER);
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_fails() {
        assert_eq!(BatchTransaction::new().build(), Err(QueryError::EmptyBatch));
    }

    #[test]
    fn test_framing_preserves_order() {
        let mut batch = BatchTransaction::new();
        batch.add_query("A;").add_query("B;");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.build().unwrap(), "BEGIN TRANSACTION\nA;\nB;\nCOMMIT");
    }

    #[test]
    fn test_build_is_repeatable() {
        let mut batch = BatchTransaction::new();
        batch.add_query("A;");
        assert_eq!(batch.build().unwrap(), batch.build().unwrap());
    }
}
