//! Relational data store reached through a small query builder.

pub mod postgrest;

pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No rows returned from {0}")]
    NotFound(String),

    #[error("Expected a single row from {table}, got {count}")]
    MultipleRows { table: String, count: usize },

    #[error("Data store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Data store unreachable: {0}")]
    Transport(String),

    #[error("Unexpected response from data store: {0}")]
    Decode(String),
}

/// A select over one table with equality filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<(String, String)>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((field.into(), value.to_string()));
        self
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Run a select and return every matching row
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, QueryError>;

    /// Insert one row and return it as stored
    async fn insert(&self, table: &str, row: Value) -> Result<Value, QueryError>;

    async fn fetch_many(&self, query: &Query) -> Result<Vec<Value>, QueryError> {
        self.fetch(query).await
    }

    /// Zero or one row; more than one is an error
    async fn fetch_optional(&self, query: &Query) -> Result<Option<Value>, QueryError> {
        let mut rows = self.fetch(query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(QueryError::MultipleRows {
                table: query.table.clone(),
                count,
            }),
        }
    }

    /// Exactly one row
    async fn fetch_one(&self, query: &Query) -> Result<Value, QueryError> {
        self.fetch_optional(query)
            .await?
            .ok_or_else(|| QueryError::NotFound(query.table.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedRows(Vec<Value>);

    #[async_trait]
    impl DataStore for FixedRows {
        async fn fetch(&self, _query: &Query) -> Result<Vec<Value>, QueryError> {
            Ok(self.0.clone())
        }

        async fn insert(&self, _table: &str, row: Value) -> Result<Value, QueryError> {
            Ok(row)
        }
    }

    #[test]
    fn test_query_builder() {
        let query = Query::table("user").select("id,email").eq("email", "a@b.co").eq("id", 4);
        assert_eq!(query.table, "user");
        assert_eq!(query.columns, "id,email");
        assert_eq!(
            query.filters,
            vec![
                ("email".to_string(), "a@b.co".to_string()),
                ("id".to_string(), "4".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_optional_cardinality() {
        let query = Query::table("user");

        let none = FixedRows(vec![]);
        assert!(none.fetch_optional(&query).await.unwrap().is_none());
        assert!(matches!(none.fetch_one(&query).await, Err(QueryError::NotFound(_))));

        let one = FixedRows(vec![json!({"id": 1})]);
        assert_eq!(one.fetch_one(&query).await.unwrap(), json!({"id": 1}));

        let two = FixedRows(vec![json!({"id": 1}), json!({"id": 2})]);
        assert!(matches!(
            two.fetch_optional(&query).await,
            Err(QueryError::MultipleRows { count: 2, .. })
        ));
    }
}
