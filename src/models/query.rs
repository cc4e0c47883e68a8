//! Query descriptions and their results.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Field used by `distinct` when the query names none.
pub const DEFAULT_DISTINCT_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    #[default]
    Find,
    Count,
    Distinct,
    Aggregate,
}

impl QueryKind {
    pub fn label(self) -> &'static str {
        match self {
            QueryKind::Find => "find",
            QueryKind::Count => "count",
            QueryKind::Distinct => "distinct",
            QueryKind::Aggregate => "aggregate",
        }
    }

    pub fn all() -> &'static [QueryKind] {
        &[QueryKind::Find, QueryKind::Count, QueryKind::Distinct, QueryKind::Aggregate]
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QueryKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        QueryKind::all()
            .iter()
            .copied()
            .find(|kind| kind.label() == normalized)
            .ok_or_else(|| Error::Validation(format!("Unsupported query type: {value}")))
    }
}

/// Execution outcome recorded on a [`QuerySpec`] once it has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub execution_time: Duration,
    /// Only set for list-shaped results.
    pub result_count: Option<usize>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// A query to run against one collection.
///
/// `outcome` stays `None` until the query is executed and is filled exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub id: Uuid,
    pub query: Document,
    pub kind: QueryKind,
    pub database: String,
    pub collection: String,
    pub limit: i64,
    pub skip: u64,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    outcome: Option<QueryOutcome>,
}

impl QuerySpec {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        kind: QueryKind,
        query: Document,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            kind,
            database: database.into(),
            collection: collection.into(),
            limit: DEFAULT_QUERY_LIMIT,
            skip: 0,
            sort: None,
            projection: None,
            outcome: None,
        }
    }

    pub fn find(
        database: impl Into<String>,
        collection: impl Into<String>,
        filter: Document,
    ) -> Self {
        Self::new(database, collection, QueryKind::Find, filter)
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// `database.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// Relaxed Extended JSON rendering of the query document.
    pub fn query_string(&self) -> String {
        let value = Bson::Document(self.query.clone()).into_relaxed_extjson();
        serde_json::to_string(&value).unwrap_or_else(|_| format!("{:?}", self.query))
    }

    /// Field and filter for a `distinct` query: `{field, filter}` inside the query document.
    pub fn distinct_target(&self) -> Result<(String, Document)> {
        let field = match self.query.get("field") {
            None => DEFAULT_DISTINCT_FIELD.to_string(),
            Some(Bson::String(field)) if !field.trim().is_empty() => field.clone(),
            Some(_) => {
                return Err(Error::Validation(
                    "distinct 'field' must be a non-empty string".to_string(),
                ));
            }
        };
        let filter = match self.query.get("filter") {
            None | Some(Bson::Null) => Document::new(),
            Some(Bson::Document(filter)) => filter.clone(),
            Some(_) => {
                return Err(Error::Validation("distinct 'filter' must be a document".to_string()));
            }
        };
        Ok((field, filter))
    }

    /// Stages of an `aggregate` query: the `pipeline` array inside the query document.
    pub fn pipeline(&self) -> Result<Vec<Document>> {
        match self.query.get("pipeline") {
            None | Some(Bson::Null) => Ok(Vec::new()),
            Some(Bson::Array(stages)) => stages
                .iter()
                .enumerate()
                .map(|(index, stage)| match stage {
                    Bson::Document(stage) => Ok(stage.clone()),
                    _ => Err(Error::Validation(format!(
                        "pipeline stage {index} is not a document"
                    ))),
                })
                .collect(),
            Some(_) => Err(Error::Validation("'pipeline' must be an array".to_string())),
        }
    }

    pub fn outcome(&self) -> Option<&QueryOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_executed(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn execution_time(&self) -> Option<Duration> {
        self.outcome.as_ref().map(|outcome| outcome.execution_time)
    }

    pub fn result_count(&self) -> Option<usize> {
        self.outcome.as_ref().and_then(|outcome| outcome.result_count)
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().and_then(|outcome| outcome.error.as_deref())
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.outcome.as_ref().map(|outcome| outcome.executed_at)
    }

    pub(crate) fn record_success(&mut self, execution_time: Duration, result_count: Option<usize>) {
        self.record(QueryOutcome {
            execution_time,
            result_count,
            error: None,
            executed_at: Utc::now(),
        });
    }

    pub(crate) fn record_failure(&mut self, execution_time: Duration, error: String) {
        self.record(QueryOutcome {
            execution_time,
            result_count: None,
            error: Some(error),
            executed_at: Utc::now(),
        });
    }

    fn record(&mut self, outcome: QueryOutcome) {
        debug_assert!(self.outcome.is_none(), "query outcome recorded twice");
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }
}

/// Result of executing a [`QuerySpec`]. The shape follows the query kind.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Documents(Vec<Document>),
    Count(u64),
    Values(Vec<Bson>),
}

impl QueryResult {
    /// Number of entries for list-shaped results; `None` for counts.
    pub fn result_count(&self) -> Option<usize> {
        match self {
            QueryResult::Documents(documents) => Some(documents.len()),
            QueryResult::Values(values) => Some(values.len()),
            QueryResult::Count(_) => None,
        }
    }

    pub fn documents(&self) -> Option<&[Document]> {
        match self {
            QueryResult::Documents(documents) => Some(documents),
            _ => None,
        }
    }

    pub fn into_documents(self) -> Option<Vec<Document>> {
        match self {
            QueryResult::Documents(documents) => Some(documents),
            _ => None,
        }
    }

    /// The result as a single BSON value, for export.
    pub fn to_bson(&self) -> Bson {
        match self {
            QueryResult::Documents(documents) => {
                Bson::Array(documents.iter().cloned().map(Bson::Document).collect())
            }
            QueryResult::Count(count) => Bson::Int64(i64::try_from(*count).unwrap_or(i64::MAX)),
            QueryResult::Values(values) => Bson::Array(values.clone()),
        }
    }
}
