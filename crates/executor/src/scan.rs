//! Scan operator: issues the translated DSL document to the data
//! source and streams the returned hits as rows.

use crate::{ExecutionContext, Operator};
use common::{OperatorStats, QueryResult, Row};
use types::Value;

/// One document returned by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: Option<f64>,
    pub source: Row,
}

/// Result of one backend search request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResult {
    pub took_millis: u64,
    pub total_hits: u64,
    pub max_score: Option<f64>,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            total_hits: hits.len() as u64,
            hits,
            ..Self::default()
        }
    }
}

/// External collaborator executing DSL documents. Implementations may
/// block; the scan is the pipeline's only suspension point.
pub trait DataSource {
    fn search(
        &mut self,
        index: &str,
        query_dsl: &[u8],
        from: usize,
        size: usize,
    ) -> QueryResult<SearchResult>;
}

/// Scan operator - wraps the data source and emits one row per hit,
/// pre-populated with `_id` ahead of the `_source` fields.
///
/// A single request is issued per open; retryable transport errors are
/// retried at most once.
pub struct ScanExec {
    source: String,
    dsl: Vec<u8>,
    limit: Option<u64>,
    hits: Vec<Row>,
    cursor: usize,
    fetched: bool,
    stats: OperatorStats,
}

impl ScanExec {
    pub fn new(source: String, dsl: Vec<u8>, limit: Option<u64>) -> Self {
        Self {
            source,
            dsl,
            limit,
            hits: Vec::new(),
            cursor: 0,
            fetched: false,
            stats: OperatorStats::default(),
        }
    }

    fn fetch(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        ctx.cancel.check()?;
        let size = self
            .limit
            .map(|l| l as usize)
            .unwrap_or(ctx.config.scan_batch_size);

        let result = match ctx.data_source.search(&self.source, &self.dsl, 0, size) {
            Ok(result) => result,
            Err(err) if err.is_retryable() => {
                tracing::warn!(source = %self.source, error = %err, "retrying scan request");
                ctx.cancel.check()?;
                ctx.data_source.search(&self.source, &self.dsl, 0, size)?
            }
            Err(err) => return Err(err),
        };
        tracing::debug!(
            source = %self.source,
            hits = result.hits.len(),
            total = result.total_hits,
            took_millis = result.took_millis,
            "scan request complete"
        );

        self.hits = result
            .hits
            .into_iter()
            .map(|hit| {
                let mut row = Row::new();
                row.set("_id", Value::Str(hit.id));
                for (field, value) in hit.source.iter() {
                    row.set(field, value.clone());
                }
                row
            })
            .collect();
        self.stats.rows_read += self.hits.len() as u64;
        self.fetched = true;
        Ok(())
    }
}

impl Operator for ScanExec {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.hits.clear();
        self.cursor = 0;
        self.fetched = false;
        self.stats = OperatorStats::default();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        if !self.fetched {
            self.fetch(ctx)?;
        }
        if self.cursor >= self.hits.len() {
            return Ok(None);
        }
        let row = std::mem::take(&mut self.hits[self.cursor]);
        self.cursor += 1;
        self.stats.rows_returned += 1;
        Ok(Some(row))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.hits.clear();
        self.cursor = 0;
        Ok(())
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}
