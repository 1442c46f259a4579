//! Mock operators and data sources.

use common::{OperatorStats, QueryResult, Row};
use executor::{DataSource, ExecutionContext, Operator, SearchResult};

/// Source operator with preloaded rows; stands in for a scan in
/// operator unit tests.
pub struct MockOperator {
    rows: Vec<Row>,
    cursor: usize,
    stats: OperatorStats,
}

impl MockOperator {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            cursor: 0,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for MockOperator {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.cursor = 0;
        self.stats = OperatorStats::default();
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.cursor].clone();
        self.cursor += 1;
        self.stats.rows_returned += 1;
        Ok(Some(row))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> QueryResult<()> {
        Ok(())
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

/// Data source that always returns an empty result.
#[derive(Default)]
pub struct EmptyDataSource;

impl DataSource for EmptyDataSource {
    fn search(
        &mut self,
        _index: &str,
        _query_dsl: &[u8],
        _from: usize,
        _size: usize,
    ) -> QueryResult<SearchResult> {
        Ok(SearchResult::default())
    }
}

/// Data source that returns the same canned result for every request
/// and records the documents it was sent.
pub struct StaticDataSource {
    pub result: SearchResult,
    pub requests: Vec<serde_json::Value>,
}

impl StaticDataSource {
    pub fn new(result: SearchResult) -> Self {
        Self {
            result,
            requests: Vec::new(),
        }
    }
}

impl DataSource for StaticDataSource {
    fn search(
        &mut self,
        _index: &str,
        query_dsl: &[u8],
        _from: usize,
        _size: usize,
    ) -> QueryResult<SearchResult> {
        if let Ok(doc) = serde_json::from_slice(query_dsl) {
            self.requests.push(doc);
        }
        Ok(self.result.clone())
    }
}
