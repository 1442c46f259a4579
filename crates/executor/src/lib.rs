//! Streaming execution engine: a pull-based, single-threaded operator
//! pipeline running the residual plan portion over the hits a data
//! source returns.
//!
//! Every operator implements [`Operator`] with open/next/close
//! semantics; operators are composed by constructor injection and
//! consumed exactly once. The only suspension point is the scan's data
//! source call; everything above it is synchronous.

mod aggregate;
mod builder;
mod dedup;
mod eval;
mod extract;
mod filter;
mod frequency;
mod limit;
mod project;
mod scan;
mod sort;
mod transform;

pub use aggregate::{AggregationExec, EventstatsExec, StreamstatsExec};
pub use builder::{build_operator, execute_collect};
pub use dedup::DedupExec;
pub use eval::{evaluate, literal_value, runtime_function_names};
pub use extract::ExtractExec;
pub use filter::FilterExec;
pub use frequency::{FrequencyExec, FrequencyOrder};
pub use limit::LimitExec;
pub use project::{ProjectExec, TableExec};
pub use scan::{DataSource, ScanExec, SearchHit, SearchResult};
pub use sort::SortExec;
pub use transform::{
    EvalExec, FillnullExec, FlattenExec, LookupExec, RenameExec, ReplaceExec, ReverseExec,
};

use common::{CancelToken, Config, OperatorStats, QueryResult, Row};

/// Pull-based iterator interface for the execution pipeline.
///
/// `open` performs optional initialization (the sort's materialization
/// pass lives there), `next` advances one row and returns `Ok(None)` at
/// end of stream, and `close` releases held resources and is
/// idempotent.
pub trait Operator {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()>;

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>>;

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()>;

    /// Rows read from the child and rows handed to the parent.
    fn stats(&self) -> OperatorStats;
}

/// Rows of an in-memory lookup table, keyed by table name.
pub type LookupTables = hashbrown::HashMap<String, Vec<Row>, ahash::RandomState>;

/// Shared execution state passed to every operator call.
pub struct ExecutionContext<'a> {
    pub data_source: &'a mut dyn DataSource,
    pub config: &'a Config,
    pub cancel: CancelToken,
    lookup_tables: LookupTables,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(data_source: &'a mut dyn DataSource, config: &'a Config, cancel: CancelToken) -> Self {
        Self {
            data_source,
            config,
            cancel,
            lookup_tables: LookupTables::default(),
        }
    }

    /// Register an in-memory lookup table for `lookup` commands.
    pub fn add_lookup_table(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.lookup_tables.insert(name.into(), rows);
    }

    pub fn lookup_table(&self, name: &str) -> Option<&[Row]> {
        self.lookup_tables.get(name).map(Vec::as_slice)
    }
}
