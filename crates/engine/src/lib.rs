//! Facade tying the pipeline layers together: analysis, planning,
//! pushdown, DSL translation, and residual execution.
//!
//! ```no_run
//! use engine::QueryEngine;
//! use ast::{Command, Expr, BinaryOp, Query};
//! use catalog::Schema;
//! use types::FieldType;
//!
//! let mut schema = Schema::new("logs");
//! schema.add_field("status", FieldType::Int);
//!
//! let engine = QueryEngine::new(schema);
//! let query = Query::new(vec![
//!     Command::Search { source: "logs".into() },
//!     Command::Where {
//!         condition: Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
//!     },
//! ]);
//! let compiled = engine.compile(&query).unwrap();
//! println!("{}", compiled.dsl);
//! ```

use analyzer::{Analyzer, FunctionRegistry};
use ast::Query;
use catalog::{Schema, Scope};
use common::{CancelToken, Config, QueryError, QueryResult, Row};
use executor::{DataSource, ExecutionContext, LookupTables, execute_collect};
use planner::{LogicalPlan, PhysicalPlan, PushdownOptions, format_plan, push_down};
use types::Value;

/// A fully compiled query: validated scope, both plan forms, and the
/// DSL document for the pushed-down portion.
#[derive(Debug)]
pub struct CompiledQuery {
    pub scope: Scope,
    pub logical: LogicalPlan,
    pub physical: PhysicalPlan,
    pub dsl: serde_json::Value,
}

/// One engine per dataset: owns the schema, configuration, and
/// function registry, and runs queries against injected data sources.
pub struct QueryEngine {
    schema: Schema,
    config: Config,
    registry: FunctionRegistry,
    lookup_tables: LookupTables,
}

impl QueryEngine {
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, Config::default())
    }

    pub fn with_config(schema: Schema, config: Config) -> Self {
        Self {
            schema,
            config,
            registry: FunctionRegistry::builtin(),
            lookup_tables: LookupTables::default(),
        }
    }

    /// Override the function registry; tests supply minimal ones.
    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register an in-memory lookup table for `lookup` commands.
    pub fn add_lookup_table(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.lookup_tables.insert(name.into(), rows);
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Analyze and plan a query, emitting the DSL document with full
    /// pushdown applied. Explain queries produce plan text rather than
    /// a document and are rejected here; use [`QueryEngine::explain`].
    pub fn compile(&self, query: &Query) -> QueryResult<CompiledQuery> {
        let scope = Analyzer::new(&self.schema, &self.registry).analyze(query)?;
        let logical = planner::build(query, &self.schema)?;
        if matches!(logical, LogicalPlan::Explain { .. }) {
            return Err(QueryError::Plan(
                "explain queries render plan text and have no DSL form".into(),
            ));
        }
        let physical = push_down(&logical, &PushdownOptions::from_config(&self.config))?;
        let dsl = translator::Translator::new().translate(&physical)?;
        tracing::debug!(plan = %logical.name(), "query compiled");
        Ok(CompiledQuery {
            scope,
            logical,
            physical,
            dsl,
        })
    }

    /// Render the logical plan text, as produced for `explain`.
    pub fn explain(&self, query: &Query) -> QueryResult<String> {
        Analyzer::new(&self.schema, &self.registry).analyze(query)?;
        let logical = planner::build(query, &self.schema)?;
        Ok(format_plan(&logical))
    }

    /// Run a query to completion against a data source.
    pub fn execute(&self, query: &Query, data_source: &mut dyn DataSource) -> QueryResult<Vec<Row>> {
        self.execute_cancellable(query, data_source, CancelToken::new())
    }

    /// Run a query with an external cancellation token. Aggregations
    /// stay in the residual pipeline here: the data source interface
    /// returns hits, not bucket trees.
    pub fn execute_cancellable(
        &self,
        query: &Query,
        data_source: &mut dyn DataSource,
        cancel: CancelToken,
    ) -> QueryResult<Vec<Row>> {
        Analyzer::new(&self.schema, &self.registry).analyze(query)?;
        let logical = planner::build(query, &self.schema)?;

        if let LogicalPlan::Explain { input } = &logical {
            let mut row = Row::new();
            row.set("plan", Value::Str(format_plan(input)));
            return Ok(vec![row]);
        }

        let physical = push_down(&logical, &PushdownOptions::for_execution(&self.config))?;
        let mut ctx = ExecutionContext::new(data_source, &self.config, cancel);
        for (name, rows) in &self.lookup_tables {
            ctx.add_lookup_table(name.clone(), rows.clone());
        }
        execute_collect(&physical, &mut ctx)
    }
}
