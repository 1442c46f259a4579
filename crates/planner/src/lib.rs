//! Query planner: converts an analyzed command chain into logical and
//! physical operator trees.
//!
//! The planner bridges the analyzer's validated AST and the two
//! consumers downstream: the translator (which lowers the pushed-down
//! portion into a backend DSL document) and the executor (which runs
//! the residual operators over the returned hits).
//!
//! # Architecture
//!
//! ```text
//! Annotated AST
//!     ↓
//! Logical Plan (one node per command, schema derived per node)
//!     ↓
//! Pushdown rewrite (filter / fields / sort / limit / aggregation)
//!     ↓
//! Physical Plan (scan with pushdown slots + residual operators)
//! ```


mod logical;
mod physical;
mod pushdown;

pub use logical::{LogicalPlan, build, format_plan};
pub use physical::{PhysicalPlan, PushedAggregation, format_physical};
pub use pushdown::{PushdownOptions, push_down};

use ast::Query;
use catalog::Schema;
use common::QueryResult;

/// Main planner entry point.
pub struct Planner;

impl Planner {
    /// Build the logical plan for a query and rewrite it into a
    /// physical plan with pushdown decisions applied.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Plan` when the command chain cannot be
    /// lowered (head command is not `search`, invalid extraction regex,
    /// invalid projection).
    pub fn plan(
        query: &Query,
        schema: &Schema,
        options: &PushdownOptions,
    ) -> QueryResult<PhysicalPlan> {
        let logical = build(query, schema)?;
        push_down(&logical, options)
    }
}
