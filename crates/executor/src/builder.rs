//! Builds the operator tree for a physical plan and drives it to
//! completion.

use crate::{
    AggregationExec, DedupExec, EvalExec, ExecutionContext, ExtractExec, FillnullExec,
    FilterExec, FlattenExec, FrequencyExec, FrequencyOrder, LimitExec, LookupExec, Operator,
    ProjectExec, RenameExec, ReplaceExec, ReverseExec, ScanExec, SortExec, TableExec,
};
use common::{QueryError, QueryResult, Row};
use planner::PhysicalPlan;
use translator::Translator;

/// Construct the operator tree for a physical plan.
///
/// Scans are translated into their DSL documents here; two-input plans
/// (append/join) have no local operators and fail.
pub fn build_operator(plan: &PhysicalPlan) -> QueryResult<Box<dyn Operator>> {
    Ok(match plan {
        PhysicalPlan::Scan { source, limit, .. } => {
            let doc = Translator::new().translate(plan)?;
            let dsl = serde_json::to_vec(&doc)
                .map_err(|e| QueryError::Translate(format!("cannot serialize DSL: {e}")))?;
            Box::new(ScanExec::new(source.clone(), dsl, *limit))
        }
        PhysicalPlan::Filter { input, condition } => Box::new(FilterExec::new(
            build_operator(input)?,
            condition.clone(),
        )),
        PhysicalPlan::Project { input, fields, exclude } => Box::new(ProjectExec::new(
            build_operator(input)?,
            fields.clone(),
            *exclude,
        )),
        PhysicalPlan::Sort { input, keys } => {
            Box::new(SortExec::new(build_operator(input)?, keys.clone()))
        }
        PhysicalPlan::Limit { input, count } => {
            Box::new(LimitExec::new(build_operator(input)?, *count))
        }
        PhysicalPlan::Aggregate { input, aggregations, group_by } => Box::new(
            AggregationExec::new(build_operator(input)?, aggregations.clone(), group_by.clone()),
        ),
        PhysicalPlan::Dedup { input, count, fields, consecutive } => Box::new(DedupExec::new(
            build_operator(input)?,
            *count,
            fields.clone(),
            *consecutive,
        )),
        PhysicalPlan::Top { input, limit, fields, by, show_percent, .. } => {
            let mut all_fields = by.clone();
            all_fields.extend(fields.iter().cloned());
            Box::new(FrequencyExec::new(
                build_operator(input)?,
                FrequencyOrder::MostFrequent,
                *limit,
                all_fields,
                true,
                *show_percent,
            ))
        }
        PhysicalPlan::Rare { input, limit, fields, by, show_percent, .. } => {
            let mut all_fields = by.clone();
            all_fields.extend(fields.iter().cloned());
            Box::new(FrequencyExec::new(
                build_operator(input)?,
                FrequencyOrder::LeastFrequent,
                *limit,
                all_fields,
                true,
                *show_percent,
            ))
        }
        PhysicalPlan::Eval { input, assignments } => {
            Box::new(EvalExec::new(build_operator(input)?, assignments.clone()))
        }
        PhysicalPlan::Rename { input, renames } => {
            Box::new(RenameExec::new(build_operator(input)?, renames.clone()))
        }
        PhysicalPlan::Replace { input, field, mappings } => Box::new(ReplaceExec::new(
            build_operator(input)?,
            field.clone(),
            mappings.clone(),
        )),
        PhysicalPlan::Fillnull { input, value, fields } => Box::new(FillnullExec::new(
            build_operator(input)?,
            value.clone(),
            fields.clone(),
        )),
        PhysicalPlan::Parse { input, field, pattern }
        | PhysicalPlan::Rex { input, field, pattern } => Box::new(ExtractExec::new(
            build_operator(input)?,
            field.clone(),
            pattern,
        )?),
        PhysicalPlan::Lookup { input, table, join_field, outputs } => Box::new(LookupExec::new(
            build_operator(input)?,
            table.clone(),
            join_field.clone(),
            outputs.clone(),
        )),
        PhysicalPlan::Table { input, fields } => {
            Box::new(TableExec::new(build_operator(input)?, fields.clone()))
        }
        PhysicalPlan::Eventstats { input, aggregations, by } => Box::new(
            crate::EventstatsExec::new(build_operator(input)?, aggregations.clone(), by.clone()),
        ),
        PhysicalPlan::Streamstats { input, aggregations, by } => Box::new(
            crate::StreamstatsExec::new(build_operator(input)?, aggregations.clone(), by.clone()),
        ),
        PhysicalPlan::Reverse { input } => Box::new(ReverseExec::new(build_operator(input)?)),
        PhysicalPlan::Flatten { input, field } => {
            Box::new(FlattenExec::new(build_operator(input)?, field.clone()))
        }
        PhysicalPlan::Bin { .. } => {
            return Err(QueryError::Runtime(
                "bin is only executable through pushdown".into(),
            ));
        }
        PhysicalPlan::Append { .. } | PhysicalPlan::Join { .. } => {
            return Err(QueryError::Runtime(format!(
                "{} is not locally executable",
                plan.name()
            )));
        }
        PhysicalPlan::Explain { .. } => {
            return Err(QueryError::Runtime(
                "explain plans are rendered, not executed".into(),
            ));
        }
    })
}

/// Build, open, drain, and close a pipeline, returning all rows.
/// `close` runs even when draining fails.
pub fn execute_collect(plan: &PhysicalPlan, ctx: &mut ExecutionContext) -> QueryResult<Vec<Row>> {
    let mut operator = build_operator(plan)?;
    operator.open(ctx)?;

    let mut rows = Vec::new();
    let result = loop {
        match operator.next(ctx) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(rows),
            Err(err) => break Err(err),
        }
    };

    match operator.close(ctx) {
        Ok(()) => result,
        Err(close_err) => match result {
            // The drain error wins over a close failure.
            Err(err) => Err(err),
            Ok(_) => Err(close_err),
        },
    }
}
