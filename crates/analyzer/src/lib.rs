//! Semantic analysis: walks a command chain left-to-right, validating
//! each command against the schema and the names the pipeline has
//! introduced so far.
//!
//! Commands that reset the visible columns (`stats`, `timechart`,
//! `top`, `rare`, `chart`) install a child scope; everything else
//! validates in place or extends the current level. The final scope is
//! frozen and read-only for later stages.

#[cfg(test)]
mod tests;

mod functions;
mod typecheck;

pub use functions::{FunctionRegistry, FunctionSpec, ReturnRule};
pub use typecheck::{TypeChecker, literal_type};

use ast::{Aggregation, Command, Query, Span};
use catalog::{Schema, Scope};
use common::{QueryError, QueryResult};
use types::FieldType;

pub struct Analyzer<'a> {
    schema: &'a Schema,
    registry: &'a FunctionRegistry,
}

impl<'a> Analyzer<'a> {
    pub fn new(schema: &'a Schema, registry: &'a FunctionRegistry) -> Self {
        Self { schema, registry }
    }

    /// Validate a whole query, returning the scope active after the
    /// last command. Errors are prefixed with the offending command's
    /// name and 1-based pipeline position.
    pub fn analyze(&self, query: &Query) -> QueryResult<Scope> {
        tracing::debug!(commands = query.commands.len(), "analyzing query");
        if query.commands.is_empty() {
            return Err(QueryError::Semantic("query has no commands".into()));
        }
        let mut scope = Scope::new();
        for (position, command) in query.commands.iter().enumerate() {
            scope = self
                .analyze_command(scope, command)
                .map_err(|err| with_context(err, position, command.name()))?;
        }
        Ok(scope)
    }

    fn analyze_command(&self, mut scope: Scope, command: &Command) -> QueryResult<Scope> {
        match command {
            Command::Search { source } => {
                if source.is_empty() {
                    return Err(QueryError::Semantic("search requires a source".into()));
                }
                if *source == self.schema.source {
                    for field in self.schema.fields() {
                        // Shadowing duplicates are tolerated.
                        let _ = scope.define(&field.name, field.field_type);
                    }
                }
                Ok(scope)
            }
            Command::Where { condition } => {
                let ty = self.checker(&scope).check(condition)?;
                if ty != FieldType::Bool {
                    return Err(QueryError::Type(format!(
                        "non-boolean condition of type {ty:?}"
                    )));
                }
                Ok(scope)
            }
            Command::Fields { fields, .. } => {
                if fields.is_empty() {
                    return Err(QueryError::Semantic("fields requires at least one field".into()));
                }
                for field in fields {
                    self.checker(&scope).check(field)?;
                }
                // Projection is not applied to the scope: later commands
                // may still reference dropped names.
                Ok(scope)
            }
            Command::Stats { aggregations, by } | Command::Chart { aggregations, by } => {
                self.analyze_grouping(scope, aggregations, by, None)
            }
            Command::Timechart { span, aggregations, by } => {
                if span.is_none() {
                    return Err(QueryError::Semantic("timechart requires a span".into()));
                }
                self.analyze_grouping(scope, aggregations, by, Some(("_time", FieldType::Date)))
            }
            Command::Sort { keys } => {
                if keys.is_empty() {
                    return Err(QueryError::Semantic("sort requires at least one key".into()));
                }
                for key in keys {
                    let ty = self.checker(&scope).check(&key.expr)?;
                    if ty != FieldType::Unknown && !ty.is_comparable() {
                        return Err(QueryError::Type(format!(
                            "sort key of type {ty:?} is not comparable"
                        )));
                    }
                }
                Ok(scope)
            }
            Command::Head { count } => {
                if *count <= 0 {
                    return Err(QueryError::Semantic(format!(
                        "head requires a positive count, got {count}"
                    )));
                }
                Ok(scope)
            }
            Command::Top { limit, fields, by, show_percent, .. }
            | Command::Rare { limit, fields, by, show_percent, .. } => {
                if fields.is_empty() {
                    return Err(QueryError::Semantic(
                        "top/rare require at least one field".into(),
                    ));
                }
                if *limit == 0 {
                    return Err(QueryError::Semantic("top/rare require a positive limit".into()));
                }
                let mut entries = Vec::new();
                for name in fields.iter().chain(by.iter()) {
                    let ty = self.resolve_type(&scope, name)?;
                    entries.push((name.clone(), ty));
                }
                let mut child = scope.new_child();
                for (name, ty) in entries {
                    child.define(&name, ty)?;
                }
                child.update("count", FieldType::Long);
                if *show_percent {
                    child.update("percent", FieldType::Double);
                }
                Ok(child)
            }
            Command::Dedup { count, fields, .. } => {
                if fields.is_empty() {
                    return Err(QueryError::Semantic("dedup requires at least one field".into()));
                }
                if *count < 0 {
                    return Err(QueryError::Semantic(format!(
                        "dedup count must be non-negative, got {count}"
                    )));
                }
                for name in fields {
                    self.resolve_type(&scope, name)?;
                }
                Ok(scope)
            }
            Command::Eval { assignments } => {
                if assignments.is_empty() {
                    return Err(QueryError::Semantic(
                        "eval requires at least one assignment".into(),
                    ));
                }
                for (name, expr) in assignments {
                    let ty = self.checker(&scope).check(expr)?;
                    // Redefinition is permitted.
                    if scope.define(name, ty).is_err() {
                        scope.update(name, ty);
                    }
                }
                Ok(scope)
            }
            Command::Rename { renames } => {
                if renames.is_empty() {
                    return Err(QueryError::Semantic(
                        "rename requires at least one mapping".into(),
                    ));
                }
                for (old, new) in renames {
                    let ty = self.resolve_type(&scope, old)?;
                    let source = scope
                        .resolve_field_name(old)
                        .unwrap_or_else(|| old.clone());
                    // The old name stays visible afterwards.
                    if scope.define_alias(new, ty, &source).is_err() {
                        scope.update_alias(new, ty, &source);
                    }
                }
                Ok(scope)
            }
            Command::Replace { field, mappings } => {
                if field.is_empty() {
                    return Err(QueryError::Semantic("replace requires a field".into()));
                }
                if mappings.is_empty() {
                    return Err(QueryError::Semantic(
                        "replace requires at least one mapping".into(),
                    ));
                }
                self.resolve_type(&scope, field)?;
                Ok(scope)
            }
            Command::Parse { field, pattern } => {
                if pattern.is_empty() {
                    return Err(QueryError::Semantic("parse requires a pattern".into()));
                }
                let ty = self.resolve_type(&scope, field)?;
                require_string_like(field, ty)?;
                Ok(scope)
            }
            Command::Rex { field, pattern } => {
                if pattern.is_empty() {
                    return Err(QueryError::Semantic("rex requires a pattern".into()));
                }
                // A missing field defaults to `_raw` at runtime.
                if let Some(field) = field {
                    let ty = self.resolve_type(&scope, field)?;
                    require_string_like(field, ty)?;
                }
                Ok(scope)
            }
            Command::Lookup { table, join_field, outputs } => {
                if table.is_empty() {
                    return Err(QueryError::Semantic("lookup requires a table name".into()));
                }
                if outputs.is_empty() {
                    return Err(QueryError::Semantic(
                        "lookup requires at least one output field".into(),
                    ));
                }
                self.resolve_type(&scope, join_field)?;
                for (name, alias) in outputs {
                    // Output types are resolved at runtime.
                    scope.update(alias.as_deref().unwrap_or(name), FieldType::Unknown);
                }
                Ok(scope)
            }
            Command::Append { subsearch } => {
                validate_subsearch(subsearch)?;
                Ok(scope)
            }
            Command::Join { field, subsearch, .. } => {
                validate_subsearch(subsearch)?;
                self.resolve_type(&scope, field)?;
                Ok(scope)
            }
            Command::Bin { field, span, bins } => {
                let ty = self.resolve_type(&scope, field)?;
                if ty != FieldType::Unknown && !ty.is_numeric() && ty != FieldType::Date {
                    return Err(QueryError::Type(format!(
                        "bin field '{field}' must be numeric or a date, got {ty:?}"
                    )));
                }
                validate_bin_width(span.as_ref(), *bins)?;
                Ok(scope)
            }
            Command::Fillnull { fields, .. } => {
                for field in fields {
                    if field.as_field().is_none() {
                        return Err(QueryError::Semantic(
                            "fillnull accepts only field references".into(),
                        ));
                    }
                }
                Ok(scope)
            }
            Command::Table { fields } => {
                if fields.is_empty() {
                    return Err(QueryError::Semantic("table requires at least one field".into()));
                }
                Ok(scope)
            }
            Command::Eventstats { aggregations, by }
            | Command::Streamstats { aggregations, by } => {
                if aggregations.is_empty() {
                    return Err(QueryError::Semantic(
                        "at least one aggregation is required".into(),
                    ));
                }
                for key in by {
                    self.resolve_type(&scope, key)?;
                }
                for agg in aggregations {
                    let ty = self.check_aggregation(&scope, agg)?;
                    if scope.define(&agg.alias, ty).is_err() {
                        scope.update(&agg.alias, ty);
                    }
                }
                Ok(scope)
            }
            Command::Flatten { field } => {
                self.resolve_type(&scope, field)?;
                Ok(scope)
            }
            Command::Reverse
            | Command::Describe
            | Command::ShowDatasources
            | Command::Explain => Ok(scope),
        }
    }

    /// Shared handling for stats/chart/timechart: type-check every
    /// aggregation, then install a child scope holding exactly the
    /// group keys and aggregation outputs.
    fn analyze_grouping(
        &self,
        scope: Scope,
        aggregations: &[Aggregation],
        by: &[String],
        prelude: Option<(&str, FieldType)>,
    ) -> QueryResult<Scope> {
        if aggregations.is_empty() {
            return Err(QueryError::Semantic(
                "at least one aggregation is required".into(),
            ));
        }
        let mut entries = Vec::new();
        for key in by {
            let ty = self.resolve_type(&scope, key)?;
            entries.push((key.clone(), ty));
        }
        for agg in aggregations {
            let ty = self.check_aggregation(&scope, agg)?;
            entries.push((agg.alias.clone(), ty));
        }
        let mut child = scope.new_child();
        if let Some((name, ty)) = prelude {
            child.define(name, ty)?;
        }
        for (name, ty) in entries {
            child
                .define(&name, ty)
                .map_err(|_| QueryError::Semantic(format!("duplicate alias '{name}'")))?;
        }
        Ok(child)
    }

    fn check_aggregation(&self, scope: &Scope, agg: &Aggregation) -> QueryResult<FieldType> {
        if !self.registry.is_aggregate(&agg.func) && self.registry.get(&agg.func).is_some() {
            return Err(QueryError::Semantic(format!(
                "'{}' is not an aggregation function",
                agg.func
            )));
        }
        let arg_types = match &agg.arg {
            Some(arg) => vec![self.checker(scope).check(arg)?],
            None => vec![],
        };
        self.registry.return_type(&agg.func, &arg_types)
    }

    fn resolve_type(&self, scope: &Scope, name: &str) -> QueryResult<FieldType> {
        self.checker(scope).resolve_field(name)
    }

    fn checker<'b>(&'b self, scope: &'b Scope) -> TypeChecker<'b> {
        TypeChecker::new(scope, self.schema, self.registry)
    }
}

fn require_string_like(field: &str, ty: FieldType) -> QueryResult<()> {
    if ty == FieldType::Unknown || ty.is_string_like() {
        Ok(())
    } else {
        Err(QueryError::Type(format!(
            "field '{field}' must be string-like, got {ty:?}"
        )))
    }
}

fn validate_bin_width(span: Option<&Span>, bins: Option<usize>) -> QueryResult<()> {
    match (span, bins) {
        (None, None) => Err(QueryError::Semantic(
            "bin requires a span or a bin count".into(),
        )),
        (Some(span), _) if span.value == 0 => {
            Err(QueryError::Semantic("bin span must be positive".into()))
        }
        (_, Some(0)) => Err(QueryError::Semantic("bin count must be positive".into())),
        _ => Ok(()),
    }
}

fn validate_subsearch(subsearch: &Query) -> QueryResult<()> {
    match subsearch.commands.first() {
        Some(Command::Search { .. }) => Ok(()),
        Some(other) => Err(QueryError::Semantic(format!(
            "subsearch must start with search, found '{}'",
            other.name()
        ))),
        None => Err(QueryError::Semantic("subsearch is empty".into())),
    }
}

/// Prefix an analysis error with the offending command and position.
fn with_context(err: QueryError, position: usize, command: &str) -> QueryError {
    let prefix = format!("command {} ({command})", position + 1);
    match err {
        QueryError::Parse(m) => QueryError::Parse(format!("{prefix}: {m}")),
        QueryError::Schema(m) => QueryError::Schema(format!("{prefix}: {m}")),
        QueryError::Type(m) => QueryError::Type(format!("{prefix}: {m}")),
        QueryError::Semantic(m) => QueryError::Semantic(format!("{prefix}: {m}")),
        other => other,
    }
}
