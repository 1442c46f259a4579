use common::{QueryError, QueryResult};
use types::FieldType;

type Map<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// How a built-in derives its return type from its arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnRule {
    /// Always the same type.
    Fixed(FieldType),
    /// Type of the first argument; Double when the argument type gives
    /// nothing to go on.
    ArgOrDouble,
    /// Type of the first argument, unchanged.
    ArgType,
    /// Resolved at runtime (`cast`, `convert`).
    Dynamic,
}

/// Signature of one built-in function.
#[derive(Clone, Debug)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub rule: ReturnRule,
    pub aggregate: bool,
    pub min_args: usize,
    pub max_args: Option<usize>,
}

/// Immutable table of built-in functions, shared by the type checker
/// and (by name set) the runtime evaluator. Injected at construction so
/// tests can supply a minimal registry.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    functions: Map<&'static str, FunctionSpec>,
}

impl FunctionRegistry {
    pub fn from_specs(specs: Vec<FunctionSpec>) -> Self {
        let functions = specs.into_iter().map(|s| (s.name, s)).collect();
        Self { functions }
    }

    /// The full built-in table.
    pub fn builtin() -> Self {
        use FieldType::*;
        use ReturnRule::*;

        fn agg(name: &'static str, rule: ReturnRule, min: usize, max: Option<usize>) -> FunctionSpec {
            FunctionSpec { name, rule, aggregate: true, min_args: min, max_args: max }
        }
        fn scalar(name: &'static str, rule: ReturnRule, min: usize, max: Option<usize>) -> FunctionSpec {
            FunctionSpec { name, rule, aggregate: false, min_args: min, max_args: max }
        }

        Self::from_specs(vec![
            agg("count", Fixed(Long), 0, Some(1)),
            agg("sum", ArgOrDouble, 1, Some(1)),
            agg("avg", Fixed(Double), 1, Some(1)),
            agg("mean", Fixed(Double), 1, Some(1)),
            agg("stddev", Fixed(Double), 1, Some(1)),
            agg("variance", Fixed(Double), 1, Some(1)),
            agg("percentile", Fixed(Double), 1, Some(2)),
            agg("percentiles", Fixed(Double), 1, Some(2)),
            agg("min", ArgType, 1, Some(1)),
            agg("max", ArgType, 1, Some(1)),
            agg("dc", Fixed(Long), 1, Some(1)),
            agg("stats", Fixed(Double), 1, Some(1)),
            scalar("sqrt", Fixed(Double), 1, Some(1)),
            scalar("pow", Fixed(Double), 2, Some(2)),
            scalar("exp", Fixed(Double), 1, Some(1)),
            scalar("log", Fixed(Double), 1, Some(2)),
            scalar("ln", Fixed(Double), 1, Some(1)),
            scalar("abs", ArgOrDouble, 1, Some(1)),
            scalar("round", Fixed(Long), 1, Some(2)),
            scalar("ceil", Fixed(Long), 1, Some(1)),
            scalar("floor", Fixed(Long), 1, Some(1)),
            scalar("concat", Fixed(String), 1, None),
            scalar("substring", Fixed(String), 2, Some(3)),
            scalar("upper", Fixed(String), 1, Some(1)),
            scalar("lower", Fixed(String), 1, Some(1)),
            scalar("trim", Fixed(String), 1, Some(1)),
            scalar("length", Fixed(Int), 1, Some(1)),
            scalar("year", Fixed(Int), 1, Some(1)),
            scalar("month", Fixed(Int), 1, Some(1)),
            scalar("day", Fixed(Int), 1, Some(1)),
            scalar("hour", Fixed(Int), 1, Some(1)),
            scalar("minute", Fixed(Int), 1, Some(1)),
            scalar("second", Fixed(Int), 1, Some(1)),
            scalar("now", Fixed(Date), 0, Some(0)),
            scalar("curdate", Fixed(Date), 0, Some(0)),
            scalar("curtime", Fixed(Date), 0, Some(0)),
            scalar("cast", Dynamic, 2, Some(2)),
            scalar("convert", Dynamic, 2, Some(2)),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.aggregate)
    }

    /// All registered names; the runtime evaluator must dispatch the
    /// same set.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Infer the return type for a call, failing on unknown names and
    /// arity mismatches.
    pub fn return_type(&self, name: &str, arg_types: &[FieldType]) -> QueryResult<FieldType> {
        let spec = self
            .get(name)
            .ok_or_else(|| QueryError::Type(format!("unknown function '{name}'")))?;
        if arg_types.len() < spec.min_args
            || spec.max_args.is_some_and(|max| arg_types.len() > max)
        {
            return Err(QueryError::Type(format!(
                "function '{name}' called with {} argument(s)",
                arg_types.len()
            )));
        }
        Ok(match spec.rule {
            ReturnRule::Fixed(ty) => ty,
            ReturnRule::ArgType => arg_types.first().copied().unwrap_or(FieldType::Unknown),
            ReturnRule::ArgOrDouble => match arg_types.first() {
                Some(FieldType::Unknown) | None => FieldType::Double,
                Some(ty) => *ty,
            },
            ReturnRule::Dynamic => FieldType::Unknown,
        })
    }
}
