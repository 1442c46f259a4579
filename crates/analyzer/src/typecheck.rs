use crate::FunctionRegistry;
use ast::{BinaryOp, Expr, Literal, UnaryOp};
use catalog::{Schema, Scope};
use common::{QueryError, QueryResult};
use types::FieldType;

/// Infers a `FieldType` for every expression.
///
/// Names introduced by the pipeline (scope) take precedence over source
/// fields (schema). `Unknown` means "any; do not constrain" and is the
/// type of NULL literals.
pub struct TypeChecker<'a> {
    scope: &'a Scope,
    schema: &'a Schema,
    registry: &'a FunctionRegistry,
}

impl<'a> TypeChecker<'a> {
    pub fn new(scope: &'a Scope, schema: &'a Schema, registry: &'a FunctionRegistry) -> Self {
        Self {
            scope,
            schema,
            registry,
        }
    }

    pub fn check(&self, expr: &Expr) -> QueryResult<FieldType> {
        match expr {
            Expr::Literal(lit) => Ok(literal_type(lit)),
            Expr::Field(name) => self.resolve_field(name),
            Expr::Binary { op, left, right } => self.check_binary(*op, left, right),
            Expr::Unary { op, expr } => self.check_unary(*op, expr),
            Expr::Call { name, args } => {
                let arg_types = args
                    .iter()
                    .map(|a| self.check(a))
                    .collect::<QueryResult<Vec<_>>>()?;
                self.registry.return_type(name, &arg_types)
            }
            Expr::Case { whens, else_ } => self.check_case(whens, else_.as_deref()),
            // Bare lists only appear as the right side of IN; their
            // element types are checked there.
            Expr::List(_) => Ok(FieldType::Unknown),
        }
    }

    pub fn resolve_field(&self, name: &str) -> QueryResult<FieldType> {
        if let Some(symbol) = self.scope.resolve(name) {
            return Ok(symbol.field_type);
        }
        self.schema
            .lookup(name)
            .map(|f| f.field_type)
            .map_err(|_| QueryError::Schema(format!("field '{name}' not found")))
    }

    fn check_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> QueryResult<FieldType> {
        if op.is_logical() {
            let lt = self.check(left)?;
            let rt = self.check(right)?;
            for ty in [lt, rt] {
                if !matches!(ty, FieldType::Bool | FieldType::Unknown) {
                    return Err(QueryError::Type(format!(
                        "operator {op:?} requires boolean operands, got {ty:?}"
                    )));
                }
            }
            return Ok(FieldType::Bool);
        }

        if op.is_comparison() {
            if op == BinaryOp::In {
                return self.check_in(left, right);
            }
            let lt = self.check(left)?;
            let rt = self.check(right)?;
            self.check_comparable(op, lt, rt)?;
            return Ok(FieldType::Bool);
        }

        if op.is_arithmetic() {
            let lt = self.check(left)?;
            let rt = self.check(right)?;
            return match (lt, rt) {
                (FieldType::Unknown, FieldType::Unknown) => Ok(FieldType::Unknown),
                (FieldType::Unknown, ty) | (ty, FieldType::Unknown) if ty.is_numeric() => Ok(ty),
                (lt, rt) if lt.is_numeric() && rt.is_numeric() => {
                    // Division keeps integer types; two Longs divide to Long.
                    Ok(FieldType::promote(lt, rt).unwrap_or(FieldType::Double))
                }
                _ => Err(QueryError::Type(format!(
                    "operator {op:?} requires numeric operands, got {lt:?} and {rt:?}"
                ))),
            };
        }

        Err(QueryError::Type(format!("unsupported operator {op:?}")))
    }

    /// NULL compares to anything; equality accepts any two comparable
    /// types; ordering stays within a family.
    fn check_comparable(&self, op: BinaryOp, lt: FieldType, rt: FieldType) -> QueryResult<()> {
        if lt == FieldType::Unknown || rt == FieldType::Unknown {
            return Ok(());
        }
        if !lt.is_comparable() || !rt.is_comparable() {
            return Err(QueryError::Type(format!(
                "type {:?} is not comparable",
                if lt.is_comparable() { rt } else { lt }
            )));
        }
        match op {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Like => Ok(()),
            _ => {
                let compatible = (lt.is_numeric() && rt.is_numeric())
                    || (lt.is_string_like() && rt.is_string_like())
                    || lt == rt;
                if compatible {
                    Ok(())
                } else {
                    Err(QueryError::Type(format!(
                        "incompatible types {lt:?} and {rt:?} for operator {op:?}"
                    )))
                }
            }
        }
    }

    fn check_in(&self, left: &Expr, right: &Expr) -> QueryResult<FieldType> {
        let lt = self.check(left)?;
        let elements: &[Expr] = match right {
            Expr::List(values) => values,
            other => std::slice::from_ref(other),
        };
        for element in elements {
            let et = self.check(element)?;
            self.check_comparable(BinaryOp::Eq, lt, et)?;
        }
        Ok(FieldType::Bool)
    }

    fn check_unary(&self, op: UnaryOp, expr: &Expr) -> QueryResult<FieldType> {
        let ty = self.check(expr)?;
        match op {
            UnaryOp::Not => {
                if matches!(ty, FieldType::Bool | FieldType::Unknown) {
                    Ok(FieldType::Bool)
                } else {
                    Err(QueryError::Type(format!(
                        "operator NOT requires a boolean operand, got {ty:?}"
                    )))
                }
            }
            UnaryOp::Neg | UnaryOp::Plus => {
                if ty.is_numeric() || ty == FieldType::Unknown {
                    Ok(ty)
                } else {
                    Err(QueryError::Type(format!(
                        "operator {op:?} requires a numeric operand, got {ty:?}"
                    )))
                }
            }
        }
    }

    fn check_case(
        &self,
        whens: &[ast::WhenClause],
        else_: Option<&Expr>,
    ) -> QueryResult<FieldType> {
        let mut result: Option<FieldType> = None;
        for when in whens {
            let cond = self.check(&when.condition)?;
            if !matches!(cond, FieldType::Bool | FieldType::Unknown) {
                return Err(QueryError::Type(format!(
                    "case condition must be boolean, got {cond:?}"
                )));
            }
            let then = self.check(&when.then)?;
            result = Some(self.unify(result, then)?);
        }
        if let Some(else_) = else_ {
            let ty = self.check(else_)?;
            result = Some(self.unify(result, ty)?);
        }
        Ok(result.unwrap_or(FieldType::Unknown))
    }

    fn unify(&self, current: Option<FieldType>, next: FieldType) -> QueryResult<FieldType> {
        let Some(current) = current else {
            return Ok(next);
        };
        if current == FieldType::Unknown {
            return Ok(next);
        }
        if next == FieldType::Unknown {
            return Ok(current);
        }
        FieldType::common_type(current, next).ok_or_else(|| {
            QueryError::Type(format!(
                "incompatible types {current:?} and {next:?} in case branches"
            ))
        })
    }
}

/// Literal kinds map directly: integers widen to Long, floats to Double.
pub fn literal_type(lit: &Literal) -> FieldType {
    match lit {
        Literal::Int(_) => FieldType::Long,
        Literal::Float(_) => FieldType::Double,
        Literal::Str(_) => FieldType::String,
        Literal::Bool(_) => FieldType::Bool,
        Literal::Null => FieldType::Unknown,
    }
}
