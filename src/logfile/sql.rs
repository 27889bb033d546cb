use crate::{errors::LogfileError, logfile::types::{ColumnValue, Row}};
use sqlparser::{
	ast::{BinaryOperator, Expr, UnaryOperator, Value},
	dialect::GenericDialect,
	parser::Parser,
};

/// Comparison operators a single predicate can use against a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmp {
	Eq,
	NotEq,
	Lt,
	LtEq,
	Gt,
	GtEq,
}

/// A compiled value-expression filter: either a leaf comparison against a
/// column, or a boolean combination of sub-predicates. Grounded on the
/// teacher's `Selection`/`Condition` model, narrowed to the scan engine's
/// "value expression, no joins/aggregation" scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	Compare {
		column: String,
		op: Cmp,
		value: ColumnValue,
	},
	And(Box<Predicate>, Box<Predicate>),
	Or(Box<Predicate>, Box<Predicate>),
	Not(Box<Predicate>),
}

impl Predicate {
	pub fn eval(&self, row: &Row) -> bool {
		match self {
			Predicate::Compare { column, op, value } => {
				row.get(column).is_some_and(|v| compare(v, op, value))
			}
			Predicate::And(l, r) => l.eval(row) && r.eval(row),
			Predicate::Or(l, r) => l.eval(row) || r.eval(row),
			Predicate::Not(p) => !p.eval(row),
		}
	}
}

fn compare(actual: &ColumnValue, op: &Cmp, expected: &ColumnValue) -> bool {
	match (actual.as_str(), expected.as_str()) {
		(Some(a), Some(b)) => match op {
			Cmp::Eq => a == b,
			Cmp::NotEq => a != b,
			Cmp::Lt => a < b,
			Cmp::LtEq => a <= b,
			Cmp::Gt => a > b,
			Cmp::GtEq => a >= b,
		},
		_ => match (actual.as_f64(), expected.as_f64()) {
			(Some(a), Some(b)) => match op {
				Cmp::Eq => a == b,
				Cmp::NotEq => a != b,
				Cmp::Lt => a < b,
				Cmp::LtEq => a <= b,
				Cmp::Gt => a > b,
				Cmp::GtEq => a >= b,
			},
			_ => false,
		},
	}
}

/// Compiles a condition string into exactly one `Predicate`. The string is
/// split on top-level `;` boundaries; any split producing a count other
/// than one statement is rejected — this scan engine supports a single
/// value-expression filter per request, not a script.
pub fn compile(condition: &str) -> Result<Predicate, LogfileError> {
	let dialect = GenericDialect {};
	let segments: Vec<&str> = condition
		.split(';')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.collect();
	if segments.len() != 1 {
		return Err(LogfileError::parse_error(format!(
			"expected exactly one condition expression, got {}",
			segments.len()
		)));
	}
	let mut parser = Parser::new(&dialect)
		.try_with_sql(segments[0])
		.map_err(|e| LogfileError::parse_error(e.to_string()))?;
	let expr = parser
		.parse_expr()
		.map_err(|e| LogfileError::parse_error(e.to_string()))?;
	compile_expr(&expr)
}

fn compile_expr(expr: &Expr) -> Result<Predicate, LogfileError> {
	match expr {
		Expr::BinaryOp { left, op, right } => match op {
			BinaryOperator::And => Ok(Predicate::And(
				Box::new(compile_expr(left)?),
				Box::new(compile_expr(right)?),
			)),
			BinaryOperator::Or => Ok(Predicate::Or(
				Box::new(compile_expr(left)?),
				Box::new(compile_expr(right)?),
			)),
			_ => compile_comparison(left, op, right),
		},
		Expr::UnaryOp {
			op: UnaryOperator::Not,
			expr,
		} => Ok(Predicate::Not(Box::new(compile_expr(expr)?))),
		Expr::Nested(inner) => compile_expr(inner),
		other => Err(LogfileError::parse_error(format!(
			"unsupported condition expression: {other}"
		))),
	}
}

fn compile_comparison(
	left: &Expr,
	op: &BinaryOperator,
	right: &Expr,
) -> Result<Predicate, LogfileError> {
	let column = identifier(left)?;
	let value = literal(right)?;
	let op = match op {
		BinaryOperator::Eq => Cmp::Eq,
		BinaryOperator::NotEq => Cmp::NotEq,
		BinaryOperator::Lt => Cmp::Lt,
		BinaryOperator::LtEq => Cmp::LtEq,
		BinaryOperator::Gt => Cmp::Gt,
		BinaryOperator::GtEq => Cmp::GtEq,
		other => {
			return Err(LogfileError::parse_error(format!(
				"unsupported comparison operator: {other}"
			)))
		}
	};
	Ok(Predicate::Compare { column, op, value })
}

fn identifier(expr: &Expr) -> Result<String, LogfileError> {
	match expr {
		Expr::Identifier(ident) => Ok(ident.value.clone()),
		Expr::CompoundIdentifier(parts) => {
			Ok(parts.last().map(|p| p.value.clone()).unwrap_or_default())
		}
		other => Err(LogfileError::parse_error(format!(
			"expected a column reference, got: {other}"
		))),
	}
}

fn literal(expr: &Expr) -> Result<ColumnValue, LogfileError> {
	match expr {
		Expr::Value(v) => match &v.value {
			Value::Number(n, _) => n
				.parse::<i64>()
				.map(ColumnValue::Int)
				.or_else(|_| n.parse::<f64>().map(ColumnValue::Float))
				.map_err(|_| {
					LogfileError::parse_error(format!(
						"invalid numeric literal: {n}"
					))
				}),
			Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
				Ok(ColumnValue::String(s.clone()))
			}
			Value::Boolean(b) => Ok(ColumnValue::Bool(*b)),
			Value::Null => Ok(ColumnValue::Null),
			other => Err(LogfileError::parse_error(format!(
				"unsupported literal: {other}"
			))),
		},
		other => Err(LogfileError::parse_error(format!(
			"expected a literal value, got: {other}"
		))),
	}
}
