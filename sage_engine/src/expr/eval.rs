//! Evaluator for the SAGE expression DSL.
//!
//! An [`Expr`] is evaluated twice in the Validator, against two different
//! [`RowMode`]s: once per-row for field/row-scope rules, once over the
//! whole frame for catalog/package-scope rules. Rather than
//! writing two evaluators, a single one threads the mode through and
//! produces either a [`Value::Scalar`] or a [`Value::Column`]/[`Value::BoolVec`]
//! depending on what the expression actually touches — a literal always
//! evaluates to a scalar, `shape[0]` always to a scalar, a bare column
//! reference evaluates according to the mode.

use std::collections::{HashMap, HashSet};

use crate::model::{CellValue, Table};

use super::ast::{BinaryOp, ColumnPredicate, Expr, Reduction, UnaryOp};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExprError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
}

/// Where, in the row/frame sense, an expression is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    /// Field/row-scope: evaluate against a single row, producing scalars.
    Row(usize),
    /// Catalog/package-scope: evaluate against the whole table at once,
    /// producing vectors for column references.
    Frame,
}

/// Tables visible to one evaluation: the scope's own table plus, for
/// package-level cross rules, every other catalog in the package keyed by
/// its logical name (the `df['logical_name']` form).
pub struct EvalContext<'a> {
    pub table: &'a Table,
    pub other_tables: HashMap<String, &'a Table>,
    pub mode: RowMode,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn for_row(table: &'a Table, row_index: usize) -> Self {
        Self {
            table,
            other_tables: HashMap::new(),
            mode: RowMode::Row(row_index),
        }
    }

    #[must_use]
    pub fn for_frame(table: &'a Table) -> Self {
        Self {
            table,
            other_tables: HashMap::new(),
            mode: RowMode::Frame,
        }
    }

    #[must_use]
    pub fn with_table(mut self, logical_name: impl Into<String>, table: &'a Table) -> Self {
        self.other_tables.insert(logical_name.into(), table);
        self
    }
}

/// The result of evaluating an [`Expr`]: either a single value, or a
/// per-row vector (columns keep their `CellValue` typing; predicate and
/// logical results collapse to booleans).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(CellValue),
    Bool(bool),
    Column(Vec<CellValue>),
    BoolVec(Vec<bool>),
}

impl Value {
    /// Coerce to a single boolean, per the `all()` reduction rule: a
    /// `BoolVec` is true only if every element is true (an empty vector
    /// is vacuously true).
    pub fn as_bool(&self) -> Result<bool, ExprError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::BoolVec(v) => Ok(v.iter().all(|b| *b)),
            other => Err(ExprError::TypeError(format!(
                "expected a boolean result, got {other:?}"
            ))),
        }
    }

    fn as_number(&self) -> Result<f64, ExprError> {
        match self {
            Value::Scalar(CellValue::Number(n)) => Ok(*n),
            other => Err(ExprError::TypeError(format!("expected a number, got {other:?}"))),
        }
    }
}

pub fn eval(expr: &Expr, ctx: &EvalContext) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(n) => Ok(Value::Scalar(CellValue::Number(*n))),
        Expr::Str(s) => Ok(Value::Scalar(CellValue::Text(s.clone()))),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Column(name) => eval_column(ctx.table, name, ctx.mode),
        Expr::TableColumn { table, column } => {
            let other = ctx
                .other_tables
                .get(table)
                .ok_or_else(|| ExprError::UnknownTable(table.clone()))?;
            eval_column(other, column, RowMode::Frame)
        }
        Expr::ShapeRow => Ok(Value::Scalar(CellValue::Number(ctx.table.row_count() as f64))),
        Expr::List(items) => {
            let mut cells = Vec::with_capacity(items.len());
            for item in items {
                match eval(item, ctx)? {
                    Value::Scalar(cell) => cells.push(cell),
                    Value::Bool(b) => cells.push(CellValue::Text(b.to_string())),
                    other => {
                        return Err(ExprError::TypeError(format!(
                            "list literal elements must be scalars, got {other:?}"
                        )))
                    }
                }
            }
            Ok(Value::Column(cells))
        }
        Expr::Unary(op, inner) => eval_unary(*op, eval(inner, ctx)?),
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, eval(lhs, ctx)?, eval(rhs, ctx)?),
        Expr::Predicate { receiver, predicate } => eval_predicate(predicate, eval(receiver, ctx)?, ctx),
        Expr::Reduce { receiver, reduction } => eval_reduce(*reduction, eval(receiver, ctx)?),
    }
}

fn eval_column(table: &Table, name: &str, mode: RowMode) -> Result<Value, ExprError> {
    let idx = table
        .column_index(name)
        .ok_or_else(|| ExprError::UnknownColumn(name.to_owned()))?;
    match mode {
        RowMode::Row(row) => Ok(Value::Scalar(table.rows[row][idx].clone())),
        RowMode::Frame => Ok(Value::Column(table.rows.iter().map(|r| r[idx].clone()).collect())),
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => match value {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::BoolVec(v) => Ok(Value::BoolVec(v.into_iter().map(|b| !b).collect())),
            other => Err(ExprError::TypeError(format!("cannot negate {other:?}"))),
        },
        UnaryOp::Neg => match value {
            Value::Scalar(CellValue::Number(n)) => Ok(Value::Scalar(CellValue::Number(-n))),
            Value::Column(cells) => Ok(Value::Column(
                cells
                    .into_iter()
                    .map(|c| match c {
                        CellValue::Number(n) => CellValue::Number(-n),
                        other => other,
                    })
                    .collect(),
            )),
            other => Err(ExprError::TypeError(format!("cannot negate {other:?}"))),
        },
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    use BinaryOp::*;
    match op {
        Add | Sub | Mul | Div => eval_arithmetic(op, lhs, rhs),
        Eq | Ne | Lt | Le | Gt | Ge => eval_comparison(op, lhs, rhs),
        And | BitAnd => eval_logical(lhs, rhs, |a, b| a && b),
        Or | BitOr => eval_logical(lhs, rhs, |a, b| a || b),
    }
}

fn eval_arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    let apply = |a: f64, b: f64| -> f64 {
        match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            _ => unreachable!(),
        }
    };
    match (lhs, rhs) {
        (Value::Scalar(CellValue::Number(a)), Value::Scalar(CellValue::Number(b))) => {
            Ok(Value::Scalar(CellValue::Number(apply(a, b))))
        }
        (Value::Column(a), Value::Column(b)) => {
            let out = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| arithmetic_cell(x, y, apply))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Column(out))
        }
        (Value::Column(a), Value::Scalar(CellValue::Number(b))) => {
            let out = a
                .iter()
                .map(|x| arithmetic_cell(x, &CellValue::Number(b), apply))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Column(out))
        }
        (Value::Scalar(CellValue::Number(a)), Value::Column(b)) => {
            let out = b
                .iter()
                .map(|y| arithmetic_cell(&CellValue::Number(a), y, apply))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Column(out))
        }
        (a, b) => Err(ExprError::TypeError(format!(
            "cannot apply arithmetic to {a:?} and {b:?}"
        ))),
    }
}

fn arithmetic_cell(a: &CellValue, b: &CellValue, apply: impl Fn(f64, f64) -> f64) -> Result<CellValue, ExprError> {
    match (a, b) {
        (CellValue::Null, _) | (_, CellValue::Null) => Ok(CellValue::Null),
        (CellValue::Number(x), CellValue::Number(y)) => Ok(CellValue::Number(apply(*x, *y))),
        _ => Err(ExprError::TypeError("arithmetic requires numeric operands".into())),
    }
}

fn eval_comparison(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    let cmp = |a: &CellValue, b: &CellValue| -> bool {
        let ordering = match (a, b) {
            (CellValue::Number(x), CellValue::Number(y)) => x.partial_cmp(y),
            (CellValue::Text(x), CellValue::Text(y)) => Some(x.cmp(y)),
            (CellValue::Date(x), CellValue::Date(y)) => Some(x.cmp(y)),
            (CellValue::Null, CellValue::Null) => Some(std::cmp::Ordering::Equal),
            _ => None,
        };
        match (op, ordering) {
            (BinaryOp::Eq, Some(o)) => o == std::cmp::Ordering::Equal,
            (BinaryOp::Eq, None) => a == b,
            (BinaryOp::Ne, Some(o)) => o != std::cmp::Ordering::Equal,
            (BinaryOp::Ne, None) => a != b,
            (BinaryOp::Lt, Some(o)) => o == std::cmp::Ordering::Less,
            (BinaryOp::Le, Some(o)) => o != std::cmp::Ordering::Greater,
            (BinaryOp::Gt, Some(o)) => o == std::cmp::Ordering::Greater,
            (BinaryOp::Ge, Some(o)) => o != std::cmp::Ordering::Less,
            (_, None) => false,
            _ => unreachable!(),
        }
    };
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Bool(cmp(&a, &b))),
        (Value::Column(a), Value::Column(b)) => {
            Ok(Value::BoolVec(a.iter().zip(b.iter()).map(|(x, y)| cmp(x, y)).collect()))
        }
        (Value::Column(a), Value::Scalar(b)) => Ok(Value::BoolVec(a.iter().map(|x| cmp(x, &b)).collect())),
        (Value::Scalar(a), Value::Column(b)) => Ok(Value::BoolVec(b.iter().map(|y| cmp(&a, y)).collect())),
        (a, b) => Err(ExprError::TypeError(format!("cannot compare {a:?} and {b:?}"))),
    }
}

fn eval_logical(lhs: Value, rhs: Value, apply: impl Fn(bool, bool) -> bool) -> Result<Value, ExprError> {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(apply(a, b))),
        (Value::BoolVec(a), Value::BoolVec(b)) => {
            Ok(Value::BoolVec(a.into_iter().zip(b).map(|(x, y)| apply(x, y)).collect()))
        }
        (Value::BoolVec(a), Value::Bool(b)) => Ok(Value::BoolVec(a.into_iter().map(|x| apply(x, b)).collect())),
        (Value::Bool(a), Value::BoolVec(b)) => Ok(Value::BoolVec(b.into_iter().map(|y| apply(a, y)).collect())),
        (a, b) => Err(ExprError::TypeError(format!(
            "cannot apply logical operator to {a:?} and {b:?}"
        ))),
    }
}

fn eval_reduce(reduction: Reduction, value: Value) -> Result<Value, ExprError> {
    match reduction {
        Reduction::All => Ok(Value::Bool(value.as_bool()?)),
        Reduction::Any => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::BoolVec(v) => Ok(Value::Bool(v.iter().any(|b| *b))),
            other => Err(ExprError::TypeError(format!("any() requires a boolean vector, got {other:?}"))),
        },
        Reduction::Min | Reduction::Max | Reduction::Sum | Reduction::Mean => {
            let numbers = numeric_column(&value)?;
            if numbers.is_empty() {
                return Ok(Value::Scalar(CellValue::Null));
            }
            let result = match reduction {
                Reduction::Min => numbers.iter().cloned().fold(f64::INFINITY, f64::min),
                Reduction::Max => numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                Reduction::Sum => numbers.iter().sum(),
                Reduction::Mean => numbers.iter().sum::<f64>() / numbers.len() as f64,
                _ => unreachable!(),
            };
            Ok(Value::Scalar(CellValue::Number(result)))
        }
        Reduction::NUnique => match value {
            Value::Column(cells) => {
                let distinct: HashSet<String> = cells.iter().filter(|c| !c.is_null()).map(cell_key).collect();
                Ok(Value::Scalar(CellValue::Number(distinct.len() as f64)))
            }
            other => Err(ExprError::TypeError(format!("nunique() requires a column, got {other:?}"))),
        },
    }
}

fn numeric_column(value: &Value) -> Result<Vec<f64>, ExprError> {
    match value {
        Value::Column(cells) => cells
            .iter()
            .filter(|c| !c.is_null())
            .map(|c| {
                c.as_number()
                    .ok_or_else(|| ExprError::TypeError("reduction requires a numeric column".into()))
            })
            .collect(),
        Value::Scalar(CellValue::Number(n)) => Ok(vec![*n]),
        other => Err(ExprError::TypeError(format!("expected a numeric column, got {other:?}"))),
    }
}

fn cell_key(cell: &CellValue) -> String {
    match cell {
        CellValue::Text(s) => format!("t:{s}"),
        CellValue::Number(n) => format!("n:{n}"),
        CellValue::Date(d) => format!("d:{d}"),
        CellValue::Null => "null".to_owned(),
    }
}

fn eval_predicate(predicate: &ColumnPredicate, receiver: Value, ctx: &EvalContext) -> Result<Value, ExprError> {
    match predicate {
        ColumnPredicate::NotNull | ColumnPredicate::NotNa => match receiver {
            Value::Scalar(cell) => Ok(Value::Bool(!cell.is_null())),
            Value::Column(cells) => Ok(Value::BoolVec(cells.iter().map(|c| !c.is_null()).collect())),
            other => Err(ExprError::TypeError(format!("notnull() requires a column, got {other:?}"))),
        },
        ColumnPredicate::IsIn(set_expr) => {
            let set_value = eval(set_expr, ctx)?;
            let set: HashSet<String> = match set_value {
                Value::Column(cells) => cells.iter().map(cell_key).collect(),
                other => {
                    return Err(ExprError::TypeError(format!(
                        "isin() argument must be a list or column, got {other:?}"
                    )))
                }
            };
            match receiver {
                Value::Scalar(cell) => Ok(Value::Bool(set.contains(&cell_key(&cell)))),
                Value::Column(cells) => {
                    Ok(Value::BoolVec(cells.iter().map(|c| set.contains(&cell_key(c))).collect()))
                }
                other => Err(ExprError::TypeError(format!("isin() requires a column, got {other:?}"))),
            }
        }
        ColumnPredicate::Duplicated { keep_first } => match receiver {
            Value::Column(cells) => {
                let keys: Vec<String> = cells.iter().map(cell_key).collect();
                let flags = if *keep_first {
                    let mut seen: HashSet<String> = HashSet::new();
                    keys.into_iter().map(|k| !seen.insert(k)).collect()
                } else {
                    let mut counts: HashMap<String, usize> = HashMap::new();
                    for k in &keys {
                        *counts.entry(k.clone()).or_insert(0) += 1;
                    }
                    keys.into_iter().map(|k| counts[&k] > 1).collect()
                };
                Ok(Value::BoolVec(flags))
            }
            other => Err(ExprError::TypeError(format!("duplicated() requires a column, got {other:?}"))),
        },
        ColumnPredicate::StrContains(pattern_expr) => {
            let pattern = eval_str_arg(pattern_expr, ctx)?;
            apply_str(receiver, |s| s.contains(&pattern))
        }
        ColumnPredicate::StrMatch(pattern_expr) => {
            let pattern = eval_str_arg(pattern_expr, ctx)?;
            let re = regex::Regex::new(&pattern).map_err(|e| ExprError::InvalidRegex(e.to_string()))?;
            apply_str(receiver, |s| re.is_match(s))
        }
    }
}

fn eval_str_arg(expr: &Expr, ctx: &EvalContext) -> Result<String, ExprError> {
    match eval(expr, ctx)? {
        Value::Scalar(CellValue::Text(s)) => Ok(s),
        other => Err(ExprError::TypeError(format!("expected a string argument, got {other:?}"))),
    }
}

fn apply_str(receiver: Value, f: impl Fn(&str) -> bool) -> Result<Value, ExprError> {
    match receiver {
        Value::Scalar(CellValue::Text(s)) => Ok(Value::Bool(f(&s))),
        Value::Scalar(CellValue::Null) => Ok(Value::Bool(false)),
        Value::Column(cells) => Ok(Value::BoolVec(
            cells
                .iter()
                .map(|c| match c {
                    CellValue::Text(s) => f(s),
                    _ => false,
                })
                .collect(),
        )),
        other => Err(ExprError::TypeError(format!("string method requires text, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn sample_table() -> Table {
        Table {
            columns: vec!["total".into(), "cantidad".into(), "precio_unitario".into()],
            rows: vec![
                vec![CellValue::Number(20.0), CellValue::Number(2.0), CellValue::Number(10.0)],
                vec![CellValue::Number(99.0), CellValue::Number(2.0), CellValue::Number(10.0)],
            ],
        }
    }

    #[test]
    fn row_mode_arithmetic_rule_holds_for_row_zero() {
        let table = sample_table();
        let expr = parse("total == cantidad * precio_unitario").unwrap();
        let ctx = EvalContext::for_row(&table, 0);
        assert_eq!(eval(&expr, &ctx).unwrap().as_bool().unwrap(), true);
    }

    #[test]
    fn row_mode_arithmetic_rule_fails_for_row_one() {
        let table = sample_table();
        let expr = parse("total == cantidad * precio_unitario").unwrap();
        let ctx = EvalContext::for_row(&table, 1);
        assert_eq!(eval(&expr, &ctx).unwrap().as_bool().unwrap(), false);
    }

    #[test]
    fn frame_mode_all_reduction_catches_any_failure() {
        let table = sample_table();
        let expr = parse("(total == cantidad * precio_unitario).all()").unwrap();
        let ctx = EvalContext::for_frame(&table);
        assert_eq!(eval(&expr, &ctx).unwrap().as_bool().unwrap(), false);
    }

    #[test]
    fn isin_against_literal_list() {
        let table = Table {
            columns: vec!["status".into()],
            rows: vec![
                vec![CellValue::Text("active".into())],
                vec![CellValue::Text("bogus".into())],
            ],
        };
        let expr = parse("status.isin(['active', 'inactive'])").unwrap();
        let ctx = EvalContext::for_frame(&table);
        match eval(&expr, &ctx).unwrap() {
            Value::BoolVec(v) => assert_eq!(v, vec![true, false]),
            other => panic!("expected BoolVec, got {other:?}"),
        }
    }

    #[test]
    fn isin_against_another_tables_column() {
        let ventas = Table {
            columns: vec!["customer_id".into()],
            rows: vec![vec![CellValue::Number(1.0)], vec![CellValue::Number(2.0)]],
        };
        let clientes = Table {
            columns: vec!["customer_id".into()],
            rows: vec![vec![CellValue::Number(1.0)]],
        };
        let expr = parse("df['ventas']['customer_id'].isin(df['clientes']['customer_id'])").unwrap();
        let ctx = EvalContext::for_frame(&ventas)
            .with_table("ventas", &ventas)
            .with_table("clientes", &clientes);
        match eval(&expr, &ctx).unwrap() {
            Value::BoolVec(v) => assert_eq!(v, vec![true, false]),
            other => panic!("expected BoolVec, got {other:?}"),
        }
    }

    #[test]
    fn duplicated_keep_false_flags_every_occurrence() {
        let table = Table {
            columns: vec!["codigo_producto".into()],
            rows: vec![
                vec![CellValue::Text("A".into())],
                vec![CellValue::Text("B".into())],
                vec![CellValue::Text("A".into())],
            ],
        };
        let expr = parse("codigo_producto.duplicated(keep=False)").unwrap();
        let ctx = EvalContext::for_frame(&table);
        match eval(&expr, &ctx).unwrap() {
            Value::BoolVec(v) => assert_eq!(v, vec![true, false, true]),
            other => panic!("expected BoolVec, got {other:?}"),
        }
    }

    #[test]
    fn shape_row_counts_rows() {
        let table = sample_table();
        let expr = parse("shape[0] > 0").unwrap();
        let ctx = EvalContext::for_frame(&table);
        assert_eq!(eval(&expr, &ctx).unwrap().as_bool().unwrap(), true);
    }

    #[test]
    fn str_contains_checks_substring() {
        let table = Table {
            columns: vec!["email".into()],
            rows: vec![vec![CellValue::Text("a@b.com".into())], vec![CellValue::Text("nope".into())]],
        };
        let expr = parse("email.str.contains('@')").unwrap();
        let ctx = EvalContext::for_frame(&table);
        match eval(&expr, &ctx).unwrap() {
            Value::BoolVec(v) => assert_eq!(v, vec![true, false]),
            other => panic!("expected BoolVec, got {other:?}"),
        }
    }

    #[test]
    fn unknown_column_is_an_error() {
        let table = sample_table();
        let expr = parse("missing == 1").unwrap();
        let ctx = EvalContext::for_row(&table, 0);
        assert_eq!(eval(&expr, &ctx), Err(ExprError::UnknownColumn("missing".into())));
    }
}
