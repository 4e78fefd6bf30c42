//! Validator: orchestrates field → row → catalog → package scopes,
//! producing an ordered [`Diagnostic`].
//!
//! Per-catalog checks run first, then package-level cross rules once
//! every catalog has been visited, with a
//! `catch_unwind(AssertUnwindSafe(...))` dispatch boundary around each
//! scope so a panicking expression evaluation cannot take down the
//! whole validation pass.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use crate::expr::{self, EvalContext, Expr, ExprError, RowMode, Value};
use crate::finding::{Diagnostic, Finding, Locator, Scope, Severity};
use crate::model::{Catalog, CellValue, CrossRule, FieldSpec, FieldType, Package, Schema, Table};

/// Run the full Validator pass for one package submission: field/row/
/// catalog scopes over every catalog in declaration order, then
/// package-scope cross rules.
pub fn run(schema: &Schema, package: &Package, tables: &HashMap<String, Table>) -> Diagnostic {
    let mut diagnostic = Diagnostic::new();
    let mut failed_catalogs: HashSet<String> = HashSet::new();
    let mut coerced_tables: HashMap<String, Table> = HashMap::new();

    for catalog_ref in &package.catalogs {
        let Some(catalog) = schema.catalogs.get(catalog_ref.catalog.0) else {
            continue;
        };
        let Some(table) = tables.get(&catalog_ref.logical_name) else {
            continue;
        };

        let before = diagnostic.findings.len();
        let (coerced, per_catalog) = run_catalog_scopes(catalog, table);
        diagnostic.extend(per_catalog);
        if diagnostic.findings[before..].iter().any(|f| f.severity == Severity::Error) {
            failed_catalogs.insert(catalog_ref.logical_name.clone());
        }
        coerced_tables.insert(catalog_ref.logical_name.clone(), coerced);
    }

    diagnostic.extend(run_package_scope(package, &coerced_tables, &failed_catalogs));

    diagnostic
}

/// Field, row and catalog scope for a single catalog. Returns the
/// type-coerced table (needed by package-scope cross rules) alongside
/// the Findings produced.
fn run_catalog_scopes(catalog: &Catalog, table: &Table) -> (Table, Vec<Finding>) {
    let mut findings = Vec::new();

    let coerced = match panic::catch_unwind(AssertUnwindSafe(|| field_scope(catalog, table, &mut findings))) {
        Ok(coerced) => coerced,
        Err(_) => {
            findings.push(internal_error(Scope::Field, &catalog.name));
            table.clone()
        }
    };

    if let Some(row_validation) = &catalog.row_validation {
        if has_error(&findings) {
            findings.push(skip_finding(&catalog.name, "row"));
        } else {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                evaluate_row_scope(row_validation.expression.clone().into(), &coerced)
            }));
            match result {
                Ok(Ok(failing_rows)) => {
                    for row_index in failing_rows {
                        findings.push(
                            Finding::new(
                                row_validation.severity,
                                Scope::Row,
                                Locator::row(&catalog.name, "", row_index),
                                row_validation.message.clone(),
                            )
                            .with_rule_name(&catalog.name),
                        );
                    }
                }
                Ok(Err(e)) => findings.push(expr_error_finding(Scope::Catalog, &catalog.name, &e)),
                Err(_) => findings.push(internal_error(Scope::Row, &catalog.name)),
            }
        }
    }

    if let Some(catalog_validation) = &catalog.catalog_validation {
        if has_error(&findings) {
            findings.push(skip_finding(&catalog.name, "catalog"));
        } else {
            let ctx = EvalContext::for_frame(&coerced);
            let result = panic::catch_unwind(AssertUnwindSafe(|| expr::eval(&catalog_validation.expression, &ctx)));
            match result {
                Ok(Ok(value)) => match value.as_bool() {
                    Ok(true) => {}
                    Ok(false) => findings.push(Finding::new(
                        catalog_validation.severity,
                        Scope::Catalog,
                        Locator::catalog(&catalog.name),
                        catalog_validation.message.clone(),
                    )),
                    Err(e) => findings.push(Finding::new(
                        Severity::Error,
                        Scope::Catalog,
                        Locator::catalog(&catalog.name),
                        format!("catalog_validation did not evaluate to a boolean: {e}"),
                    )),
                },
                Ok(Err(e)) => findings.push(expr_error_finding(Scope::Catalog, &catalog.name, &e)),
                Err(_) => findings.push(internal_error(Scope::Catalog, &catalog.name)),
            }
        }
    }

    (coerced, findings)
}

fn has_error(findings: &[Finding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Error)
}

/// Records that `skipped_scope` (`"row"` or `"catalog"`) was short-
/// circuited for this catalog because an upstream scope already produced
/// an ERROR — per the early-stop policy, partial diagnosis still runs the
/// scopes that can, but a scope's prerequisite not being met is recorded
/// rather than silently skipped.
fn skip_finding(catalog: &str, skipped_scope: &str) -> Finding {
    Finding::new(
        Severity::Info,
        Scope::Catalog,
        Locator::catalog(catalog),
        format!(
            "{skipped_scope} scope skipped for catalog '{catalog}': an upstream scope already produced an ERROR"
        ),
    )
}

fn evaluate_row_scope(expression: Expr, table: &Table) -> Result<Vec<usize>, ExprError> {
    let ctx = EvalContext::for_frame(table);
    let value = expr::eval(&expression, &ctx)?;
    Ok(match value {
        Value::BoolVec(flags) => flags
            .into_iter()
            .enumerate()
            .filter_map(|(i, ok)| if ok { None } else { Some(i + 1) })
            .collect(),
        Value::Bool(true) => Vec::new(),
        Value::Bool(false) => (1..=table.row_count()).collect(),
        other => return Err(ExprError::TypeError(format!("row_validation did not evaluate to a boolean, got {other:?}"))),
    })
}

/// Field scope: required/unique/type-coercion checks followed by
/// declared `FieldRule`s. Returns a new [`Table`] with cells coerced to
/// their declared type where parsing succeeded.
fn field_scope(catalog: &Catalog, table: &Table, findings: &mut Vec<Finding>) -> Table {
    let mut coerced = table.clone();

    for field in &catalog.fields {
        let Some(idx) = table.column_index(&field.name) else {
            findings.push(Finding::new(
                Severity::Error,
                Scope::Catalog,
                Locator::catalog(&catalog.name),
                format!("declared column '{}' is missing from the input", field.name),
            ));
            continue;
        };

        check_required(catalog, field, table, idx, findings);
        check_unique(catalog, field, table, idx, findings);
        coerce_column(catalog, field, table, idx, findings, &mut coerced);
    }

    for field in &catalog.fields {
        let Some(idx) = coerced.column_index(&field.name) else { continue };
        for rule in &field.rules {
            run_field_rule(catalog, field, idx, rule, &coerced, findings);
        }
    }

    coerced
}

fn check_required(catalog: &Catalog, field: &FieldSpec, table: &Table, idx: usize, findings: &mut Vec<Finding>) {
    if !field.required {
        return;
    }
    for (row_i, row) in table.rows.iter().enumerate() {
        if row[idx].is_null() {
            findings.push(Finding::new(
                Severity::Error,
                Scope::Field,
                Locator::row(&catalog.name, &field.name, row_i + 1),
                format!("field '{}' is required but NULL", field.name),
            ));
        }
    }
}

fn check_unique(catalog: &Catalog, field: &FieldSpec, table: &Table, idx: usize, findings: &mut Vec<Finding>) {
    if !field.unique {
        return;
    }
    let mut seen: HashSet<String> = HashSet::new();
    for (row_i, row) in table.rows.iter().enumerate() {
        let cell = &row[idx];
        if cell.is_null() {
            // NULLs are not considered duplicates of each other.
            continue;
        }
        let key = cell.display();
        if !seen.insert(key) {
            findings.push(
                Finding::new(
                    Severity::Error,
                    Scope::Field,
                    Locator::row(&catalog.name, &field.name, row_i + 1),
                    format!("field '{}' must be unique; duplicate value", field.name),
                )
                .with_observed_value(cell.display()),
            );
        }
    }
}

fn coerce_column(
    catalog: &Catalog,
    field: &FieldSpec,
    table: &Table,
    idx: usize,
    findings: &mut Vec<Finding>,
    coerced: &mut Table,
) {
    for (row_i, row) in table.rows.iter().enumerate() {
        let raw = &row[idx];
        if raw.is_null() {
            continue;
        }
        let text = match raw.as_text() {
            Some(t) => t,
            None => continue,
        };
        match field.field_type {
            FieldType::Text => {
                if let Some(len) = field.length {
                    if text.chars().count() > len as usize {
                        findings.push(
                            Finding::new(
                                Severity::Warning,
                                Scope::Field,
                                Locator::row(&catalog.name, &field.name, row_i + 1),
                                format!("field '{}' exceeds declared length {len}", field.name),
                            )
                            .with_observed_value(text.to_owned()),
                        );
                    }
                }
            }
            FieldType::Number => match text.trim().parse::<f64>() {
                Ok(n) => {
                    if field.decimals > 0 || has_fractional_part(text) {
                        let precision = decimal_places(text);
                        if precision > field.decimals {
                            findings.push(
                                Finding::new(
                                    Severity::Warning,
                                    Scope::Field,
                                    Locator::row(&catalog.name, &field.name, row_i + 1),
                                    format!("field '{}' exceeds {} decimal place(s)", field.name, field.decimals),
                                )
                                .with_observed_value(text.to_owned()),
                            );
                        }
                    }
                    coerced.rows[row_i][idx] = CellValue::Number(n);
                }
                Err(_) => {
                    findings.push(
                        Finding::new(
                            Severity::Error,
                            Scope::Field,
                            Locator::row(&catalog.name, &field.name, row_i + 1),
                            format!("field '{}' is not a valid number", field.name),
                        )
                        .with_observed_value(text.to_owned()),
                    );
                    coerced.rows[row_i][idx] = CellValue::Null;
                }
            },
            FieldType::Date => match parse_tolerant_date(text) {
                Some(date) => coerced.rows[row_i][idx] = CellValue::Date(date),
                None => {
                    findings.push(
                        Finding::new(
                            Severity::Error,
                            Scope::Field,
                            Locator::row(&catalog.name, &field.name, row_i + 1),
                            format!("field '{}' is not a valid date", field.name),
                        )
                        .with_observed_value(text.to_owned()),
                    );
                    // errors='coerce' semantics: the bad value becomes NULL
                    // for every downstream evaluation.
                    coerced.rows[row_i][idx] = CellValue::Null;
                }
            },
            FieldType::Enum => {
                let allowed = field.allowed_values.as_deref().unwrap_or(&[]);
                if !allowed.iter().any(|v| v == text) {
                    findings.push(
                        Finding::new(
                            Severity::Error,
                            Scope::Field,
                            Locator::row(&catalog.name, &field.name, row_i + 1),
                            format!("field '{}' is not one of the allowed values", field.name),
                        )
                        .with_observed_value(text.to_owned()),
                    );
                }
            }
        }
    }
}

fn has_fractional_part(text: &str) -> bool {
    text.contains('.')
}

fn decimal_places(text: &str) -> u32 {
    text.split('.').nth(1).map(|frac| frac.trim_end_matches('0').len() as u32).unwrap_or(0)
}

/// Tolerant date parser (`errors='coerce'` semantics): tries a handful
/// of common layouts and yields `None` (-> NULL) rather than erroring.
fn parse_tolerant_date(text: &str) -> Option<chrono::NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];
    FORMATS.iter().find_map(|fmt| chrono::NaiveDate::parse_from_str(text.trim(), fmt).ok())
}

fn run_field_rule(
    catalog: &Catalog,
    field: &FieldSpec,
    idx: usize,
    rule: &crate::model::FieldRule,
    table: &Table,
    findings: &mut Vec<Finding>,
) {
    let ctx = EvalContext::for_frame(table);
    match expr::eval(&rule.validation_expression, &ctx) {
        Ok(Value::BoolVec(flags)) => {
            for (row_i, ok) in flags.into_iter().enumerate() {
                if !ok {
                    findings.push(
                        Finding::new(
                            rule.severity,
                            Scope::Field,
                            Locator::row(&catalog.name, &field.name, row_i + 1),
                            rule.message.clone(),
                        )
                        .with_observed_value(table.rows[row_i][idx].display()),
                    );
                }
            }
        }
        Ok(Value::Bool(false)) => {
            for row_i in 0..table.row_count() {
                findings.push(
                    Finding::new(
                        rule.severity,
                        Scope::Field,
                        Locator::row(&catalog.name, &field.name, row_i + 1),
                        rule.message.clone(),
                    )
                    .with_observed_value(table.rows[row_i][idx].display()),
                );
            }
        }
        Ok(Value::Bool(true)) => {}
        Ok(other) => findings.push(Finding::new(
            Severity::Error,
            Scope::Field,
            Locator::field(&catalog.name, &field.name),
            format!("field rule did not evaluate to a boolean, got {other:?}"),
        )),
        Err(e) => findings.push(expr_error_finding(Scope::Field, &catalog.name, &e)),
    }
}

/// Package scope: cross rules evaluated once every catalog has been
/// visited. A rule referencing a catalog whose own validation failed
/// with an ERROR is skipped, recorded as a single INFO Finding.
fn run_package_scope(
    package: &Package,
    tables: &HashMap<String, Table>,
    failed_catalogs: &HashSet<String>,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for rule in &package.cross_rules {
        let referenced = table_refs(&rule.validation_expression);
        if let Some(missing) = referenced.iter().find(|name| failed_catalogs.contains(*name)) {
            findings.push(Finding::new(
                Severity::Info,
                Scope::Package,
                Locator::catalog(missing),
                format!(
                    "cross rule '{}' skipped: prerequisite catalog '{missing}' failed validation",
                    rule.name
                ),
            ));
            continue;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| evaluate_cross_rule(rule, tables)));
        match result {
            Ok(Ok(outcome)) => findings.extend(outcome),
            Ok(Err(e)) => findings.push(Finding::new(
                Severity::Error,
                Scope::Package,
                Locator::default(),
                format!("cross rule '{}' failed to evaluate: {e}", rule.name),
            )),
            Err(_) => findings.push(internal_error(Scope::Package, &package.name)),
        }
    }

    findings
}

fn evaluate_cross_rule(rule: &CrossRule, tables: &HashMap<String, Table>) -> Result<Vec<Finding>, ExprError> {
    let referenced = table_refs(&rule.validation_expression);
    let primary_name = first_table_ref(&rule.validation_expression);
    let primary_table = primary_name
        .as_ref()
        .and_then(|name| tables.get(name))
        .or_else(|| referenced.iter().find_map(|name| tables.get(name)));

    let Some(primary_table) = primary_table else {
        return Ok(Vec::new());
    };

    let mut ctx = EvalContext::for_frame(primary_table);
    for name in &referenced {
        if let Some(table) = tables.get(name) {
            ctx = ctx.with_table(name.clone(), table);
        }
    }

    let value = expr::eval(&rule.validation_expression, &ctx)?;
    let locator_catalog = primary_name.unwrap_or_else(|| "package".to_owned());

    Ok(match value {
        Value::BoolVec(flags) => flags
            .into_iter()
            .enumerate()
            .filter_map(|(i, ok)| {
                if ok {
                    None
                } else {
                    Some(
                        Finding::new(
                            rule.severity,
                            Scope::Package,
                            Locator::row(&locator_catalog, &rule.name, i + 1),
                            rule.message.clone(),
                        )
                        .with_rule_name(&rule.name),
                    )
                }
            })
            .collect(),
        Value::Bool(false) => vec![Finding::new(
            rule.severity,
            Scope::Package,
            Locator::catalog(&locator_catalog),
            rule.message.clone(),
        )
        .with_rule_name(&rule.name)],
        Value::Bool(true) => Vec::new(),
        other => vec![Finding::new(
            Severity::Error,
            Scope::Package,
            Locator::catalog(&locator_catalog),
            format!("cross rule did not evaluate to a boolean, got {other:?}"),
        )],
    })
}

fn table_refs(expr: &Expr) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_refs(expr, &mut out);
    out
}

fn collect_refs(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::TableColumn { table, .. } => {
            out.insert(table.clone());
        }
        Expr::Unary(_, inner) => collect_refs(inner, out),
        Expr::Binary(_, lhs, rhs) => {
            collect_refs(lhs, out);
            collect_refs(rhs, out);
        }
        Expr::List(items) => items.iter().for_each(|i| collect_refs(i, out)),
        Expr::Predicate { receiver, predicate } => {
            collect_refs(receiver, out);
            match predicate {
                crate::expr::ColumnPredicate::IsIn(inner)
                | crate::expr::ColumnPredicate::StrContains(inner)
                | crate::expr::ColumnPredicate::StrMatch(inner) => collect_refs(inner, out),
                _ => {}
            }
        }
        Expr::Reduce { receiver, .. } => collect_refs(receiver, out),
        _ => {}
    }
}

/// First `df['table']` reference encountered in a pre-order walk —
/// identifies which table a cross rule's row-indexed Findings belong to.
fn first_table_ref(expr: &Expr) -> Option<String> {
    match expr {
        Expr::TableColumn { table, .. } => Some(table.clone()),
        Expr::Unary(_, inner) => first_table_ref(inner),
        Expr::Binary(_, lhs, rhs) => first_table_ref(lhs).or_else(|| first_table_ref(rhs)),
        Expr::List(items) => items.iter().find_map(first_table_ref),
        Expr::Predicate { receiver, predicate } => first_table_ref(receiver).or_else(|| match predicate {
            crate::expr::ColumnPredicate::IsIn(inner)
            | crate::expr::ColumnPredicate::StrContains(inner)
            | crate::expr::ColumnPredicate::StrMatch(inner) => first_table_ref(inner),
            _ => None,
        }),
        Expr::Reduce { receiver, .. } => first_table_ref(receiver),
        _ => None,
    }
}

fn expr_error_finding(scope: Scope, catalog: &str, e: &ExprError) -> Finding {
    Finding::new(Severity::Error, scope, Locator::catalog(catalog), e.to_string())
}

/// An internal evaluator panic is captured rather than propagated,
/// rendered as an ERROR Finding — the Validator must never raise out of
/// a validation pass.
fn internal_error(scope: Scope, catalog: &str) -> Finding {
    Finding::new(
        Severity::Error,
        scope,
        Locator::catalog(catalog),
        "internal evaluator error (panic) while validating this scope".to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CatalogRef, ConnectionConfig, Destination, FieldRule, InsertionMethod, RuleSeverity};

    fn catalog_with_required_unique() -> Catalog {
        Catalog {
            name: "productos".to_owned(),
            description: String::new(),
            fields: vec![FieldSpec {
                name: "codigo_producto".to_owned(),
                field_type: FieldType::Text,
                length: None,
                decimals: 0,
                required: true,
                unique: true,
                allowed_values: None,
                rules: Vec::new(),
            }],
            row_validation: None,
            catalog_validation: None,
            file_format: None,
        }
    }

    fn table_of(values: &[Option<&str>]) -> Table {
        Table {
            columns: vec!["codigo_producto".to_owned()],
            rows: values
                .iter()
                .map(|v| vec![v.map(|s| CellValue::Text(s.to_owned())).unwrap_or(CellValue::Null)])
                .collect(),
        }
    }

    #[test]
    fn scenario_1_required_and_unique_over_rows() {
        let catalog = catalog_with_required_unique();
        let table = table_of(&[Some("A"), Some("B"), Some("A"), None]);
        let (_, findings) = run_catalog_scopes(&catalog, &table);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].locator.row_index, Some(3));
        assert_eq!(findings[1].locator.row_index, Some(4));
        assert!(findings.iter().all(|f| f.severity == Severity::Error));
    }

    #[test]
    fn scenario_2_row_validation_catches_arithmetic_mismatch() {
        let catalog = Catalog {
            name: "ventas".to_owned(),
            description: String::new(),
            fields: vec![
                FieldSpec {
                    name: "total".to_owned(),
                    field_type: FieldType::Number,
                    length: None,
                    decimals: 0,
                    required: false,
                    unique: false,
                    allowed_values: None,
                    rules: Vec::new(),
                },
                FieldSpec {
                    name: "cantidad".to_owned(),
                    field_type: FieldType::Number,
                    length: None,
                    decimals: 0,
                    required: false,
                    unique: false,
                    allowed_values: None,
                    rules: Vec::new(),
                },
                FieldSpec {
                    name: "precio_unitario".to_owned(),
                    field_type: FieldType::Number,
                    length: None,
                    decimals: 0,
                    required: false,
                    unique: false,
                    allowed_values: None,
                    rules: Vec::new(),
                },
            ],
            row_validation: Some(crate::model::ScopedValidation {
                expression: expr::parse("total == cantidad * precio_unitario").unwrap(),
                message: "total must equal cantidad * precio_unitario".to_owned(),
                severity: RuleSeverity::Error,
            }),
            catalog_validation: None,
            file_format: None,
        };
        let table = Table {
            columns: vec!["total".into(), "cantidad".into(), "precio_unitario".into()],
            rows: vec![
                vec![CellValue::Text("20".into()), CellValue::Text("2".into()), CellValue::Text("10".into())],
                vec![CellValue::Text("16".into()), CellValue::Text("3".into()), CellValue::Text("5".into())],
            ],
        };
        let (_, findings) = run_catalog_scopes(&catalog, &table);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].locator.row_index, Some(2));
    }

    #[test]
    fn scenario_3_cross_rule_isin_across_catalogs() {
        let ventas = Catalog {
            name: "ventas".to_owned(),
            description: String::new(),
            fields: vec![FieldSpec {
                name: "customer_id".to_owned(),
                field_type: FieldType::Text,
                length: None,
                decimals: 0,
                required: false,
                unique: false,
                allowed_values: None,
                rules: Vec::new(),
            }],
            row_validation: None,
            catalog_validation: None,
            file_format: None,
        };
        let clientes = Catalog {
            name: "clientes".to_owned(),
            ..ventas.clone()
        };
        let schema = Schema {
            catalogs: vec![ventas, clientes],
            packages: Vec::new(),
            senders: Vec::new(),
        };
        let package = Package {
            name: "ventas_clientes".to_owned(),
            description: String::new(),
            mandatory: true,
            file_format: crate::model::FileFormat::default(),
            catalogs: vec![
                CatalogRef {
                    logical_name: "ventas".into(),
                    file_inside_archive: None,
                    catalog: crate::model::CatalogHandle(0),
                    file_format_override: None,
                },
                CatalogRef {
                    logical_name: "clientes".into(),
                    file_inside_archive: None,
                    catalog: crate::model::CatalogHandle(1),
                    file_format_override: None,
                },
            ],
            cross_rules: vec![CrossRule {
                name: "customer_exists".into(),
                validation_expression: expr::parse(
                    "df['ventas']['customer_id'].isin(df['clientes']['customer_id'])",
                )
                .unwrap(),
                severity: RuleSeverity::Error,
                message: "customer_id must exist in clientes".into(),
            }],
            destination: Destination {
                enabled: false,
                connection: ConnectionConfig::SecretRef("X".into()),
                target_table: "ventas".into(),
                pre_validation: None,
                insertion_method: InsertionMethod::Insert,
            },
        };
        let mut tables = HashMap::new();
        tables.insert(
            "ventas".to_owned(),
            Table {
                columns: vec!["customer_id".into()],
                rows: vec![vec![CellValue::Text("C1".into())], vec![CellValue::Text("C2".into())]],
            },
        );
        tables.insert(
            "clientes".to_owned(),
            Table {
                columns: vec!["customer_id".into()],
                rows: vec![vec![CellValue::Text("C1".into())]],
            },
        );

        let diagnostic = run(&schema, &package, &tables);
        let package_findings: Vec<_> = diagnostic.findings.iter().filter(|f| f.scope == Scope::Package).collect();
        assert_eq!(package_findings.len(), 1);
        assert_eq!(package_findings[0].locator.row_index, Some(2));
    }

    #[test]
    #[allow(unused_must_use)]
    fn unused_field_rule_import_is_exercised() {
        let _ = FieldRule {
            validation_expression: expr::parse("1 == 1").unwrap(),
            message: String::new(),
            severity: RuleSeverity::Error,
        };
    }

    #[test]
    fn field_scope_error_short_circuits_row_and_catalog_scopes_with_info_findings() {
        let catalog = Catalog {
            name: "productos".to_owned(),
            description: String::new(),
            fields: vec![FieldSpec {
                name: "codigo_producto".to_owned(),
                field_type: FieldType::Text,
                length: None,
                decimals: 0,
                required: true,
                unique: false,
                allowed_values: None,
                rules: Vec::new(),
            }],
            row_validation: Some(crate::model::ScopedValidation {
                expression: expr::parse("codigo_producto.notnull()").unwrap(),
                message: "should never evaluate".to_owned(),
                severity: RuleSeverity::Error,
            }),
            catalog_validation: Some(crate::model::ScopedValidation {
                expression: expr::parse("shape[0] > 0").unwrap(),
                message: "should never evaluate".to_owned(),
                severity: RuleSeverity::Error,
            }),
            file_format: None,
        };
        let table = table_of(&[Some("A"), None]);

        let (_, findings) = run_catalog_scopes(&catalog, &table);

        assert_eq!(findings.iter().filter(|f| f.severity == Severity::Error).count(), 1);
        let skips: Vec<_> = findings.iter().filter(|f| f.severity == Severity::Info).collect();
        assert_eq!(skips.len(), 2);
        assert!(skips[0].message.starts_with("row scope skipped"));
        assert!(skips[1].message.starts_with("catalog scope skipped"));
    }
}
