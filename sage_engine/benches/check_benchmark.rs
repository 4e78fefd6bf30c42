//! Criterion benchmarks for the Validator, run over synthetic catalogs
//! of varying row counts.

use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sage_engine::model::{Catalog, CellValue, FieldSpec, FieldType, Package, Schema, Table};

fn synthetic_catalog() -> Catalog {
    Catalog {
        name: "ventas".to_owned(),
        description: String::new(),
        fields: vec![
            FieldSpec {
                name: "customer_id".to_owned(),
                field_type: FieldType::Text,
                length: None,
                decimals: 0,
                required: true,
                unique: false,
                allowed_values: None,
                rules: Vec::new(),
            },
            FieldSpec {
                name: "total".to_owned(),
                field_type: FieldType::Number,
                length: None,
                decimals: 2,
                required: true,
                unique: false,
                allowed_values: None,
                rules: Vec::new(),
            },
        ],
        row_validation: Some(sage_engine::model::ScopedValidation {
            expression: sage_engine::expr::parse("total > 0").unwrap(),
            message: "total must be positive".to_owned(),
            severity: sage_engine::finding::Severity::Error,
        }),
        catalog_validation: None,
        file_format: None,
    }
}

fn synthetic_table(row_count: usize) -> Table {
    let columns = vec!["customer_id".to_owned(), "total".to_owned()];
    let rows = (0..row_count)
        .map(|i| {
            vec![
                CellValue::Text(format!("C{i}")),
                CellValue::Number(10.0 + (i % 50) as f64),
            ]
        })
        .collect();
    Table { columns, rows }
}

fn bench_validator_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator_run");
    for row_count in [100usize, 1_000, 10_000] {
        let catalog = synthetic_catalog();
        let catalog_handle = sage_engine::model::CatalogHandle(0);
        let package = Package {
            name: "ventas_pkg".to_owned(),
            description: String::new(),
            mandatory: true,
            file_format: sage_engine::model::FileFormat::default(),
            catalogs: vec![sage_engine::model::CatalogRef {
                logical_name: "ventas".to_owned(),
                file_inside_archive: None,
                catalog: catalog_handle,
                file_format_override: None,
            }],
            cross_rules: Vec::new(),
            destination: sage_engine::model::Destination {
                enabled: false,
                connection: sage_engine::model::ConnectionConfig::SecretRef("X".to_owned()),
                target_table: "ventas".to_owned(),
                pre_validation: None,
                insertion_method: sage_engine::model::InsertionMethod::Insert,
            },
        };
        let schema = Schema {
            catalogs: vec![catalog],
            packages: vec![package.clone()],
            senders: Vec::new(),
        };
        let mut tables = HashMap::new();
        tables.insert("ventas".to_owned(), synthetic_table(row_count));

        group.bench_with_input(BenchmarkId::from_parameter(row_count), &row_count, |b, _| {
            b.iter(|| sage_engine::validator::run(std::hint::black_box(&schema), std::hint::black_box(&package), std::hint::black_box(&tables)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validator_run);
criterion_main!(benches);
