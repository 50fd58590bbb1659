use criterion::{criterion_group, criterion_main, Criterion};

use query_filter::{ColumnBinding, ColumnMeta, DataType, Expr, FilterInfo, FilterOptions, Literal, Operator, ScalarValue};
use query_filter::executor::BoundColumns;

fn build_predicate() -> Expr {
    let ts = ColumnMeta {
        col_id: 0,
        name: "ts".to_string(),
        data_type: DataType::Timestamp,
    };
    let region = ColumnMeta {
        col_id: 1,
        name: "region".to_string(),
        data_type: DataType::Binary,
    };

    let window = Expr::and(
        Expr::compare(Operator::Ge, ts.clone(), Literal::Scalar(ScalarValue::Timestamp(0))),
        Expr::compare(Operator::Le, ts, Literal::Scalar(ScalarValue::Timestamp(1_000_000))),
    );
    let region_eq = Expr::compare(
        Operator::Eq,
        region,
        Literal::Scalar(ScalarValue::Bytes(b"west".to_vec())),
    );

    Expr::and(window, region_eq)
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("filter_build", |b| {
        b.iter(|| FilterInfo::build(&build_predicate(), FilterOptions::default()).unwrap())
    });
}

fn bench_execute(c: &mut Criterion) {
    let expr = build_predicate();
    let filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();

    let ts_id = query_filter::field::ColumnId(
        filter
            .fields()
            .columns()
            .iter()
            .position(|c| c.name == "ts")
            .unwrap() as u32,
    );
    let region_id = query_filter::field::ColumnId(
        filter
            .fields()
            .columns()
            .iter()
            .position(|c| c.name == "region")
            .unwrap() as u32,
    );

    let n = 10_000;
    let mut data = BoundColumns::new();
    data.bind(
        ts_id,
        ColumnBinding::from_values((0..n).map(|i| Some(ScalarValue::Timestamp(i as i64 * 100))).collect()),
    );
    data.bind(
        region_id,
        ColumnBinding::from_values(
            (0..n)
                .map(|i| {
                    Some(ScalarValue::Bytes(
                        if i % 2 == 0 { b"west".to_vec() } else { b"east".to_vec() },
                    ))
                })
                .collect(),
        ),
    );

    c.bench_function("filter_execute_10k_rows", |b| {
        b.iter(|| filter.execute(&data))
    });
}

criterion_group!(benches, bench_build, bench_execute);
criterion_main!(benches);
