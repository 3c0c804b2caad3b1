use std::sync::Arc;

use arrow::array::{Array, Int32Array, Int64Array, LargeBinaryArray};
use arrow::record_batch::RecordBatch;
use udflare_common::UdflareError;
use udflare_engine::{
    evaluate_batch, FunctionImpl, FunctionOptions, FunctionRegistry, ScalarFunction, Value,
};

fn gcd(mut x: i32, mut y: i32) -> i32 {
    while y != 0 {
        (x, y) = (y, x % y);
    }
    x
}

fn gcd_row() -> FunctionImpl {
    FunctionImpl::row(|args| match (&args[0], &args[1]) {
        (Value::Int32(x), Value::Int32(y)) => Ok(Value::Int32(gcd(*x, *y))),
        _ => Err(UdflareError::evaluation("gcd expects INT arguments")),
    })
}

fn int_pair_batch(function: &ScalarFunction, x: Vec<Option<i32>>, y: Vec<Option<i32>>) -> RecordBatch {
    RecordBatch::try_new(
        function.input_schema(),
        vec![
            Arc::new(Int32Array::from(x)),
            Arc::new(Int32Array::from(y)),
        ],
    )
    .expect("input batch")
}

fn output_i32(batch: &RecordBatch) -> &Int32Array {
    batch
        .column(0)
        .as_any()
        .downcast_ref::<Int32Array>()
        .expect("int output")
}

#[test]
fn batch_mode_matches_sequential_output() {
    let sequential = ScalarFunction::try_new(
        "gcd_seq",
        &["INT", "INT"],
        "INT",
        gcd_row(),
        FunctionOptions::default(),
    )
    .expect("sequential gcd");

    let batched = ScalarFunction::try_new(
        "gcd_batch",
        &["INT", "INT"],
        "INT",
        FunctionImpl::batch(|columns| {
            columns[0]
                .iter()
                .zip(&columns[1])
                .map(|(x, y)| match (x, y) {
                    (Value::Int32(x), Value::Int32(y)) => Ok(Value::Int32(gcd(*x, *y))),
                    _ => Err(UdflareError::evaluation("gcd expects INT arguments")),
                })
                .collect()
        }),
        FunctionOptions::default(),
    )
    .expect("batched gcd");
    assert!(batched.batch_mode());

    let x = vec![Some(1), Some(2), Some(3)];
    let y = vec![Some(3), Some(2), Some(1)];
    let out_seq = evaluate_batch(&sequential, &int_pair_batch(&sequential, x.clone(), y.clone()))
        .expect("sequential eval");
    let out_batch =
        evaluate_batch(&batched, &int_pair_batch(&batched, x, y)).expect("batched eval");

    assert_eq!(output_i32(&out_seq), output_i32(&out_batch));
    assert_eq!(output_i32(&out_seq).values().as_ref(), &[1, 2, 1]);
}

#[test]
fn skip_null_forces_null_rows_without_invoking() {
    let function = ScalarFunction::try_new(
        "gcd",
        &["INT", "INT"],
        "INT",
        FunctionImpl::row(|args| match (&args[0], &args[1]) {
            (Value::Int32(x), Value::Int32(y)) => Ok(Value::Int32(gcd(*x, *y))),
            // a null argument reaching the callable is a bug under skip_null
            _ => Err(UdflareError::evaluation("unexpected null argument")),
        }),
        FunctionOptions::default().with_skip_null(true),
    )
    .expect("gcd");

    let batch = int_pair_batch(
        &function,
        vec![Some(4), None, Some(9)],
        vec![Some(6), Some(2), Some(6)],
    );
    let out = evaluate_batch(&function, &batch).expect("eval");
    let out = output_i32(&out);
    assert_eq!(out.len(), 3);
    assert_eq!(out.value(0), 2);
    assert!(out.is_null(1));
    assert_eq!(out.value(2), 3);
}

#[test]
fn concurrent_output_is_identical_to_sequential() {
    let concurrent = ScalarFunction::try_new(
        "gcd_pool",
        &["INT", "INT"],
        "INT",
        gcd_row(),
        FunctionOptions::default().with_io_threads(8),
    )
    .expect("concurrent gcd");
    let sequential = ScalarFunction::try_new(
        "gcd_seq",
        &["INT", "INT"],
        "INT",
        gcd_row(),
        FunctionOptions::default(),
    )
    .expect("sequential gcd");

    let x: Vec<Option<i32>> = (0..1000).map(|i| Some(i * 7 + 3)).collect();
    let y: Vec<Option<i32>> = (0..1000).map(|i| Some(1000 - i)).collect();

    let out_concurrent = evaluate_batch(
        &concurrent,
        &int_pair_batch(&concurrent, x.clone(), y.clone()),
    )
    .expect("concurrent eval");
    let out_sequential =
        evaluate_batch(&sequential, &int_pair_batch(&sequential, x, y)).expect("sequential eval");

    assert_eq!(output_i32(&out_concurrent), output_i32(&out_sequential));
}

#[test]
fn row_failure_aborts_the_batch_with_row_index() {
    let function = ScalarFunction::try_new(
        "checked_div",
        &["INT", "INT"],
        "INT",
        FunctionImpl::row(|args| match (&args[0], &args[1]) {
            (Value::Int32(_), Value::Int32(0)) => {
                Err(UdflareError::evaluation("division by zero"))
            }
            (Value::Int32(x), Value::Int32(y)) => Ok(Value::Int32(x / y)),
            _ => Err(UdflareError::evaluation("checked_div expects INT arguments")),
        }),
        FunctionOptions::default(),
    )
    .expect("checked_div");

    let batch = int_pair_batch(
        &function,
        vec![Some(8), Some(9), Some(10)],
        vec![Some(2), Some(0), Some(5)],
    );
    let err = evaluate_batch(&function, &batch).expect_err("row 1 fails");
    let UdflareError::Evaluation { function, row, message } = err else {
        panic!("expected evaluation error");
    };
    assert_eq!(function, "checked_div");
    assert_eq!(row, Some(1));
    assert!(message.contains("division by zero"));
}

#[test]
fn variant_output_round_trips_nested_binary_values() {
    let function = ScalarFunction::try_new(
        "tag_payload",
        &["VARCHAR", "BINARY"],
        "VARIANT",
        FunctionImpl::row(|args| {
            Ok(Value::Map(vec![
                (Value::Text("name".to_string()), args[0].clone()),
                (
                    Value::Text("payload".to_string()),
                    Value::List(vec![args[1].clone()]),
                ),
            ]))
        }),
        FunctionOptions::default(),
    )
    .expect("tag_payload");

    let batch = RecordBatch::try_new(
        function.input_schema(),
        vec![
            Arc::new(
                vec![Some("a".to_string())]
                    .into_iter()
                    .collect::<arrow::array::LargeStringArray>(),
            ),
            Arc::new(LargeBinaryArray::from_iter(vec![Some(b"blob".to_vec())])),
        ],
    )
    .expect("input batch");

    let out = evaluate_batch(&function, &batch).expect("eval");
    let column = out
        .column(0)
        .as_any()
        .downcast_ref::<LargeBinaryArray>()
        .expect("variant output");
    let text = std::str::from_utf8(column.value(0)).expect("valid utf8");
    assert_eq!(text, r#"{"name":"a","payload":["blob"]}"#);
}

#[test]
fn registry_lookup_drives_evaluation() {
    let registry = FunctionRegistry::new();
    registry
        .register(
            ScalarFunction::try_new(
                "sum64",
                &["BIGINT", "BIGINT"],
                "BIGINT",
                FunctionImpl::row(|args| match (&args[0], &args[1]) {
                    (Value::Int64(x), Value::Int64(y)) => Ok(Value::Int64(x + y)),
                    _ => Err(UdflareError::evaluation("sum64 expects BIGINT arguments")),
                }),
                FunctionOptions::default().with_arg_names(["x", "y"]),
            )
            .expect("sum64"),
        )
        .expect("register");

    let function = registry.lookup("sum64").expect("lookup");
    assert_eq!(function.input_schema().field(0).name(), "x");

    let batch = RecordBatch::try_new(
        function.input_schema(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Int64Array::from(vec![10, 20])),
        ],
    )
    .expect("input batch");
    let out = evaluate_batch(&function, &batch).expect("eval");
    let out = out
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("int64 output");
    assert_eq!(out.values().as_ref(), &[11, 22]);
}
