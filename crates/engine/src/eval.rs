//! Batch evaluation: decode columns, invoke under the configured execution
//! mode, encode the single output column.

use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use udflare_common::{Result, UdflareError};

use crate::function::{FunctionImpl, ScalarFunction};
use crate::value::Value;

/// Evaluate one inbound batch against a registered function, producing the
/// single-column output batch with the same row count and order.
///
/// The first failing row aborts the whole batch; no partial output is
/// produced. Concurrent evaluation waits for every row of the batch before
/// returning, so batches of one session never overlap in flight.
pub fn evaluate_batch(function: &ScalarFunction, batch: &RecordBatch) -> Result<RecordBatch> {
    let arity = function.decoders().len();
    if batch.num_columns() != arity {
        return Err(UdflareError::Evaluation {
            function: function.name().to_string(),
            row: None,
            message: format!(
                "expected {arity} input columns, got {}",
                batch.num_columns()
            ),
        });
    }

    let columns = function
        .decoders()
        .iter()
        .zip(batch.columns())
        .map(|(decode, column)| decode(column).map_err(|e| annotate(function, None, e)))
        .collect::<Result<Vec<_>>>()?;
    let num_rows = batch.num_rows();

    let result = match function.implementation() {
        FunctionImpl::BatchWise(f) => {
            // No null skipping here: a batch-wise callable registered with
            // skip_null owns its null handling.
            let out = f(&columns).map_err(|e| annotate(function, None, e))?;
            if out.len() != num_rows {
                return Err(UdflareError::Evaluation {
                    function: function.name().to_string(),
                    row: None,
                    message: format!(
                        "batch callable returned {} rows for a {num_rows} row batch",
                        out.len()
                    ),
                });
            }
            out
        }
        FunctionImpl::RowWise(f) => {
            // A None slot marks a row forced to null by skip_null; such rows
            // are never handed to the callable.
            let rows: Vec<Option<Vec<Value>>> = (0..num_rows)
                .map(|i| {
                    let args: Vec<Value> = columns.iter().map(|c| c[i].clone()).collect();
                    if function.skip_null() && args.iter().any(Value::is_null) {
                        None
                    } else {
                        Some(args)
                    }
                })
                .collect();
            match function.row_pool() {
                Some(pool) => pool.install(|| {
                    rows.into_par_iter()
                        .enumerate()
                        .map(|(i, args)| match args {
                            None => Ok(Value::Null),
                            Some(args) => f(&args).map_err(|e| annotate(function, Some(i), e)),
                        })
                        .collect::<Result<Vec<_>>>()
                })?,
                None => rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, args)| match args {
                        None => Ok(Value::Null),
                        Some(args) => f(&args).map_err(|e| annotate(function, Some(i), e)),
                    })
                    .collect::<Result<Vec<_>>>()?,
            }
        }
    };

    let output = (function.encoder())(result).map_err(|e| annotate(function, None, e))?;
    RecordBatch::try_new(function.output_schema(), vec![output]).map_err(|e| {
        annotate(
            function,
            None,
            UdflareError::Serialization(format!("output batch build failed: {e}")),
        )
    })
}

fn annotate(function: &ScalarFunction, row: Option<usize>, source: UdflareError) -> UdflareError {
    match source {
        UdflareError::Evaluation {
            function: source_function,
            row: source_row,
            message,
        } => UdflareError::Evaluation {
            function: if source_function.is_empty() {
                function.name().to_string()
            } else {
                source_function
            },
            row: source_row.or(row),
            message,
        },
        err => UdflareError::Evaluation {
            function: function.name().to_string(),
            row,
            message: err.to_string(),
        },
    }
}
