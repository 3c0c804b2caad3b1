//! Registered scalar function: schemas, compiled codecs, execution flags.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use rayon::{ThreadPool, ThreadPoolBuilder};
use udflare_common::{Result, UdflareError};
use udflare_types::{build_input_schema, build_output_schema, format, parse, TypeDescriptor};

use crate::codec::{compile_decoder, compile_encoder, ColumnDecodeFn, ColumnEncodeFn};
use crate::value::Value;

/// Per-row user callable: one decoded argument per input field.
pub type RowFunction = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;
/// Whole-batch user callable: full decoded columns in, one result column out.
pub type BatchFunction = dyn Fn(&[Vec<Value>]) -> Result<Vec<Value>> + Send + Sync;

/// User logic behind a registered function. The variant doubles as the
/// `batch_mode` execution flag.
#[derive(Clone)]
pub enum FunctionImpl {
    RowWise(Arc<RowFunction>),
    BatchWise(Arc<BatchFunction>),
}

impl FunctionImpl {
    pub fn row<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        FunctionImpl::RowWise(Arc::new(f))
    }

    pub fn batch<F>(f: F) -> Self
    where
        F: Fn(&[Vec<Value>]) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        FunctionImpl::BatchWise(Arc::new(f))
    }
}

/// Registration-time options.
///
/// `skip_null` forces a null result for any row with a null argument without
/// invoking the callable, and requires a nullable output type. In batch mode
/// the engine performs no null skipping: a batch-wise callable registered
/// with `skip_null` must implement its own null handling.
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    /// Positional argument names; defaults to `arg0..argN`.
    pub arg_names: Option<Vec<String>>,
    /// Dedicated row worker count; `None` or values below 2 mean the
    /// function evaluates rows sequentially on the calling thread.
    pub io_threads: Option<usize>,
    pub skip_null: bool,
}

impl FunctionOptions {
    pub fn with_arg_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_io_threads(mut self, io_threads: usize) -> Self {
        self.io_threads = Some(io_threads);
        self
    }

    pub fn with_skip_null(mut self, skip_null: bool) -> Self {
        self.skip_null = skip_null;
        self
    }
}

/// An immutable registered function: name, schemas, compiled codecs, and
/// execution flags. Built once at registration, shared read-only afterwards.
pub struct ScalarFunction {
    name: String,
    input_descriptors: Vec<TypeDescriptor>,
    output_descriptor: TypeDescriptor,
    input_schema: SchemaRef,
    output_schema: SchemaRef,
    decoders: Vec<ColumnDecodeFn>,
    encoder: ColumnEncodeFn,
    implementation: FunctionImpl,
    skip_null: bool,
    io_threads: usize,
    row_pool: Option<Arc<ThreadPool>>,
}

impl ScalarFunction {
    /// Parse the declared types, build both schemas, compile the codecs and
    /// (for `io_threads > 1`) the dedicated row worker pool.
    pub fn try_new(
        name: impl Into<String>,
        input_types: &[&str],
        result_type: &str,
        implementation: FunctionImpl,
        options: FunctionOptions,
    ) -> Result<Self> {
        let name = name.into();
        let input_descriptors = input_types
            .iter()
            .map(|t| parse(t))
            .collect::<Result<Vec<_>>>()?;
        let output_descriptor = parse(result_type)?;

        let arg_names = match options.arg_names {
            Some(names) => names,
            None => (0..input_descriptors.len())
                .map(|i| format!("arg{i}"))
                .collect(),
        };
        let input_schema = Arc::new(build_input_schema(&arg_names, &input_descriptors)?);
        let output_schema = Arc::new(build_output_schema(&output_descriptor));

        if options.skip_null && !output_descriptor.nullable {
            return Err(UdflareError::InvalidConfig(format!(
                "return type of function {name} must be nullable when skip_null is set"
            )));
        }

        let decoders = input_descriptors
            .iter()
            .map(compile_decoder)
            .collect::<Result<Vec<_>>>()?;
        let encoder = compile_encoder(&output_descriptor)?;

        let io_threads = options.io_threads.unwrap_or(1);
        let row_pool = if io_threads > 1 {
            let pool_name = name.clone();
            let pool = ThreadPoolBuilder::new()
                .num_threads(io_threads)
                .thread_name(move |i| format!("udf-{pool_name}-{i}"))
                .build()
                .map_err(|e| {
                    UdflareError::InvalidConfig(format!(
                        "failed to build row worker pool for {name}: {e}"
                    ))
                })?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            name,
            input_descriptors,
            output_descriptor,
            input_schema,
            output_schema,
            decoders,
            encoder,
            implementation,
            skip_null: options.skip_null,
            io_threads,
            row_pool,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_descriptors(&self) -> &[TypeDescriptor] {
        &self.input_descriptors
    }

    pub fn output_descriptor(&self) -> &TypeDescriptor {
        &self.output_descriptor
    }

    pub fn input_schema(&self) -> SchemaRef {
        Arc::clone(&self.input_schema)
    }

    pub fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }

    /// Concatenation of input and output schemas, advertised for
    /// client-side validation of exchange streams.
    pub fn exchange_schema(&self) -> SchemaRef {
        let fields = self
            .input_schema
            .fields()
            .iter()
            .chain(self.output_schema.fields().iter())
            .cloned()
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }

    pub(crate) fn decoders(&self) -> &[ColumnDecodeFn] {
        &self.decoders
    }

    pub(crate) fn encoder(&self) -> &ColumnEncodeFn {
        &self.encoder
    }

    pub(crate) fn implementation(&self) -> &FunctionImpl {
        &self.implementation
    }

    pub fn skip_null(&self) -> bool {
        self.skip_null
    }

    pub fn batch_mode(&self) -> bool {
        matches!(self.implementation, FunctionImpl::BatchWise(_))
    }

    pub fn io_threads(&self) -> usize {
        self.io_threads
    }

    pub(crate) fn row_pool(&self) -> Option<&Arc<ThreadPool>> {
        self.row_pool.as_ref()
    }

    /// Canonical advertised signature, `name(T1, T2) -> R`.
    pub fn signature(&self) -> String {
        let inputs = self
            .input_descriptors
            .iter()
            .map(format)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({inputs}) -> {}", self.name, format(&self.output_descriptor))
    }

    /// The `CREATE FUNCTION` statement the catalog needs to reach this
    /// function at `location`.
    pub fn create_function_sql(&self, location: &str) -> String {
        let inputs = self
            .input_descriptors
            .iter()
            .map(format)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE FUNCTION {name} ({inputs}) RETURNS {output} LANGUAGE native \
             HANDLER = '{name}' ADDRESS = 'http://{location}';",
            name = self.name,
            output = format(&self.output_descriptor),
        )
    }
}

impl fmt::Debug for ScalarFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarFunction")
            .field("name", &self.name)
            .field("signature", &self.signature())
            .field("skip_null", &self.skip_null)
            .field("batch_mode", &self.batch_mode())
            .field("io_threads", &self.io_threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FunctionImpl {
        FunctionImpl::row(|args| Ok(args[0].clone()))
    }

    #[test]
    fn skip_null_requires_nullable_output() {
        let err = ScalarFunction::try_new(
            "f",
            &["INT"],
            "INT NOT NULL",
            identity(),
            FunctionOptions::default().with_skip_null(true),
        )
        .expect_err("skip_null with non-nullable output");
        assert!(matches!(err, UdflareError::InvalidConfig(_)));

        ScalarFunction::try_new(
            "f",
            &["INT"],
            "INT",
            identity(),
            FunctionOptions::default().with_skip_null(true),
        )
        .expect("nullable output accepts skip_null");
    }

    #[test]
    fn argument_names_default_to_positions() {
        let f = ScalarFunction::try_new(
            "f",
            &["INT", "VARCHAR"],
            "INT",
            identity(),
            FunctionOptions::default(),
        )
        .expect("function");
        let schema = f.input_schema();
        assert_eq!(schema.field(0).name(), "arg0");
        assert_eq!(schema.field(1).name(), "arg1");

        let err = ScalarFunction::try_new(
            "f",
            &["INT", "VARCHAR"],
            "INT",
            identity(),
            FunctionOptions::default().with_arg_names(["x"]),
        )
        .expect_err("arity mismatch");
        assert!(matches!(err, UdflareError::InvalidConfig(_)));
    }

    #[test]
    fn signature_uses_canonical_type_text() {
        let f = ScalarFunction::try_new(
            "gcd",
            &["int not null", "INT NOT NULL"],
            "NULLABLE(INT)",
            identity(),
            FunctionOptions::default(),
        )
        .expect("function");
        assert_eq!(f.signature(), "gcd(INT NOT NULL, INT NOT NULL) -> INT");
        assert!(f
            .create_function_sql("0.0.0.0:8815")
            .starts_with("CREATE FUNCTION gcd (INT NOT NULL, INT NOT NULL) RETURNS INT"));
    }

    #[test]
    fn io_threads_build_a_dedicated_pool() {
        let f = ScalarFunction::try_new(
            "f",
            &["INT"],
            "INT",
            identity(),
            FunctionOptions::default().with_io_threads(4),
        )
        .expect("function");
        assert_eq!(f.io_threads(), 4);
        assert!(f.row_pool().is_some());

        let sequential = ScalarFunction::try_new(
            "g",
            &["INT"],
            "INT",
            identity(),
            FunctionOptions::default(),
        )
        .expect("function");
        assert!(sequential.row_pool().is_none());
    }
}
