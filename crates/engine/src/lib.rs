//! Batch evaluation core for the udflare server.
//!
//! Architecture role:
//! - dynamic [`Value`] model exchanged with user functions
//! - compile-once decode/encode codecs per type descriptor
//! - batch evaluation under batch/concurrent/sequential execution modes
//! - function registry with advertised signatures
//!
//! Key modules:
//! - [`value`]
//! - [`codec`]
//! - [`function`]
//! - [`eval`]
//! - [`registry`]

pub mod codec;
pub mod eval;
pub mod function;
pub mod registry;
pub mod value;

pub use codec::{compile_decoder, compile_encoder, ColumnDecodeFn, ColumnEncodeFn};
pub use eval::evaluate_batch;
pub use function::{
    BatchFunction, FunctionImpl, FunctionOptions, RowFunction, ScalarFunction,
};
pub use registry::FunctionRegistry;
pub use value::Value;
