use thiserror::Error;

/// Canonical error taxonomy used across udflare crates.
///
/// Classification guidance:
/// - [`UdflareError::InvalidTypeSyntax`] / [`UdflareError::UnsupportedType`] /
///   [`UdflareError::InvalidDecimalSpec`]: type descriptor text rejected by the translator
/// - [`UdflareError::InvalidConfig`]: registration/config contract violations
/// - [`UdflareError::DuplicateFunction`] / [`UdflareError::FunctionNotFound`]: registry state
/// - [`UdflareError::Serialization`]: value marshalling failures between columns and native values
/// - [`UdflareError::Evaluation`]: user function failures during batch evaluation
///
/// Registration-time errors (type/config/registry) are synchronous and keep the
/// function unreachable. Evaluation-time errors abort only the current batch.
#[derive(Debug, Error)]
pub enum UdflareError {
    /// Malformed type descriptor text.
    ///
    /// Examples:
    /// - unbalanced parentheses in a compound form
    /// - wrong argument count for `MAP(K, V)` / `DECIMAL(p, s)`
    /// - empty argument in `TUPLE(...)`
    #[error("invalid type syntax: {0}")]
    InvalidTypeSyntax(String),

    /// Syntactically plausible keyword the translator does not know.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Decimal precision/scale outside `1..=76` / `0..=precision`.
    #[error("invalid decimal spec: {0}")]
    InvalidDecimalSpec(String),

    /// Invalid or inconsistent registration configuration.
    ///
    /// Examples:
    /// - `skip_null` requested for a non-nullable output type
    /// - argument name count not matching argument type count
    /// - row worker pool failed to build
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A function with this name is already registered.
    #[error("function already exists: {0}")]
    DuplicateFunction(String),

    /// No function with this name is registered.
    #[error("function does not exist: {0}")]
    FunctionNotFound(String),

    /// Value marshalling failure between columnar and native representations.
    ///
    /// Examples:
    /// - malformed variant payload (invalid JSON bytes)
    /// - a native value whose kind does not match the compiled codec
    /// - column construction rejected by arrow
    #[error("serialization error: {0}")]
    Serialization(String),

    /// User function failure during batch evaluation, annotated with the
    /// function name and the offending row index where known.
    #[error("evaluation of function `{}` failed{}: {}", .function, row_suffix(.row), .message)]
    Evaluation {
        /// Registered function name.
        function: String,
        /// Row index within the batch, when the failure is row-scoped.
        row: Option<usize>,
        /// Underlying failure description.
        message: String,
    },

    /// Transport boundary failure surfaced by the server crate.
    #[error("transport error: {0}")]
    Transport(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl UdflareError {
    /// Failure raised inside a user function body. The engine fills in the
    /// function name and row index when it surfaces the error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        UdflareError::Evaluation {
            function: String::new(),
            row: None,
            message: message.into(),
        }
    }
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" at row {r}"),
        None => String::new(),
    }
}

/// Standard udflare result alias.
pub type Result<T> = std::result::Result<T, UdflareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_error_mentions_function_and_row() {
        let err = UdflareError::Evaluation {
            function: "gcd".to_string(),
            row: Some(7),
            message: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "evaluation of function `gcd` failed at row 7: boom"
        );

        let err = UdflareError::Evaluation {
            function: "gcd".to_string(),
            row: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "evaluation of function `gcd` failed: boom");
    }
}
