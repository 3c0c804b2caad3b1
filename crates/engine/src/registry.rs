//! Function registry: name uniqueness, lookup, advertised signatures.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arrow::datatypes::SchemaRef;
use tracing::info;
use udflare_common::{Result, UdflareError};

use crate::function::ScalarFunction;

/// Owns all registered functions for the server's lifetime.
///
/// The lock guards only the name map; specs are immutable behind `Arc` and
/// shared read-only with every in-flight session.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<ScalarFunction>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, failing if the name is already taken.
    pub fn register(&self, function: ScalarFunction) -> Result<Arc<ScalarFunction>> {
        let function = Arc::new(function);
        let mut functions = self
            .functions
            .write()
            .expect("function registry lock poisoned");
        if functions.contains_key(function.name()) {
            return Err(UdflareError::DuplicateFunction(function.name().to_string()));
        }
        info!(
            function = function.name(),
            signature = %function.signature(),
            "registered function"
        );
        functions.insert(function.name().to_string(), Arc::clone(&function));
        Ok(function)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<ScalarFunction>> {
        self.functions
            .read()
            .expect("function registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| UdflareError::FunctionNotFound(name.to_string()))
    }

    /// Canonical advertised signature for `name`.
    pub fn signature(&self, name: &str) -> Result<String> {
        Ok(self.lookup(name)?.signature())
    }

    /// Concatenated input and output schema for `name`, the discovery
    /// contract clients validate exchange streams against.
    pub fn exchange_schema(&self, name: &str) -> Result<SchemaRef> {
        Ok(self.lookup(name)?.exchange_schema())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .functions
            .read()
            .expect("function registry lock poisoned")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionImpl, FunctionOptions};

    fn gcd() -> ScalarFunction {
        ScalarFunction::try_new(
            "gcd",
            &["INT", "INT"],
            "INT",
            FunctionImpl::row(|args| Ok(args[0].clone())),
            FunctionOptions::default(),
        )
        .expect("gcd")
    }

    #[test]
    fn rejects_duplicate_names() {
        let registry = FunctionRegistry::new();
        registry.register(gcd()).expect("first registration");
        let err = registry.register(gcd()).expect_err("duplicate");
        assert!(matches!(err, UdflareError::DuplicateFunction(_)));
    }

    #[test]
    fn lookup_missing_name_fails() {
        let registry = FunctionRegistry::new();
        let err = registry.lookup("nope").expect_err("missing");
        assert!(matches!(err, UdflareError::FunctionNotFound(_)));
    }

    #[test]
    fn advertises_signatures() {
        let registry = FunctionRegistry::new();
        registry.register(gcd()).expect("register");
        assert_eq!(
            registry.signature("gcd").expect("signature"),
            "gcd(INT, INT) -> INT"
        );
        assert_eq!(registry.names(), vec!["gcd".to_string()]);
    }
}
