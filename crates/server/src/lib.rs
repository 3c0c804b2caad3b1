//! Exchange boundary for the udflare UDF server.
//!
//! Architecture role:
//! - schema-carrying batch streams and per-session channels
//! - exchange handler driving the evaluation engine per inbound batch
//! - flight transport glue (feature `flight`, on by default)
//!
//! Key modules:
//! - [`stream`]
//! - [`exchange`]
//! - `flight` (feature-gated)

pub mod exchange;
#[cfg(feature = "flight")]
pub mod flight;
pub mod stream;

pub use exchange::ExchangeService;
pub use stream::{
    session_channel, BatchSender, BatchStream, BatchStreamAdapter, SendableBatchStream,
};

use std::sync::Arc;

use tracing::info;
#[cfg(feature = "flight")]
use udflare_common::UdflareError;
use udflare_common::{Result, ServerConfig};
use udflare_engine::{FunctionRegistry, ScalarFunction};

/// A server that exposes registered scalar functions to a remote SQL engine.
///
/// ```no_run
/// use udflare_engine::{FunctionImpl, FunctionOptions, ScalarFunction, Value};
/// use udflare_server::UdfServer;
///
/// # async fn run() -> udflare_common::Result<()> {
/// let server = UdfServer::new("0.0.0.0:8815");
/// server.add_function(ScalarFunction::try_new(
///     "add32",
///     &["INT", "INT"],
///     "INT",
///     FunctionImpl::row(|args| match (&args[0], &args[1]) {
///         (Value::Int32(x), Value::Int32(y)) => Ok(Value::Int32(x + y)),
///         _ => Ok(Value::Null),
///     }),
///     FunctionOptions::default().with_arg_names(["x", "y"]),
/// )?)?;
/// server.serve().await?;
/// # Ok(())
/// # }
/// ```
pub struct UdfServer {
    config: ServerConfig,
    registry: Arc<FunctionRegistry>,
}

impl UdfServer {
    /// A server advertising itself at `location` (`host:port`).
    pub fn new(location: impl Into<String>) -> Self {
        Self::with_config(ServerConfig {
            bind: location.into(),
            ..ServerConfig::default()
        })
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(FunctionRegistry::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<FunctionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Register a function and log the `CREATE FUNCTION` statement that
    /// makes it reachable from the catalog.
    pub fn add_function(&self, function: ScalarFunction) -> Result<()> {
        let function = self.registry.register(function)?;
        info!(
            function = function.name(),
            "added function, SQL:\n{}",
            function.create_function_sql(&self.config.bind)
        );
        Ok(())
    }

    /// Build the exchange service backed by this server's registry.
    pub fn exchange_service(&self) -> ExchangeService {
        ExchangeService::new(Arc::clone(&self.registry), &self.config)
    }

    /// Serve the flight boundary until the process is stopped.
    #[cfg(feature = "flight")]
    pub async fn serve(&self) -> Result<()> {
        let addr: std::net::SocketAddr = self.config.bind.parse().map_err(|e| {
            UdflareError::InvalidConfig(format!(
                "invalid bind address `{}`: {e}",
                self.config.bind
            ))
        })?;
        let service = flight::UdfFlightService::new(Arc::new(self.exchange_service()));
        info!(bind = %self.config.bind, "listening");
        tonic::transport::Server::builder()
            .add_service(flight::FlightServiceServer::new(service))
            .serve(addr)
            .await
            .map_err(|e| UdflareError::Transport(format!("flight server failed: {e}")))
    }
}
