use std::env;

use tracing_subscriber::EnvFilter;
use udflare_common::{ServerConfig, UdflareError};
use udflare_engine::{FunctionImpl, FunctionOptions, ScalarFunction, Value};
use udflare_server::UdfServer;

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize_or_default(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Built-in demo function, enabled with `UDFLARE_DEMO_FUNCTIONS=1`.
fn register_demo_functions(server: &UdfServer) -> udflare_common::Result<()> {
    server.add_function(ScalarFunction::try_new(
        "gcd",
        &["INT", "INT"],
        "INT",
        FunctionImpl::row(|args| match (&args[0], &args[1]) {
            (Value::Int32(x), Value::Int32(y)) => {
                let (mut x, mut y) = (*x, *y);
                while y != 0 {
                    (x, y) = (y, x % y);
                }
                Ok(Value::Int32(x))
            }
            _ => Err(UdflareError::evaluation("gcd expects INT arguments")),
        }),
        FunctionOptions::default().with_arg_names(["x", "y"]),
    )?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let config = ServerConfig {
        bind: env_or_default("UDFLARE_BIND", "0.0.0.0:8815"),
        max_sessions: env_usize_or_default("UDFLARE_MAX_SESSIONS", 128),
        batch_channel_capacity: env_usize_or_default("UDFLARE_BATCH_CHANNEL_CAPACITY", 4),
    };

    let server = UdfServer::with_config(config);
    if env_or_default("UDFLARE_DEMO_FUNCTIONS", "0") == "1" {
        register_demo_functions(&server)?;
    }
    if server.registry().names().is_empty() {
        tracing::warn!(
            "no functions registered; embed udflare-server as a library or set UDFLARE_DEMO_FUNCTIONS=1"
        );
    }

    server.serve().await?;
    Ok(())
}
