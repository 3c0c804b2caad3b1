//! Boundary-only exchange handler: per-session dispatch onto the shared
//! session pool, batch-in/batch-out loop against the evaluation engine.

use std::sync::Arc;
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error};
use udflare_common::metrics::global_metrics;
use udflare_common::{MetricsRegistry, Result, ServerConfig, UdflareError};
use udflare_engine::{evaluate_batch, FunctionRegistry};

use crate::stream::{session_channel, SendableBatchStream};

/// Drives exchange sessions against the registry.
///
/// Each session is dispatched fire-and-forget onto the shared session pool;
/// the task acquires one of `max_sessions` permits before evaluating, so a
/// slow function cannot block acceptance of other clients' sessions. Within
/// one session, batches are evaluated strictly in arrival order and never
/// overlap in flight.
pub struct ExchangeService {
    registry: Arc<FunctionRegistry>,
    session_permits: Arc<Semaphore>,
    channel_capacity: usize,
    metrics: MetricsRegistry,
}

impl ExchangeService {
    pub fn new(registry: Arc<FunctionRegistry>, config: &ServerConfig) -> Self {
        Self {
            registry,
            session_permits: Arc::new(Semaphore::new(config.max_sessions.max(1))),
            channel_capacity: config.batch_channel_capacity.max(1),
            metrics: global_metrics().clone(),
        }
    }

    pub fn registry(&self) -> Arc<FunctionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Open one exchange session: look up `name`, spawn the session task,
    /// and return its output stream. Lookup failures surface synchronously,
    /// before any work is scheduled.
    pub fn do_exchange<S>(&self, name: &str, inbound: S) -> Result<SendableBatchStream>
    where
        S: Stream<Item = Result<RecordBatch>> + Send + Unpin + 'static,
    {
        let function = self.registry.lookup(name)?;
        let permits = Arc::clone(&self.session_permits);
        let metrics = self.metrics.clone();
        let (mut tx, output) = session_channel(function.output_schema(), self.channel_capacity);

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                // semaphore closed: the server is shutting down
                Err(_) => return,
            };
            let mut inbound = inbound;
            while let Some(item) = inbound.next().await {
                let batch = match item {
                    Ok(batch) => batch,
                    Err(err) => {
                        error!(function = function.name(), error = %err, "inbound stream failed");
                        let _ = tx.send_error(err).await;
                        return;
                    }
                };

                let started = Instant::now();
                let rows = batch.num_rows() as u64;
                let task_function = Arc::clone(&function);
                let result =
                    tokio::task::spawn_blocking(move || evaluate_batch(&task_function, &batch))
                        .await;
                match result {
                    Ok(Ok(output_batch)) => {
                        metrics.record_batch(
                            function.name(),
                            rows,
                            started.elapsed().as_secs_f64(),
                        );
                        debug!(function = function.name(), rows, "evaluated batch");
                        if tx.send_batch(output_batch).await.is_err() {
                            // client went away
                            return;
                        }
                    }
                    Ok(Err(err)) => {
                        metrics.record_error(function.name());
                        error!(function = function.name(), error = %err, "batch evaluation failed");
                        let _ = tx.send_error(err).await;
                        return;
                    }
                    Err(join_err) => {
                        metrics.record_error(function.name());
                        error!(function = function.name(), error = %join_err, "evaluation task failed");
                        let _ = tx
                            .send_error(UdflareError::Evaluation {
                                function: function.name().to_string(),
                                row: None,
                                message: join_err.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(output)
    }
}
