//! Schema-carrying batch streams and the per-session output channel.

use std::pin::Pin;
use std::task::{Context, Poll};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use futures::channel::mpsc;
use futures::Stream;
use udflare_common::{Result, UdflareError};

/// A stream of record batches that also knows its output schema.
pub trait BatchStream: Stream<Item = Result<RecordBatch>> + Send {
    /// Output schema for every batch yielded by this stream.
    fn schema(&self) -> SchemaRef;
}

/// The standard boxed form handed to the transport.
pub type SendableBatchStream = Pin<Box<dyn BatchStream>>;

/// Adapter that attaches a schema to any `Stream<Item = Result<RecordBatch>>`.
pub struct BatchStreamAdapter<S> {
    schema: SchemaRef,
    inner: S,
}

impl<S> BatchStreamAdapter<S> {
    pub fn new(schema: SchemaRef, inner: S) -> Self {
        Self { schema, inner }
    }
}

impl<S> BatchStream for BatchStreamAdapter<S>
where
    S: Stream<Item = Result<RecordBatch>> + Send + Unpin + 'static,
{
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl<S> Stream for BatchStreamAdapter<S>
where
    S: Stream<Item = Result<RecordBatch>> + Unpin,
{
    type Item = Result<RecordBatch>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Create the bounded output channel of one exchange session.
///
/// Backpressure: when the transport drains slowly and the buffer fills up,
/// `send_batch` waits until there is capacity again.
pub fn session_channel(schema: SchemaRef, capacity: usize) -> (BatchSender, SendableBatchStream) {
    let (tx, rx) = mpsc::channel::<Result<RecordBatch>>(capacity);
    let stream = Box::pin(BatchStreamAdapter::new(schema, rx));
    (BatchSender { tx }, stream)
}

/// Sender side for [`session_channel`].
#[derive(Clone)]
pub struct BatchSender {
    tx: mpsc::Sender<Result<RecordBatch>>,
}

impl BatchSender {
    /// Send an output batch (awaits if the channel buffer is full).
    pub async fn send_batch(&mut self, batch: RecordBatch) -> Result<()> {
        use futures::SinkExt;
        self.tx
            .send(Ok(batch))
            .await
            .map_err(|e| UdflareError::Transport(format!("session channel closed: {e}")))
    }

    /// Send a terminal error and end downstream consumption.
    pub async fn send_error(&mut self, err: UdflareError) -> Result<()> {
        use futures::SinkExt;
        self.tx
            .send(Err(err))
            .await
            .map_err(|e| UdflareError::Transport(format!("session channel closed: {e}")))
    }
}
