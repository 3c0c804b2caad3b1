//! Arrow Flight glue over the exchange service.
//!
//! Only `get_flight_info` (signature discovery) and `do_exchange` (function
//! invocation) are served; every other Flight RPC is out of contract for a
//! UDF server and answers `unimplemented`.

use std::sync::Arc;

use arrow_flight::decode::FlightRecordBatchStream;
use arrow_flight::encode::FlightDataEncoderBuilder;
use arrow_flight::error::FlightError;
use arrow_flight::flight_service_server::FlightService;
pub use arrow_flight::flight_service_server::FlightServiceServer;
use arrow_flight::{
    Action, ActionType, Criteria, Empty, FlightData, FlightDescriptor, FlightInfo,
    HandshakeRequest, HandshakeResponse, PollInfo, PutResult, SchemaResult, Ticket,
};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tonic::{Request, Response, Status, Streaming};
use tracing::debug;
use udflare_common::UdflareError;

use crate::exchange::ExchangeService;

/// Flight-facing wrapper around [`ExchangeService`].
pub struct UdfFlightService {
    exchange: Arc<ExchangeService>,
}

impl UdfFlightService {
    pub fn new(exchange: Arc<ExchangeService>) -> Self {
        Self { exchange }
    }
}

#[tonic::async_trait]
impl FlightService for UdfFlightService {
    type HandshakeStream = BoxStream<'static, Result<HandshakeResponse, Status>>;
    type ListFlightsStream = BoxStream<'static, Result<FlightInfo, Status>>;
    type DoGetStream = BoxStream<'static, Result<FlightData, Status>>;
    type DoPutStream = BoxStream<'static, Result<PutResult, Status>>;
    type DoActionStream = BoxStream<'static, Result<arrow_flight::Result, Status>>;
    type ListActionsStream = BoxStream<'static, Result<ActionType, Status>>;
    type DoExchangeStream = BoxStream<'static, Result<FlightData, Status>>;

    async fn handshake(
        &self,
        _request: Request<Streaming<HandshakeRequest>>,
    ) -> Result<Response<Self::HandshakeStream>, Status> {
        Err(Status::unimplemented("handshake is not supported"))
    }

    async fn list_flights(
        &self,
        _request: Request<Criteria>,
    ) -> Result<Response<Self::ListFlightsStream>, Status> {
        Err(Status::unimplemented("list_flights is not supported"))
    }

    /// Advertise the concatenation of a function's input and output schema.
    async fn get_flight_info(
        &self,
        request: Request<FlightDescriptor>,
    ) -> Result<Response<FlightInfo>, Status> {
        let descriptor = request.into_inner();
        let name = function_name(Some(&descriptor))?;
        let function = self
            .exchange
            .registry()
            .lookup(&name)
            .map_err(to_status)?;
        let schema = function.exchange_schema();
        let total_fields = schema.fields().len() as i64;
        let info = FlightInfo::new()
            .try_with_schema(&schema)
            .map_err(|e| Status::internal(format!("schema encoding failed: {e}")))?
            .with_descriptor(descriptor)
            .with_total_records(total_fields)
            .with_total_bytes(0);
        Ok(Response::new(info))
    }

    async fn poll_flight_info(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> Result<Response<PollInfo>, Status> {
        Err(Status::unimplemented("poll_flight_info is not supported"))
    }

    async fn get_schema(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> Result<Response<SchemaResult>, Status> {
        Err(Status::unimplemented("get_schema is not supported"))
    }

    async fn do_get(
        &self,
        _request: Request<Ticket>,
    ) -> Result<Response<Self::DoGetStream>, Status> {
        Err(Status::unimplemented("do_get is not supported"))
    }

    async fn do_put(
        &self,
        _request: Request<Streaming<FlightData>>,
    ) -> Result<Response<Self::DoPutStream>, Status> {
        Err(Status::unimplemented("do_put is not supported"))
    }

    async fn do_action(
        &self,
        _request: Request<Action>,
    ) -> Result<Response<Self::DoActionStream>, Status> {
        Err(Status::unimplemented("do_action is not supported"))
    }

    async fn list_actions(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Self::ListActionsStream>, Status> {
        Err(Status::unimplemented("list_actions is not supported"))
    }

    /// Invoke a registered function over a bidirectional batch stream.
    async fn do_exchange(
        &self,
        request: Request<Streaming<FlightData>>,
    ) -> Result<Response<Self::DoExchangeStream>, Status> {
        let mut inbound = request.into_inner();
        let Some(first) = inbound.next().await else {
            return Err(Status::invalid_argument("empty exchange stream"));
        };
        let first = first?;
        let name = function_name(first.flight_descriptor.as_ref())?;
        debug!(function = %name, "exchange session opened");

        // The first message also carries the stream schema, so it is pushed
        // back in front of the decoder.
        let flight_data = futures::stream::once(async move { Ok(first) })
            .chain(inbound.map_err(FlightError::from));
        let batches = FlightRecordBatchStream::new_from_flight_data(flight_data)
            .map_err(|e| UdflareError::Transport(e.to_string()));

        let output = self
            .exchange
            .do_exchange(&name, Box::pin(batches))
            .map_err(to_status)?;
        let schema = output.schema();
        let encoded = FlightDataEncoderBuilder::new()
            .with_schema(schema)
            .build(output.map_err(|e| FlightError::ExternalError(Box::new(e))))
            .map_err(Status::from);
        Ok(Response::new(Box::pin(encoded)))
    }
}

fn function_name(descriptor: Option<&FlightDescriptor>) -> Result<String, Status> {
    descriptor
        .and_then(|d| d.path.first())
        .cloned()
        .ok_or_else(|| Status::invalid_argument("missing function name in flight descriptor path"))
}

fn to_status(err: UdflareError) -> Status {
    match &err {
        UdflareError::FunctionNotFound(_) => Status::not_found(err.to_string()),
        UdflareError::InvalidTypeSyntax(_)
        | UdflareError::UnsupportedType(_)
        | UdflareError::InvalidDecimalSpec(_)
        | UdflareError::InvalidConfig(_) => Status::invalid_argument(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}
