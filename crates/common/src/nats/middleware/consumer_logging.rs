use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::nats::set_parent_from_headers;
use crate::nats::{ConsumeRequest, ConsumeResponse};
use tower::{Layer, Service};
use tracing::{error, info, info_span, Instrument};

/// Tower layer that wraps each consumed message in a span (parented on the
/// publisher's trace context) and logs its outcome and duration
#[derive(Clone)]
pub struct NatsConsumeLoggingLayer {
    consumer_name: &'static str,
}

impl NatsConsumeLoggingLayer {
    pub fn new(consumer_name: &'static str) -> Self {
        Self { consumer_name }
    }
}

impl<S> Layer<S> for NatsConsumeLoggingLayer {
    type Service = NatsConsumeLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsConsumeLoggingService {
            inner: service,
            consumer_name: self.consumer_name,
        }
    }
}

/// Service that logs single message consumption
#[derive(Clone)]
pub struct NatsConsumeLoggingService<S> {
    inner: S,
    consumer_name: &'static str,
}

impl<S> Service<ConsumeRequest> for NatsConsumeLoggingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let subject = req.subject.clone();
        let payload_size = req.payload.len();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        let span = info_span!("nats_consume", consumer = self.consumer_name, subject = %subject);
        if let Some(headers) = &req.headers {
            set_parent_from_headers(&span, headers);
        }

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let duration_ms = start.elapsed().as_millis();

                match &result {
                    Ok(response) => {
                        let outcome = response.outcome();
                        info!(
                            subject = %subject,
                            payload_bytes = payload_size,
                            outcome = %outcome,
                            duration_ms = %duration_ms,
                            "consumed from {subject} in {duration_ms}ms [{outcome}]"
                        );
                    }
                    Err(e) => {
                        error!(
                            subject = %subject,
                            payload_bytes = payload_size,
                            duration_ms = %duration_ms,
                            error = %e,
                            "failed to consume from {subject} in {duration_ms}ms: {e}"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
