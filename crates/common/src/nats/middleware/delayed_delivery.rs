//! Delay-queue semantics on top of JetStream.
//!
//! Producers stamp messages with a "deliver after" instant; consumers wrapped
//! in [`DelayedDeliveryLayer`] hand early messages back to JetStream with a
//! delayed NAK instead of passing them to the inner service.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::nats::{ConsumeRequest, ConsumeResponse};
use async_nats::HeaderMap;
use chrono::{DateTime, Utc};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Header carrying the earliest instant (RFC 3339) a message may be handled
pub const DELIVER_AFTER_HEADER: &str = "Dagwatch-Deliver-After";

/// Build publish headers that hold a message back until `deliver_after`
pub fn deliver_after_headers(deliver_after: DateTime<Utc>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(DELIVER_AFTER_HEADER, deliver_after.to_rfc3339().as_str());
    headers
}

/// Time left before a message stamped with `header_value` becomes due.
/// Unparseable stamps are treated as due so the message is not held forever.
pub fn remaining_delay(header_value: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
    let raw = header_value?;
    let deliver_after = match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at.with_timezone(&Utc),
        Err(e) => {
            warn!(value = %raw, error = %e, "ignoring unparseable deliver-after header");
            return None;
        }
    };

    (deliver_after - now).to_std().ok().filter(|d| !d.is_zero())
}

#[derive(Clone, Default)]
pub struct DelayedDeliveryLayer;

impl DelayedDeliveryLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for DelayedDeliveryLayer {
    type Service = DelayedDeliveryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        DelayedDeliveryService { inner: service }
    }
}

#[derive(Clone)]
pub struct DelayedDeliveryService<S> {
    inner: S,
}

impl<S> Service<ConsumeRequest> for DelayedDeliveryService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        if let Some(delay) = remaining_delay(req.header(DELIVER_AFTER_HEADER), Utc::now()) {
            debug!(
                subject = %req.subject,
                delay_ms = delay.as_millis(),
                "message not due yet, deferring"
            );
            return Box::pin(async move { Ok(ConsumeResponse::delay(delay)) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}
