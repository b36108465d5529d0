use async_nats::HeaderMap;
use bytes::Bytes;
use std::time::Duration;

/// Request type for consuming a single NATS message through Tower.
///
/// Owns all the message data so it can be passed through Tower middleware
/// layers without lifetime concerns.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    /// The NATS subject the message was published to
    pub subject: String,
    /// The message payload
    pub payload: Bytes,
    /// Optional headers (trace context, delivery schedule)
    pub headers: Option<HeaderMap>,
}

impl ConsumeRequest {
    pub fn new(subject: String, payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Self {
            subject,
            payload,
            headers,
        }
    }

    /// Look up a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|headers| headers.get(name))
            .map(|value| value.as_str())
    }
}

/// Response type for message consumption.
///
/// Tells the consumer loop how to acknowledge the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResponse {
    /// Processed (or deliberately dropped) - acknowledge it
    Ack,
    /// Transient failure - reject it for immediate redelivery
    Nak(Option<String>),
    /// Not due yet - redeliver after the given delay
    Delay(Duration),
    /// Can never be processed - stop redelivering it
    Term(String),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn nak(reason: impl Into<String>) -> Self {
        Self::Nak(Some(reason.into()))
    }

    pub fn delay(delay: Duration) -> Self {
        Self::Delay(delay)
    }

    pub fn term(reason: impl Into<String>) -> Self {
        Self::Term(reason.into())
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    /// Short label used in consumption logs
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nak(_) => "nak",
            Self::Delay(_) => "delay",
            Self::Term(_) => "term",
        }
    }
}
