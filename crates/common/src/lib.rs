pub mod domain;
pub mod garde;
pub mod nats;
pub mod telemetry;

pub use domain::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use nats::{MockJetStreamConsumer, MockJetStreamPublisher, MockKeyValueBucket, MockPullConsumer};
