mod ack_policy;
mod confirmation_consumer_service;
mod confirmation_queue_producer;
mod device_seen_consumer_service;
mod lifecycle_consumer_service;
mod notification_producer;

pub use ack_policy::*;
pub use confirmation_consumer_service::*;
pub use confirmation_queue_producer::*;
pub use device_seen_consumer_service::*;
pub use lifecycle_consumer_service::*;
pub use notification_producer::*;
