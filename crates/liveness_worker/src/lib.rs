pub mod domain;
pub mod liveness_worker;
pub mod nats;
pub mod sweep_scheduler;

pub use domain::*;
pub use liveness_worker::*;
pub use nats::*;
pub use sweep_scheduler::*;
