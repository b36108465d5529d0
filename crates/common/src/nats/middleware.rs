mod consumer_logging;
mod consumer_types;
mod delayed_delivery;

pub use consumer_logging::*;
pub use consumer_types::*;
pub use delayed_delivery::*;
