mod client;
mod kv_device_registry;
mod kv_shadow_store;
mod kv_store;
mod middleware;
mod tower_consumer;
mod trace_context;
mod traits;

pub use client::*;
pub use kv_device_registry::*;
pub use kv_shadow_store::*;
pub use kv_store::*;
pub use middleware::*;
pub use tower_consumer::*;
pub use trace_context::*;
pub use traits::*;
