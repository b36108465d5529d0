mod clock;
mod confirmation_service;
mod events;
mod lifecycle_event_service;
mod rediscovery_service;
mod staleness_sweep_service;
mod visibility;

pub use clock::*;
pub use confirmation_service::*;
pub use events::*;
pub use lifecycle_event_service::*;
pub use rediscovery_service::*;
pub use staleness_sweep_service::*;
pub use visibility::*;
