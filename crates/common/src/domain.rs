mod device;
#[cfg(any(test, feature = "testing"))]
mod in_memory;
mod liveness;
mod notification;
mod result;
mod shadow;

pub use device::*;
#[cfg(any(test, feature = "testing"))]
pub use in_memory::*;
pub use liveness::*;
pub use notification::*;
pub use result::*;
pub use shadow::*;
