// Messaging module - Event kinds and inbound frame dispatch
pub mod event;
pub mod router;

pub use event::{ControlFrame, EventKind};
pub use router::{EventCallback, EventDispatcher, Routed};
pub(crate) use router::invoke_isolated;
