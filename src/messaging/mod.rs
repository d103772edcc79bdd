// Messaging module - Event dispatch and reserved event payloads
pub mod dispatcher;
pub mod event;

pub use dispatcher::{EventDispatcher, Listener, listener};
pub use event::{ConnectionHealth, ErrorPayload, SystemEvent};
