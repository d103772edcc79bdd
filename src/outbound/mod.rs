// Outbound module - pending sends and the bounded retry queue
mod envelope;
mod queue;

pub use envelope::{OutboundEnvelope, SendOptions};
pub use queue::OutboundQueue;
