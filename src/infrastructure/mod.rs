// Infrastructure module - Core background services and utilities
mod heartbeat;
pub mod task_manager;
pub mod timer;

pub(crate) use heartbeat::HeartbeatManager;
pub use task_manager::TaskManager;
pub use timer::ReconnectTimer;
