// Infrastructure module - Background timers, backoff policy and buffering
pub mod heartbeat;
pub mod queue;
pub mod task_manager;
pub mod timer;

pub use heartbeat::KeepAlive;
pub use queue::OutboundQueue;
pub use task_manager::TaskSlot;
pub use timer::Backoff;
