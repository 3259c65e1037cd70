// Module declarations
mod builder;
mod connection;
mod core;
mod state;

// Public API exports
pub use builder::RealtimeClientBuilder;
pub use self::core::RealtimeClient;
pub use state::ConnectionStats;
