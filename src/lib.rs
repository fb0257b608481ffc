pub mod config;
pub mod error;
pub mod hal;
pub mod kernel;
pub mod outputs;
pub mod services;

// Re-export specific items for convenient access
pub use kernel::channel::{ChannelConfig, EdgeCounterChannel};
pub use kernel::clock::TimeSyncGate;
pub use kernel::scheduler::SamplingScheduler;
