//! Durable key/value state

pub mod memory;
pub mod ports;

pub use memory::MemoryStateStore;
pub use ports::StateStore;
