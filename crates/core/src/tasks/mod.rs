//! Asynchronous job polling

pub mod options;
pub mod poller;

pub use options::{PollOptions, ProgressCallback};
pub use poller::{TaskFuture, TaskPoller};
