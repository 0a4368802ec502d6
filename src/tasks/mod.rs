//! Task registry, job runner and housekeeping

pub mod registry;
pub mod runner;
pub mod sweeper;

pub use registry::{ServeRejection, ServedFile, TaskRegistry, TaskSnapshot, TaskStatus};
pub use runner::TaskRunner;
