//! # Shard read path
//!
//! Admission control for the read operations of a single storage shard:
//! the reader concurrency semaphore, its permits and scoped resource
//! units, the inactive-read registry, and the memory-tracking file
//! wrapper.

mod config;
mod permit;
mod reader;
mod resources;
mod semaphore;
mod tracking_file;


pub use config::*;
pub use permit::{PermitState, ReaderPermit, ResourceUnits};
pub use reader::*;
pub use resources::*;
pub use semaphore::{
    EvictReason, EvictionNotifyHandler, InactiveReadHandle, ReaderSemaphore, SemaphoreStats,
};
pub use tracking_file::*;
