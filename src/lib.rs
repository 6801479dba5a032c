//! # Squall
//!
//! Shard-local reader admission control and memory accounting for an
//! async storage engine.
//!
//! Each storage shard runs on its own single-threaded cooperative
//! executor and owns one [`ReaderSemaphore`]. The semaphore decides how
//! many read operations may run concurrently inside the shard and how
//! much buffer memory they may collectively hold. Every logical read is
//! represented by a [`ReaderPermit`]; the resources it consumes are
//! scoped through [`ResourceUnits`] guards, so they are returned on
//! every exit path.
//!
//! Reads that finished their current step but want to keep their state
//! around can park themselves in the semaphore's inactive registry.
//! Parked readers are evicted (oldest first) whenever their resources
//! are needed to admit a waiter, when their ttl expires, or on
//! shutdown.
//!
//! ## Threading
//!
//! All types in this crate are deliberately `!Send`: the semaphore,
//! its permits and handles belong to exactly one shard executor and
//! are never shared across threads. Background work spawned by the
//! semaphore (closing evicted readers, expiring queued waiters) uses
//! [`tokio::task::spawn_local`], so the shard has to run inside a
//! [`tokio::task::LocalSet`] or an equivalent current-thread context.
//!
//! [`ReaderSemaphore`]: shard::ReaderSemaphore
//! [`ReaderPermit`]: shard::ReaderPermit
//! [`ResourceUnits`]: shard::ResourceUnits

#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate tracing;

pub mod base;
pub mod fio;
pub mod shard;
