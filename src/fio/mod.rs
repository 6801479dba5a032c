//! # File I/O
//!
//! This module contains the asynchronous file abstraction the read path is
//! built against, to allow testing of implementations that require
//! file-system I/O.
//!
//! Buffers are owned: a read hands back a fresh [`Bytes`] instead of filling
//! a caller-provided slice, so the buffer can outlive both the read call and
//! the file handle. [`TrackedFile`] relies on exactly that to attach memory
//! accounting to the buffers it returns.
//!
//! [`TrackedFile`]: crate::shard::TrackedFile

use async_trait::async_trait;
use bytes::Bytes;

use crate::base::SquallResult;

mod virtual_fio;

pub use virtual_fio::*;

/// # File I/O File Trait
///
/// A trait that abstracts the asynchronous file operations a shard's read
/// path needs.
#[async_trait(?Send)]
pub trait ShardFile {
    /// Read up to `range_size` bytes starting at `offset`, returning an
    /// owned buffer. A buffer shorter than `range_size` means the range
    /// extends past the end of the file.
    async fn read_bulk(&self, offset: u64, range_size: usize) -> SquallResult<Bytes>;

    /// Byte size of the file.
    async fn size(&self) -> SquallResult<u64>;

    /// Flush all buffered writes to durable storage.
    async fn sync_all(&self) -> SquallResult<()>;

    /// Close the underlying handle. The file must not be used afterwards.
    async fn close(&self) -> SquallResult<()>;
}
