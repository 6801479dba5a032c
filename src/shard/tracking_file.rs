use std::{fmt, ops::Deref};

use bytes::Bytes;

use crate::{
    base::SquallResult,
    fio::ShardFile,
    shard::{ReaderPermit, Resources, permit::ResourceUnits},
};

/// A file wrapper that accounts the memory of bulk-read buffers against a
/// permit.
///
/// Only [`read_bulk`](Self::read_bulk) does accounting; every other
/// operation passes straight through. The wrapper never waits for
/// admission, so it can push the semaphore's memory budget below zero.
/// Bounding that overcommit is the caller's job.
pub struct TrackedFile<F: ShardFile> {
    file: F,
    permit: ReaderPermit,
}

impl<F: ShardFile> TrackedFile<F> {
    pub fn new(file: F, permit: ReaderPermit) -> Self {
        Self { file, permit }
    }

    pub fn permit(&self) -> &ReaderPermit {
        &self.permit
    }

    /// Read up to `range_size` bytes at `offset`. The full range is
    /// accounted for the duration of the read; afterwards the returned
    /// [`TrackedBuffer`] holds exactly the buffer's size, released when
    /// the buffer drops, even if it outlives this wrapper.
    pub async fn read_bulk(&self, offset: u64, range_size: usize) -> SquallResult<TrackedBuffer> {
        let mut units = self.permit.consume_memory(range_size as u64);
        let buf = self.file.read_bulk(offset, range_size).await?;
        units.reset(Resources::memory_only(buf.len() as i64));
        Ok(TrackedBuffer { buf, _units: units })
    }

    pub async fn size(&self) -> SquallResult<u64> {
        self.file.size().await
    }

    pub async fn sync_all(&self) -> SquallResult<()> {
        self.file.sync_all().await
    }

    pub async fn close(&self) -> SquallResult<()> {
        self.file.close().await
    }
}

/// A read buffer whose memory stays accounted against a permit for as
/// long as the buffer is alive.
pub struct TrackedBuffer {
    buf: Bytes,
    _units: ResourceUnits,
}

impl TrackedBuffer {
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.buf
    }
}

impl Deref for TrackedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl AsRef<[u8]> for TrackedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for TrackedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackedBuffer(len={})", self.buf.len())
    }
}
