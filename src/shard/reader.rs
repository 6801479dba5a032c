use async_trait::async_trait;

use crate::{base::SquallResult, shard::ReaderPermit};

/// A read operation the semaphore can park in its inactive registry and
/// evict on demand.
///
/// This is the only contract the semaphore consumes from readers: access
/// to the permit accounting for the reader's resources, and a way to shut
/// the reader down. What a reader actually reads is none of the
/// semaphore's business.
#[async_trait(?Send)]
pub trait ShardReader {
    /// The permit this reader's resources are accounted against.
    fn permit(&self) -> &ReaderPermit;

    /// Release everything the reader holds. Called at most once, and
    /// always before the reader is dropped by the semaphore.
    async fn close(&mut self) -> SquallResult<()>;
}
