use std::{cell::RefCell, rc::Rc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{base::SquallResult, fio::ShardFile};

/// An in-memory [`ShardFile`] backed by a plain byte vector.
///
/// Handles created via [`clone`](Self::clone) share the same contents, like
/// two descriptors opened on the same path. There is no real I/O anywhere,
/// which makes this the file of choice for tests.
#[derive(Clone, Default)]
pub struct VirtualShardFile {
    data: Rc<RefCell<Vec<u8>>>,
}

impl VirtualShardFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contents(data: Vec<u8>) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
        }
    }

    /// A file of `len` bytes, every byte set to `byte`.
    pub fn filled(byte: u8, len: usize) -> Self {
        Self::from_contents(vec![byte; len])
    }
}

#[async_trait(?Send)]
impl ShardFile for VirtualShardFile {
    async fn read_bulk(&self, offset: u64, range_size: usize) -> SquallResult<Bytes> {
        let data = self.data.borrow();
        let start = usize::min(offset as usize, data.len());
        let end = usize::min(start + range_size, data.len());
        Ok(Bytes::copy_from_slice(&data[start..end]))
    }

    async fn size(&self) -> SquallResult<u64> {
        Ok(self.data.borrow().len() as u64)
    }

    async fn sync_all(&self) -> SquallResult<()> {
        Ok(())
    }

    async fn close(&self) -> SquallResult<()> {
        Ok(())
    }
}
