use serde::{Deserialize, Serialize};

/// Capacity knobs for a shard's reader semaphore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    /// Max number of concurrently admitted reads.
    pub count: u32,
    /// Buffer memory budget shared by all admitted reads.
    pub memory: i64,
    /// Queued admissions beyond this fail with an overload error.
    pub max_queue_length: usize,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            count: 100,
            memory: 64 * 1024 * 1024, // 64 MiB
            max_queue_length: usize::MAX,
        }
    }
}

impl SemaphoreConfig {
    /// A config tuned for fast testing.
    ///
    /// Tiny budgets make contention and eviction easy to provoke.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            count: 10,
            memory: 1024 * 1024,
            max_queue_length: 16,
        }
    }
}
