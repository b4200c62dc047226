// Plain configuration and view types exchanged across the queue API

/// Initial sizing for a producer's files.
///
/// Both files grow on demand (data by 10 percent steps, index by 64 Ki
/// entry chunks), so these are starting points, not capacities.
#[derive(Copy, Clone, Debug)]
pub struct QueueConfig {
    pub index_initial_bytes: usize,
    pub data_initial_bytes: usize,
    pub max_consumers: u16,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            index_initial_bytes: 1024 * 1024,
            data_initial_bytes: 10 * 1024 * 1024,
            max_consumers: 16,
        }
    }
}

/// One drained message, borrowed zero-copy from the consumer's read-only
/// data mapping.
///
/// The view stays valid until the consumer's next operation that can tear
/// down its own mapping (`close`); the producer growing the data file does
/// not invalidate it.
#[derive(Debug)]
pub struct MessageView<'a> {
    pub seq: u64,
    pub payload: &'a [u8],
}

impl<'a> MessageView<'a> {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
