use std::fmt;

use crate::SPMC::{Consumer, Producer};

/// Debug function for Producer
///
/// Shows the mapped file lengths and the queue cursors without exposing
/// any base addresses.
pub fn debug_producer(producer: &Producer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (index_len, data_len, control_len) = producer.file_lens();
    f.debug_struct("Producer")
        .field("index_bytes", &index_len)
        .field("data_bytes", &data_len)
        .field("control_bytes", &control_len)
        .field("next_seq", &producer.next_seq())
        .field("write_pos", &producer.write_pos())
        .finish_non_exhaustive()
}

/// Debug function for Consumer
///
/// Shows the registration state and cursors; mapped regions stay opaque.
pub fn debug_consumer(consumer: &Consumer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Consumer")
        .field("slot", &consumer.slot_index())
        .field("last_seq", &consumer.last_seq())
        .field("next_seq", &consumer.next_seq())
        .finish_non_exhaustive()
}
