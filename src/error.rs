use std::io;
use thiserror::Error;

/// Error taxonomy for queue operations.
///
/// Every fallible producer/consumer operation surfaces exactly one of
/// these kinds; there are no automatic retries. `ConsumerSlotsFull` and
/// `TimedOut` are expected outcomes the caller may react to; everything
/// else is fatal for the handle that produced it.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("index file open/create failed: {0}")]
    IndexOpen(#[source] io::Error),

    #[error("data file open/create failed: {0}")]
    DataOpen(#[source] io::Error),

    #[error("control file open/create failed: {0}")]
    ControlOpen(#[source] io::Error),

    #[error("index file magic/version/align mismatch")]
    IndexSanity,

    #[error("data file magic/version/align mismatch")]
    DataSanity,

    #[error("control file magic/version/align mismatch")]
    ControlSanity,

    #[error("named semaphore create/open failed: {0}")]
    SemaphoreOpen(#[source] io::Error),

    #[error("registry lock acquisition failed: {0}")]
    RegistryLock(#[source] io::Error),

    #[error("all consumer slots are in use")]
    ConsumerSlotsFull,

    #[error("index file extension failed: {0}")]
    IndexExtend(#[source] io::Error),

    #[error("data file extension failed: {0}")]
    DataExtend(#[source] io::Error),

    #[error("wait for new entries timed out")]
    TimedOut,
}
