// Module naming follows project convention (SPMC = Single-Producer Multi-Consumer)
#[allow(non_snake_case)]
pub mod SPMC;

// Debug implementations for various types
pub mod Debug {
    pub mod StructDebug;
}

#[allow(non_snake_case)]
pub mod Core {
    pub mod mapped_file;
    pub use mapped_file::MappedFile;
    pub mod semaphore;
    pub use semaphore::NamedSemaphore;
}

pub mod error;
pub use error::QueueError;
