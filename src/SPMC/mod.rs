mod builder;
mod consumer;
mod producer;

pub use builder::QueueBuilder;
pub use consumer::Consumer;
pub use producer::Producer;

pub mod Files {
    pub mod layout;
    pub mod views;
    pub use layout::{ConsumerSlot, ControlHeader, DataHeader, IndexEntry, IndexHeader};
}

pub mod Structs {
    pub mod Queue_Structs;
    pub use Queue_Structs::{MessageView, QueueConfig}; // re-export for stable path
}
