use std::path::{Path, PathBuf};

use super::{Consumer, Producer};
use crate::error::QueueError;
use crate::SPMC::Structs::Queue_Structs::QueueConfig;

/// Builder for both roles of a queue.
///
/// The file paths and semaphore names identify the queue; the sizing knobs
/// only matter for `build_producer` (a consumer reads everything it needs
/// from the control file).
#[derive(Clone, Debug)]
pub struct QueueBuilder {
    index_path: PathBuf,
    data_path: PathBuf,
    control_path: PathBuf,
    new_sem_name: String,
    reg_sem_name: String,
    config: QueueConfig,
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("index.mm"),
            data_path: PathBuf::from("data.mm"),
            control_path: PathBuf::from("control.mm"),
            new_sem_name: String::from("/mmq_new_entries"),
            reg_sem_name: String::from("/mmq_registry_lock"),
            config: QueueConfig::default(),
        }
    }
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place all three files under `dir`, keeping their default names.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.index_path = dir.join("index.mm");
        self.data_path = dir.join("data.mm");
        self.control_path = dir.join("control.mm");
        self
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_control_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.control_path = path.into();
        self
    }

    /// POSIX-style names (leading slash) for the new-entries counting
    /// semaphore and the registry-lock mutex. Stored in the control header
    /// truncated to its field capacity.
    pub fn with_sem_names(mut self, new_sem: impl Into<String>, reg_sem: impl Into<String>) -> Self {
        self.new_sem_name = new_sem.into();
        self.reg_sem_name = reg_sem.into();
        self
    }

    pub fn with_index_initial_bytes(mut self, bytes: usize) -> Self {
        self.config.index_initial_bytes = bytes;
        self
    }

    pub fn with_data_initial_bytes(mut self, bytes: usize) -> Self {
        self.config.data_initial_bytes = bytes;
        self
    }

    pub fn with_max_consumers(mut self, max: u16) -> Self {
        self.config.max_consumers = max;
        self
    }

    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build_producer(self) -> Result<Producer, QueueError> {
        Producer::init(
            &self.index_path,
            &self.data_path,
            &self.control_path,
            &self.new_sem_name,
            &self.reg_sem_name,
            self.config,
        )
    }

    pub fn build_consumer(self) -> Result<Consumer, QueueError> {
        Consumer::attach(&self.index_path, &self.data_path, &self.control_path)
    }
}
