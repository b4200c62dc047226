// src/SPMC/producer.rs

use std::fmt;
use std::path::Path;
use std::ptr;
use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::Core::MappedFile;
use crate::Core::NamedSemaphore;
use crate::SPMC::Files::layout::{
    align_up, control_file_bytes, name_bytes, FLAG_PENDING, FLAG_READY, INDEX_GROW_ENTRIES,
    MMQ_ALIGN,
};
use crate::SPMC::Files::views::{
    ControlView, DataView, IndexView, DATA_HEADER_BYTES, INDEX_HEADER_BYTES,
};
use crate::SPMC::Structs::Queue_Structs::QueueConfig;

/// The writing side of the queue: owns all three files read-write plus the
/// two named semaphores.
///
/// There must be at most one live producer per queue; all cursors are
/// advanced by the producer alone and consumers rely on that single-writer
/// discipline instead of locks.
pub struct Producer {
    index: MappedFile,
    data: MappedFile,
    control: MappedFile,
    new_sem: NamedSemaphore,
    reg_sem: NamedSemaphore,
    new_sem_name: String,
    reg_sem_name: String,
}

impl Producer {
    /// Open-or-create the three files, re-initialize the control region,
    /// and create/open both named semaphores.
    ///
    /// Existing index and data files are reused as-is (their cursors keep
    /// the already-published messages reachable); the control file is
    /// always zeroed, which discards prior consumer registrations.
    pub(crate) fn init(
        index_path: &Path,
        data_path: &Path,
        control_path: &Path,
        new_sem_name: &str,
        reg_sem_name: &str,
        config: QueueConfig,
    ) -> Result<Self, QueueError> {
        let index = if MappedFile::exists(index_path) {
            let mf = MappedFile::open_rw(index_path).map_err(QueueError::IndexOpen)?;
            if mf.len() < INDEX_HEADER_BYTES
                || !unsafe { IndexView::bind(mf.address_rw(), mf.len()) }.sane()
            {
                return Err(QueueError::IndexSanity);
            }
            mf
        } else {
            let bytes = config.index_initial_bytes.max(IndexView::bytes_for(1));
            let mf = MappedFile::create_rw(index_path, bytes).map_err(QueueError::IndexOpen)?;
            unsafe { IndexView::bind(mf.address_rw(), mf.len()).initialize() };
            mf
        };

        let data = if MappedFile::exists(data_path) {
            let mf = MappedFile::open_rw(data_path).map_err(QueueError::DataOpen)?;
            if mf.len() < DATA_HEADER_BYTES
                || !unsafe { DataView::bind(mf.address_rw(), mf.len()) }.sane()
            {
                return Err(QueueError::DataSanity);
            }
            mf
        } else {
            let bytes = config.data_initial_bytes.max(DATA_HEADER_BYTES + MMQ_ALIGN as usize);
            let mf = MappedFile::create_rw(data_path, bytes).map_err(QueueError::DataOpen)?;
            unsafe { DataView::bind(mf.address_rw(), mf.len()).initialize() };
            mf
        };

        let control_bytes = control_file_bytes(config.max_consumers as u32);
        let mut control = if MappedFile::exists(control_path) {
            MappedFile::open_rw(control_path).map_err(QueueError::ControlOpen)?
        } else {
            MappedFile::create_rw(control_path, control_bytes).map_err(QueueError::ControlOpen)?
        };
        if control.len() < control_bytes {
            // A previous producer ran with a smaller slot table.
            control
                .extend_size(control_bytes)
                .map_err(QueueError::ControlOpen)?;
        }

        let control_view = unsafe { ControlView::bind(control.address_rw(), control.len()) };
        unsafe {
            control_view.initialize(config.max_consumers as u32, new_sem_name, reg_sem_name);
        }

        // Create/open by the names as stored (truncated) so consumers that
        // read them back from the control header open the same kernel
        // objects.
        let stored_new =
            String::from_utf8_lossy(name_bytes(&control_view.header().new_entries_sem_name))
                .into_owned();
        let stored_reg =
            String::from_utf8_lossy(name_bytes(&control_view.header().registry_lock_sem_name))
                .into_owned();

        let new_sem =
            NamedSemaphore::create_exclusive(&stored_new, 0).map_err(QueueError::SemaphoreOpen)?;
        let reg_sem =
            NamedSemaphore::create_exclusive(&stored_reg, 1).map_err(QueueError::SemaphoreOpen)?;

        info!(
            index = %index_path.display(),
            data = %data_path.display(),
            control = %control_path.display(),
            max_consumers = config.max_consumers,
            "producer initialized"
        );

        Ok(Self {
            index,
            data,
            control,
            new_sem,
            reg_sem,
            new_sem_name: stored_new,
            reg_sem_name: stored_reg,
        })
    }

    /// Append one message and commit it.
    ///
    /// Two-phase commit: the payload and the index entry (PENDING, then
    /// READY) are fully written before `next_seq` is advanced with Release
    /// ordering, so a consumer that observes the new `next_seq` (Acquire)
    /// also observes the bytes. Both files grow in place when full; growth
    /// remaps this producer's views but never touches consumer mappings.
    ///
    /// Returns the sequence number assigned to the message.
    pub fn publish(&mut self, msg: &[u8]) -> Result<u64, QueueError> {
        debug_assert!(msg.len() <= u32::MAX as usize);
        if self.data.len() < DATA_HEADER_BYTES || self.index.len() < INDEX_HEADER_BYTES {
            return Err(QueueError::DataOpen(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "producer handle is closed",
            )));
        }
        let len = msg.len() as u32;

        // Append payload, growing the data file by 10 percent steps until
        // the aligned span fits.
        let mut data_view = unsafe { DataView::bind(self.data.address_rw(), self.data.len()) };
        let pos = align_up(data_view.header().write_pos, MMQ_ALIGN as u64);
        let span = align_up(len as u64, MMQ_ALIGN as u64);
        let end = pos + span;

        while end > data_view.header().file_size {
            let new_bytes = self.data.len() * 11 / 10;
            self.data
                .extend_size(new_bytes)
                .map_err(QueueError::DataExtend)?;
            data_view = unsafe { DataView::bind(self.data.address_rw(), self.data.len()) };
            unsafe { data_view.header_mut().file_size = data_view.payload_len() };
            debug!(bytes = self.data.len(), "data file grown");
        }

        unsafe {
            let dst = data_view.payload_ptr_mut(pos);
            ptr::copy_nonoverlapping(msg.as_ptr(), dst, msg.len());
            if span > len as u64 {
                // Zero the alignment tail; keeps the file deterministic.
                ptr::write_bytes(dst.add(msg.len()), 0, (span - len as u64) as usize);
            }
            data_view.header_mut().write_pos = end;
        }

        // Make room in the index, in 64 Ki entry chunks.
        let mut index_view = unsafe { IndexView::bind(self.index.address_rw(), self.index.len()) };
        let seq = index_view.header().next_seq.load(Ordering::Relaxed);
        if IndexView::bytes_for(seq + 1) > self.index.len() {
            let new_bytes = IndexView::bytes_for(seq + INDEX_GROW_ENTRIES);
            self.index
                .extend_size(new_bytes)
                .map_err(QueueError::IndexExtend)?;
            index_view = unsafe { IndexView::bind(self.index.address_rw(), self.index.len()) };
            debug!(bytes = self.index.len(), "index file grown");
        }

        unsafe {
            let e = index_view.entry_mut(seq);
            e.seq = seq;
            e.off8 = pos >> 3;
            e.len = len;
            e.flags.store(FLAG_PENDING, Ordering::Relaxed);
            e.flags.store(FLAG_READY, Ordering::Release);
        }

        let h = index_view.header();
        h.next_seq.store(seq + 1, Ordering::Release);
        h.entry_count.store(seq + 1, Ordering::Relaxed);

        // Wake at most one blocked waiter per publish.
        let control_view = unsafe { ControlView::bind(self.control.address_rw(), self.control.len()) };
        unsafe { control_view.header_mut().notify_seq += 1 };
        self.new_sem.post().map_err(QueueError::SemaphoreOpen)?;

        Ok(seq)
    }

    /// Next sequence number the producer will assign (0 once closed).
    pub fn next_seq(&self) -> u64 {
        if self.index.len() < INDEX_HEADER_BYTES {
            return 0;
        }
        unsafe { IndexView::bind(self.index.address_rw(), self.index.len()) }
            .header()
            .next_seq
            .load(Ordering::Relaxed)
    }

    /// Current data append cursor in payload bytes (0 once closed).
    pub fn write_pos(&self) -> u64 {
        if self.data.len() < DATA_HEADER_BYTES {
            return 0;
        }
        unsafe { DataView::bind(self.data.address_rw(), self.data.len()) }
            .header()
            .write_pos
    }

    /// Payload capacity of the data file in bytes (0 once closed).
    pub fn data_payload_bytes(&self) -> u64 {
        if self.data.len() < DATA_HEADER_BYTES {
            return 0;
        }
        unsafe { DataView::bind(self.data.address_rw(), self.data.len()) }.payload_len()
    }

    /// Mapped lengths of the index, data, and control files.
    pub fn file_lens(&self) -> (usize, usize, usize) {
        (self.index.len(), self.data.len(), self.control.len())
    }

    /// Flush and unmap all three files and drop both semaphore references.
    /// Idempotent; also invoked on drop. Closing does not truncate the
    /// files or remove the semaphore names.
    pub fn close(&mut self) {
        for (name, mf) in [
            ("index", &mut self.index),
            ("data", &mut self.data),
            ("control", &mut self.control),
        ] {
            if let Err(e) = mf.close() {
                warn!(file = name, error = %e, "close failed");
            }
        }
        let _ = self.new_sem.close();
        let _ = self.reg_sem.close();
    }

    /// Remove both semaphore names from the system namespace. Attached
    /// consumers keep their references; future attaches will fail to open
    /// the semaphores by name.
    pub fn unlink_semaphores(&self) -> std::io::Result<()> {
        NamedSemaphore::unlink(&self.new_sem_name)?;
        NamedSemaphore::unlink(&self.reg_sem_name)
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_producer(self, f)
    }
}

