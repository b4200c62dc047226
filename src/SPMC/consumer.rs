// src/SPMC/consumer.rs

use std::fmt;
use std::path::Path;
use std::slice;
use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::error::QueueError;
use crate::Core::MappedFile;
use crate::Core::NamedSemaphore;
use crate::SPMC::Files::layout::{copy_name, name_bytes, name_matches, FLAG_READY};
use crate::SPMC::Files::views::{
    ControlView, DataView, IndexView, CONTROL_HEADER_BYTES, DATA_HEADER_BYTES, INDEX_HEADER_BYTES,
};
use crate::SPMC::Structs::Queue_Structs::MessageView;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// The reading side of the queue: index and data mapped read-only, control
/// mapped read-write for slot bookkeeping.
///
/// A consumer's view of the index and data files is fixed at attach time.
/// If the producer grows a file afterwards, entries and payload beyond the
/// attach-time length read as "nothing available" until the consumer
/// re-attaches.
pub struct Consumer {
    index: MappedFile,
    data: MappedFile,
    control: MappedFile,
    new_sem: NamedSemaphore,
    reg_sem: NamedSemaphore,
    slot: Option<u32>,
}

impl Consumer {
    /// Map the three files, validate their headers, and open the named
    /// semaphores published in the control header.
    pub(crate) fn attach(
        index_path: &Path,
        data_path: &Path,
        control_path: &Path,
    ) -> Result<Self, QueueError> {
        let index = MappedFile::open_ro(index_path).map_err(QueueError::IndexOpen)?;
        let data = MappedFile::open_ro(data_path).map_err(QueueError::DataOpen)?;
        let control = MappedFile::open_rw(control_path).map_err(QueueError::ControlOpen)?;

        if index.len() < INDEX_HEADER_BYTES
            || !unsafe { IndexView::bind(index.address_ro() as *mut u8, index.len()) }.sane()
        {
            return Err(QueueError::IndexSanity);
        }
        if data.len() < DATA_HEADER_BYTES
            || !unsafe { DataView::bind(data.address_ro() as *mut u8, data.len()) }.sane()
        {
            return Err(QueueError::DataSanity);
        }
        if control.len() < CONTROL_HEADER_BYTES
            || !unsafe { ControlView::bind(control.address_rw(), control.len()) }.sane()
        {
            return Err(QueueError::ControlSanity);
        }

        let view = unsafe { ControlView::bind(control.address_rw(), control.len()) };
        let new_name = String::from_utf8_lossy(name_bytes(&view.header().new_entries_sem_name))
            .into_owned();
        let reg_name = String::from_utf8_lossy(name_bytes(&view.header().registry_lock_sem_name))
            .into_owned();

        let new_sem = NamedSemaphore::open(&new_name).map_err(QueueError::SemaphoreOpen)?;
        let reg_sem = NamedSemaphore::open(&reg_name).map_err(QueueError::SemaphoreOpen)?;

        info!(
            index = %index_path.display(),
            data = %data_path.display(),
            control = %control_path.display(),
            "consumer attached"
        );

        Ok(Self {
            index,
            data,
            control,
            new_sem,
            reg_sem,
            slot: None,
        })
    }

    fn index_view(&self) -> IndexView {
        unsafe { IndexView::bind(self.index.address_ro() as *mut u8, self.index.len()) }
    }

    fn data_view(&self) -> DataView {
        unsafe { DataView::bind(self.data.address_ro() as *mut u8, self.data.len()) }
    }

    fn control_view(&self) -> ControlView {
        unsafe { ControlView::bind(self.control.address_rw(), self.control.len()) }
    }

    /// Claim a slot in the control file under the registry lock.
    ///
    /// An active slot carrying the same name is reused with its cursor
    /// intact; otherwise the first inactive slot is installed with
    /// `last_seq = start_seq`. `start_seq` is taken as-is; the queue does
    /// not check that the sequence exists yet.
    pub fn register(&mut self, name: &str, start_seq: u64) -> Result<u32, QueueError> {
        if self.control.len() < CONTROL_HEADER_BYTES {
            return Err(QueueError::ControlSanity);
        }
        self.reg_sem.wait().map_err(QueueError::RegistryLock)?;
        let outcome = self.scan_slots(name, start_seq);
        self.reg_sem.post().map_err(QueueError::RegistryLock)?;

        let slot = outcome?;
        self.slot = Some(slot);
        info!(name, slot, start_seq, "consumer registered");
        Ok(slot)
    }

    fn scan_slots(&self, name: &str, start_seq: u64) -> Result<u32, QueueError> {
        let view = self.control_view();
        let count = view.slot_count();

        for i in 0..count {
            if let Some(s) = view.slot(i) {
                if s.active == 1 && name_matches(&s.name, name) {
                    return Ok(i);
                }
            }
        }
        for i in 0..count {
            // slot_mut: we hold the registry lock
            if let Some(s) = unsafe { view.slot_mut(i) } {
                if s.active == 0 {
                    s.active = 1;
                    s.last_seq = start_seq;
                    s.last_update_ns = now_ns();
                    copy_name(&mut s.name, name);
                    return Ok(i);
                }
            }
        }
        Err(QueueError::ConsumerSlotsFull)
    }

    /// Non-blocking attempt to advance this consumer's cursor by one
    /// message. Returns `None` when nothing is available (or the consumer
    /// has not registered yet).
    ///
    /// The returned view borrows the consumer's read-only mapping; copy it
    /// out before closing the handle.
    pub fn drain(&mut self) -> Option<MessageView<'_>> {
        let slot_index = self.slot?;
        if self.index.len() < INDEX_HEADER_BYTES || self.control.len() < CONTROL_HEADER_BYTES {
            return None;
        }
        let index = self.index_view();
        let control = self.control_view();

        let nseq = index.header().next_seq.load(Ordering::Acquire);
        // Entries beyond our attach-time mapping stay invisible until a
        // re-attach.
        let visible = nseq.min(index.capacity());

        // slot_mut: this is our own slot; per-slot updates are single-writer
        let slot = unsafe { control.slot_mut(slot_index) }?;
        while slot.last_seq < visible {
            let e = index.entry(slot.last_seq)?;
            if e.flags.load(Ordering::Acquire) & FLAG_READY == 0 {
                // Not committed; the next_seq fence makes this unreachable
                // in practice, but skip rather than hand out garbage.
                slot.last_seq += 1;
                continue;
            }

            let seq = slot.last_seq;
            let off = e.off8 << 3;
            let len = e.len;
            // Resolve the payload before advancing: a span beyond our
            // attach-time data mapping must stay drainable after a
            // re-attach, not be skipped.
            let ptr = match self.data_view().payload_ptr(off, len) {
                Some(p) => p,
                None => return None,
            };
            slot.last_seq += 1;
            slot.last_update_ns = now_ns();

            let payload = unsafe { slice::from_raw_parts(ptr, len as usize) };
            return Some(MessageView { seq, payload });
        }
        None
    }

    /// Block until the producer posts a new-entries token.
    /// Returns false when the wait was interrupted by a signal.
    pub fn wait(&self) -> bool {
        self.new_sem.wait().is_ok()
    }

    /// Wait up to `timeout` for a new-entries token.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), QueueError> {
        match self.new_sem.wait_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(QueueError::TimedOut),
            Err(e) => Err(QueueError::SemaphoreOpen(e)),
        }
    }

    /// Slot index assigned by `register`, if any.
    pub fn slot_index(&self) -> Option<u32> {
        self.slot
    }

    /// This consumer's progress cursor (next sequence it will drain).
    pub fn last_seq(&self) -> Option<u64> {
        let slot = self.slot?;
        if self.control.len() < CONTROL_HEADER_BYTES {
            return None;
        }
        self.control_view().slot(slot).map(|s| s.last_seq)
    }

    /// The queue's committed sequence count, as visible to this consumer
    /// (0 once closed).
    pub fn next_seq(&self) -> u64 {
        if self.index.len() < INDEX_HEADER_BYTES {
            return 0;
        }
        self.index_view().header().next_seq.load(Ordering::Acquire)
    }

    /// Size of the slot table advertised by the control file (0 once
    /// closed).
    pub fn max_consumers(&self) -> u32 {
        if self.control.len() < CONTROL_HEADER_BYTES {
            return 0;
        }
        self.control_view().header().max_consumers
    }

    /// Unmap and close all three files and drop both semaphore references.
    /// Idempotent; also invoked on drop. The slot stays active so that a
    /// later `register` under the same name resumes from its cursor.
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
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_consumer(self, f)
    }
}
