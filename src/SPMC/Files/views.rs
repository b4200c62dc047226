// Typed views over the three mapped regions.
//
// Every producer/consumer operation re-binds its views from the current
// mapped base pointer before touching shared state; growth invalidates
// base pointers, and funnelling all access through these bind calls keeps
// the post-growth re-fetch uniform.

use std::mem::size_of;
use std::ptr;

use super::layout::{
    ConsumerSlot, ControlHeader, DataHeader, IndexEntry, IndexHeader, MAGIC_CONTROL, MAGIC_DATA,
    MAGIC_INDEX, MMQ_ALIGN,
};

pub const INDEX_HEADER_BYTES: usize = size_of::<IndexHeader>();
pub const INDEX_ENTRY_BYTES: usize = size_of::<IndexEntry>();
pub const DATA_HEADER_BYTES: usize = size_of::<DataHeader>();
pub const CONTROL_HEADER_BYTES: usize = size_of::<ControlHeader>();
pub const CONSUMER_SLOT_BYTES: usize = size_of::<ConsumerSlot>();

/// View over the index file: header plus the append-only entry array.
pub struct IndexView {
    base: *mut u8,
    bytes: usize,
}

impl IndexView {
    /// # Safety
    /// `base..base + bytes` must be a live mapping of an index file and
    /// `bytes` must cover at least the header. The view must not outlive
    /// the mapping it was bound from.
    pub unsafe fn bind(base: *mut u8, bytes: usize) -> Self {
        debug_assert!(bytes >= INDEX_HEADER_BYTES);
        Self { base, bytes }
    }

    pub fn header(&self) -> &IndexHeader {
        unsafe { &*(self.base as *const IndexHeader) }
    }

    /// Number of entries the mapped length can hold.
    pub fn capacity(&self) -> u64 {
        ((self.bytes - INDEX_HEADER_BYTES) / INDEX_ENTRY_BYTES) as u64
    }

    /// Bytes an index file needs to hold `entries` entries.
    pub fn bytes_for(entries: u64) -> usize {
        INDEX_HEADER_BYTES + entries as usize * INDEX_ENTRY_BYTES
    }

    /// Bounds-checked entry access; `None` when the entry lies beyond the
    /// mapped length (a consumer whose mapping predates index growth).
    pub fn entry(&self, seq: u64) -> Option<&IndexEntry> {
        if seq >= self.capacity() {
            return None;
        }
        let off = INDEX_HEADER_BYTES + seq as usize * INDEX_ENTRY_BYTES;
        Some(unsafe { &*(self.base.add(off) as *const IndexEntry) })
    }

    /// # Safety
    /// Producer-only: the mapping must be writeable and `seq` within
    /// capacity; the single-writer discipline is the caller's contract.
    pub unsafe fn entry_mut(&self, seq: u64) -> &mut IndexEntry {
        debug_assert!(seq < self.capacity());
        let off = INDEX_HEADER_BYTES + seq as usize * INDEX_ENTRY_BYTES;
        &mut *(self.base.add(off) as *mut IndexEntry)
    }

    /// Write a fresh header over a newly created file.
    ///
    /// # Safety
    /// The mapping must be writeable.
    pub unsafe fn initialize(&self) {
        ptr::write(
            self.base as *mut IndexHeader,
            IndexHeader {
                magic: MAGIC_INDEX,
                version: super::layout::FORMAT_VERSION,
                align: MMQ_ALIGN,
                next_seq: std::sync::atomic::AtomicU64::new(0),
                entry_count: std::sync::atomic::AtomicU64::new(0),
            },
        );
    }

    pub fn sane(&self) -> bool {
        let h = self.header();
        h.magic == MAGIC_INDEX
            && h.version == super::layout::FORMAT_VERSION
            && h.align == MMQ_ALIGN
    }
}

/// View over the data file: header plus the payload region.
pub struct DataView {
    base: *mut u8,
    bytes: usize,
}

impl DataView {
    /// # Safety
    /// Same contract as [`IndexView::bind`], for a data file.
    pub unsafe fn bind(base: *mut u8, bytes: usize) -> Self {
        debug_assert!(bytes >= DATA_HEADER_BYTES);
        Self { base, bytes }
    }

    pub fn header(&self) -> &DataHeader {
        unsafe { &*(self.base as *const DataHeader) }
    }

    /// # Safety
    /// Producer-only; mapping must be writeable.
    pub unsafe fn header_mut(&self) -> &mut DataHeader {
        &mut *(self.base as *mut DataHeader)
    }

    /// Payload bytes available in this mapping.
    pub fn payload_len(&self) -> u64 {
        (self.bytes - DATA_HEADER_BYTES) as u64
    }

    /// Bounds-checked payload pointer; `None` when the span exceeds the
    /// mapped payload (a consumer whose mapping predates data growth).
    /// The pointee stays valid for as long as the mapping does.
    pub fn payload_ptr(&self, offset: u64, len: u32) -> Option<*const u8> {
        let end = offset.checked_add(len as u64)?;
        if end > self.payload_len() {
            return None;
        }
        Some(unsafe { self.base.add(DATA_HEADER_BYTES + offset as usize) as *const u8 })
    }

    /// # Safety
    /// Producer-only: mapping must be writeable and the span within the
    /// mapped payload.
    pub unsafe fn payload_ptr_mut(&self, offset: u64) -> *mut u8 {
        debug_assert!(offset <= self.payload_len());
        self.base.add(DATA_HEADER_BYTES + offset as usize)
    }

    /// Write a fresh header over a newly created file.
    ///
    /// # Safety
    /// The mapping must be writeable.
    pub unsafe fn initialize(&self) {
        ptr::write(
            self.base as *mut DataHeader,
            DataHeader {
                magic: MAGIC_DATA,
                version: super::layout::FORMAT_VERSION,
                align: MMQ_ALIGN,
                write_pos: 0,
                file_size: self.payload_len(),
            },
        );
    }

    pub fn sane(&self) -> bool {
        let h = self.header();
        h.magic == MAGIC_DATA
            && h.version == super::layout::FORMAT_VERSION
            && h.align == MMQ_ALIGN
    }
}

/// View over the control file: header plus the consumer slot table.
pub struct ControlView {
    base: *mut u8,
    bytes: usize,
}

impl ControlView {
    /// # Safety
    /// Same contract as [`IndexView::bind`], for a control file.
    pub unsafe fn bind(base: *mut u8, bytes: usize) -> Self {
        debug_assert!(bytes >= CONTROL_HEADER_BYTES);
        Self { base, bytes }
    }

    pub fn header(&self) -> &ControlHeader {
        unsafe { &*(self.base as *const ControlHeader) }
    }

    /// # Safety
    /// Mapping must be writeable (control is mapped RW by both roles).
    pub unsafe fn header_mut(&self) -> &mut ControlHeader {
        &mut *(self.base as *mut ControlHeader)
    }

    /// Slots usable through this mapping: the advertised table size,
    /// clamped to what the mapped length actually covers.
    pub fn slot_count(&self) -> u32 {
        let fits = ((self.bytes - CONTROL_HEADER_BYTES) / CONSUMER_SLOT_BYTES) as u32;
        self.header().max_consumers.min(fits)
    }

    pub fn slot(&self, index: u32) -> Option<&ConsumerSlot> {
        if index >= self.slot_count() {
            return None;
        }
        let off = CONTROL_HEADER_BYTES + index as usize * CONSUMER_SLOT_BYTES;
        Some(unsafe { &*(self.base.add(off) as *const ConsumerSlot) })
    }

    /// # Safety
    /// Slot mutation is serialized by the registry lock (allocation) or
    /// owned by a single consumer (its own slot); the caller upholds that.
    pub unsafe fn slot_mut(&self, index: u32) -> Option<&mut ConsumerSlot> {
        if index >= self.slot_count() {
            return None;
        }
        let off = CONTROL_HEADER_BYTES + index as usize * CONSUMER_SLOT_BYTES;
        Some(&mut *(self.base.add(off) as *mut ConsumerSlot))
    }

    /// Zero the whole control region and write a fresh header. Discards
    /// any prior consumer registrations.
    ///
    /// # Safety
    /// The mapping must be writeable.
    pub unsafe fn initialize(&self, max_consumers: u32, new_sem_name: &str, reg_sem_name: &str) {
        ptr::write_bytes(self.base, 0, self.bytes);
        let h = self.header_mut();
        h.magic = MAGIC_CONTROL;
        h.version = super::layout::FORMAT_VERSION;
        h.align = MMQ_ALIGN;
        h.max_consumers = max_consumers;
        h.notify_seq = 0;
        super::layout::copy_name(&mut h.new_entries_sem_name, new_sem_name);
        super::layout::copy_name(&mut h.registry_lock_sem_name, reg_sem_name);
    }

    pub fn sane(&self) -> bool {
        let h = self.header();
        h.magic == MAGIC_CONTROL
            && h.version == super::layout::FORMAT_VERSION
            && h.align == MMQ_ALIGN
    }
}
