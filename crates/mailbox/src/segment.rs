use crate::errors::MailboxError;
use crate::layout::{HEADER_SIZE, Header, segment_size};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

/// A mapped mailbox file.
///
/// All access goes through raw pointers into the mapping: the same bytes are
/// mapped by other handles and other processes, so no Rust reference to the
/// payload region is ever handed out.
pub(crate) struct Segment {
    file: File,
    _mmap: MmapMut,
    base: *mut u8,
    capacity: usize,
}

// The mapping lives as long as the struct; the pointer is only derived from it.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Create or open the backing file and map `HEADER_SIZE + capacity` bytes.
    ///
    /// The file is extended when undersized and never shrunk, so a peer that
    /// mapped a larger segment keeps a valid mapping.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, MailboxError> {
        let size = segment_size(capacity);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.metadata()?.len() < size as u64 {
            file.set_len(size as u64)?;
        }

        let mut mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        let base = mmap.as_mut_ptr();

        Ok(Self {
            file,
            _mmap: mmap,
            base,
            capacity,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn word(&self, offset: usize) -> &AtomicI32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= Header::SIZE,
            "header word offset {offset} out of range"
        );
        // The mapping is page aligned and the offset is a 4-byte multiple.
        unsafe { &*(self.base.add(offset) as *const AtomicI32) }
    }

    pub fn read_i32(&self, offset: usize) -> i32 {
        self.word(offset).load(Ordering::Acquire)
    }

    pub fn write_i32(&self, offset: usize, value: i32) {
        self.word(offset).store(value, Ordering::Release);
    }

    /// Atomically replace `current` with `new` at `offset`.
    ///
    /// Returns the previous value on failure.
    pub fn compare_exchange_i32(&self, offset: usize, current: i32, new: i32) -> Result<i32, i32> {
        self.word(offset)
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
    }

    fn payload_ptr(&self, index: usize, len: usize) -> *mut u8 {
        assert!(
            index + len <= self.capacity,
            "payload access {index}..{} beyond capacity {}",
            index + len,
            self.capacity
        );
        unsafe { self.base.add(HEADER_SIZE + index) }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn read_byte(&self, index: usize) -> u8 {
        unsafe { ptr::read_volatile(self.payload_ptr(index, 1)) }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn write_byte(&self, index: usize, value: u8) {
        unsafe { ptr::write_volatile(self.payload_ptr(index, 1), value) }
    }

    /// Copy the first `len` payload bytes out of the segment.
    pub fn read_payload(&self, len: usize) -> Vec<u8> {
        let src = self.payload_ptr(0, len);
        let mut data = vec![0u8; len];
        unsafe { ptr::copy_nonoverlapping(src, data.as_mut_ptr(), len) };
        data
    }

    /// Copy `data` to the start of the payload region.
    pub fn write_payload(&self, data: &[u8]) {
        let dst = self.payload_ptr(0, data.len());
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
    }

    pub fn zero_payload(&self) {
        let dst = self.payload_ptr(0, self.capacity);
        unsafe { ptr::write_bytes(dst, 0, self.capacity) };
    }
}
