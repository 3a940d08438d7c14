use std::mem::offset_of;
use std::sync::atomic::AtomicI32;

/// SEGMENT LAYOUT:
///
/// A mailbox file is `HEADER_SIZE + capacity` bytes. The header page starts
/// with five 32-bit words in native byte order, the rest of the page is
/// padding, and the payload region starts at `HEADER_SIZE`.
///
/// ```text
/// 0     magic     MAGIC once initialized
/// 4     lock      0 = unlocked, otherwise the holder's private token
/// 8     msg_type  type tag of the stored message
/// 12    msg_id    id tag of the stored message
/// 16    data_len  payload length, EMPTY (-1) when the slot is free
/// 4096  payload   data_len bytes
/// ```
///
/// Every word except `lock` is only read or written while the section lock is
/// held. The lock word itself is the spinlock when native access is in use.
#[repr(C)]
pub struct Header {
    pub magic: AtomicI32,
    pub lock: AtomicI32,
    pub msg_type: AtomicI32,
    pub msg_id: AtomicI32,
    pub data_len: AtomicI32,
}

impl Header {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Format marker written once per segment lifetime.
pub const MAGIC: i32 = 0x0420_FFBE;

pub const MAGIC_OFFSET: usize = offset_of!(Header, magic);
pub const LOCK_OFFSET: usize = offset_of!(Header, lock);
pub const MSG_TYPE_OFFSET: usize = offset_of!(Header, msg_type);
pub const MSG_ID_OFFSET: usize = offset_of!(Header, msg_id);
pub const DATA_LEN_OFFSET: usize = offset_of!(Header, data_len);

/// Start of the payload region; the header occupies one full page.
pub const HEADER_SIZE: usize = 4096;

/// Default payload capacity in bytes.
pub const DEFAULT_CAPACITY: u32 = 4096;

/// Lock word value when nobody holds the section.
pub const UNLOCKED: i32 = 0;

/// `data_len` sentinel for an empty slot.
pub const EMPTY: i32 = -1;

/// Type tag of a message sent without one.
pub const TYPE_NONE: i32 = i32::MIN;

/// Id tag of a message sent without one.
pub const ID_NONE: i32 = i32::MIN;

/// Total file size for a mailbox of the given payload capacity.
pub const fn segment_size(capacity: usize) -> usize {
    HEADER_SIZE + capacity
}
