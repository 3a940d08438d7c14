//! Header and payload transitions of the mailbox slot.
//!
//! Every function here expects the caller to hold the section lock.

use crate::errors::MailboxError;
use crate::layout::{
    DATA_LEN_OFFSET, EMPTY, ID_NONE, MAGIC, MAGIC_OFFSET, MSG_ID_OFFSET, MSG_TYPE_OFFSET,
    TYPE_NONE,
};
use crate::message::Message;
use crate::segment::Segment;

/// Reject payloads that do not fit the slot. Called before taking any lock.
pub(crate) fn check_capacity(len: usize, capacity: usize) -> Result<(), MailboxError> {
    if len > capacity {
        return Err(MailboxError::PayloadTooLarge { len, capacity });
    }
    Ok(())
}

fn reset_header(segment: &Segment) {
    segment.write_i32(MSG_TYPE_OFFSET, TYPE_NONE);
    segment.write_i32(MSG_ID_OFFSET, ID_NONE);
    segment.write_i32(DATA_LEN_OFFSET, EMPTY);
    segment.write_i32(MAGIC_OFFSET, MAGIC);
}

/// Initialize the header unless a valid magic is already present.
///
/// Returns true when the header was (re)written. Whatever the segment held
/// before is discarded.
pub(crate) fn init_header(segment: &Segment) -> bool {
    if segment.read_i32(MAGIC_OFFSET) == MAGIC {
        return false;
    }
    reset_header(segment);
    true
}

/// Zero the payload region and reset the header to an empty slot.
pub(crate) fn wipe(segment: &Segment) {
    segment.zero_payload();
    reset_header(segment);
}

pub(crate) fn is_empty(segment: &Segment) -> bool {
    segment.read_i32(DATA_LEN_OFFSET) == EMPTY
}

/// Store a message in an empty slot. The payload must already have passed
/// `check_capacity`.
pub(crate) fn encode(segment: &Segment, msg_type: i32, id: i32, payload: &[u8]) {
    segment.write_i32(MSG_TYPE_OFFSET, msg_type);
    segment.write_i32(MSG_ID_OFFSET, id);
    // check_capacity bounds the length by a capacity that fits in i32
    segment.write_i32(DATA_LEN_OFFSET, payload.len() as i32);
    segment.write_payload(payload);
}

/// Read the stored message without consuming it.
pub(crate) fn decode(segment: &Segment) -> Result<Option<Message>, MailboxError> {
    let data_len = segment.read_i32(DATA_LEN_OFFSET);
    if data_len == EMPTY {
        return Ok(None);
    }
    let len = usize::try_from(data_len)
        .ok()
        .filter(|len| *len <= segment.capacity())
        .ok_or(MailboxError::CorruptSegment { data_len })?;

    Ok(Some(Message {
        msg_type: segment.read_i32(MSG_TYPE_OFFSET),
        id: segment.read_i32(MSG_ID_OFFSET),
        data: segment.read_payload(len),
    }))
}

/// Read the stored message and mark the slot empty.
pub(crate) fn take(segment: &Segment) -> Result<Option<Message>, MailboxError> {
    let message = decode(segment)?;
    if message.is_some() {
        segment.write_i32(DATA_LEN_OFFSET, EMPTY);
    }
    Ok(message)
}
