use crate::layout::{ID_NONE, TYPE_NONE};
use std::fmt;

/// One message as stored in the mailbox slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    pub msg_type: i32,
    pub id: i32,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(msg_type: i32, id: i32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            msg_type,
            id,
            data: data.into(),
        }
    }

    /// A message with both tags unset.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::new(TYPE_NONE, ID_NONE, data)
    }

    pub fn has_type(&self) -> bool {
        self.msg_type != TYPE_NONE
    }

    pub fn has_id(&self) -> bool {
        self.id != ID_NONE
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message[type=")?;
        if self.has_type() {
            write!(f, "{}", self.msg_type)?;
        } else {
            write!(f, "NONE")?;
        }
        write!(f, " id=")?;
        if self.has_id() {
            write!(f, "{}", self.id)?;
        } else {
            write!(f, "NONE")?;
        }
        write!(f, " len={}]", self.data.len())
    }
}
