use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Mailbox is already open")]
    AlreadyOpen,

    #[error("Mailbox is not open")]
    NotOpen,

    #[error("Payload of {len} bytes exceeds mailbox capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("Corrupt segment: data length {data_len} is out of range")]
    CorruptSegment { data_len: i32 },

    #[error("Lock word holds {found}, not this handle's token")]
    LockLost { found: i32 },

    #[error("Gave up waiting after {attempts} attempts")]
    Timeout { attempts: u32 },
}

impl From<nix::errno::Errno> for MailboxError {
    fn from(errno: nix::errno::Errno) -> Self {
        MailboxError::IoError(errno.into())
    }
}
