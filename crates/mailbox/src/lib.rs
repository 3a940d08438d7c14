//! Single-slot message mailbox shared between processes through a
//! memory-mapped file.
//!
//! ```no_run
//! use mailbox::{Mailbox, MailboxConfig};
//!
//! let mailbox = Mailbox::build("/tmp/ipc.tmp", MailboxConfig::default())?;
//! if mailbox.is_empty()? {
//!     mailbox.send(b"hello world")?;
//! } else {
//!     let msg = mailbox.recv()?;
//!     println!("{msg}");
//! }
//! mailbox.close()?;
//! # Ok::<(), mailbox::MailboxError>(())
//! ```

mod codec;
pub mod config;
pub mod errors;
pub mod layout;
mod lock;
pub mod mailbox;
pub mod message;
pub mod retry;
mod segment;

pub use config::{AccessMode, MailboxConfig};
pub use errors::MailboxError;
pub use layout::{DEFAULT_CAPACITY, HEADER_SIZE, ID_NONE, TYPE_NONE};
pub use mailbox::Mailbox;
pub use message::Message;
pub use retry::{RetryConfig, WaitPolicy};
