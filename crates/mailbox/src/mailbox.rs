use crate::codec;
use crate::config::{AccessMode, MailboxConfig};
use crate::errors::MailboxError;
use crate::layout::{ID_NONE, TYPE_NONE, segment_size};
use crate::lock::{LockCoordinator, private_token};
use crate::message::Message;
use crate::retry::WaitPolicy;
use crate::segment::Segment;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct OpenMailbox {
    segment: Segment,
    lock: LockCoordinator,
}

/// A single-slot mailbox shared through a memory-mapped file.
///
/// Every operation first takes the handle's own mutex, then the cross-process
/// section lock, so one handle can be shared between threads (e.g. in an
/// `Arc`) and any number of handles, in this process or others, can use the
/// same file.
///
/// Blocking `put`/`get` wait until the slot changes state. With the default
/// `WaitPolicy::Unbounded` that wait has no limit: a peer that never drains
/// or fills the slot, or that died holding the spinlock, hangs the caller.
/// Use the non-blocking variants or a bounded wait policy when a deadline
/// matters.
pub struct Mailbox {
    path: PathBuf,
    config: MailboxConfig,
    token: i32,
    state: Mutex<Option<OpenMailbox>>,
}

impl Mailbox {
    /// Bind a closed handle to `path`. Nothing touches the filesystem until
    /// `open`.
    pub fn new(path: impl AsRef<Path>, config: MailboxConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            token: private_token(),
            state: Mutex::new(None),
        }
    }

    /// Create a handle and open it.
    pub fn build(path: impl AsRef<Path>, config: MailboxConfig) -> Result<Self, MailboxError> {
        let mailbox = Self::new(path, config);
        mailbox.open()?;
        Ok(mailbox)
    }

    fn state(&self) -> MutexGuard<'_, Option<OpenMailbox>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity as usize
    }

    /// Size of the backing file: header page plus capacity.
    pub fn segment_size(&self) -> usize {
        segment_size(self.capacity())
    }

    pub fn access_mode(&self) -> AccessMode {
        self.config.access
    }

    pub fn is_open(&self) -> bool {
        self.state().is_some()
    }

    /// Create or extend the backing file, map it and initialize the header if
    /// no valid magic is present.
    pub fn open(&self) -> Result<(), MailboxError> {
        let mut state = self.state();
        if state.is_some() {
            return Err(MailboxError::AlreadyOpen);
        }
        if i32::try_from(self.config.capacity).is_err() {
            return Err(MailboxError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("capacity {} does not fit the header", self.config.capacity),
            )));
        }

        let segment = Segment::open(&self.path, self.capacity())?;
        let mut lock = LockCoordinator::new(self.config.access, self.token, &segment)?;

        let guard = lock.acquire(&segment, &self.config.wait)?;
        if codec::init_header(&segment) {
            tracing::debug!("Initialized mailbox header at {}", self.path.display());
        }
        guard.release()?;

        tracing::debug!(
            "Opened mailbox {} (capacity={}, access={})",
            self.path.display(),
            self.config.capacity,
            self.config.access.as_str()
        );
        *state = Some(OpenMailbox { segment, lock });
        Ok(())
    }

    /// Unmap the segment. The file and its contents stay as they are.
    pub fn close(&self) -> Result<(), MailboxError> {
        let mut state = self.state();
        if state.take().is_none() {
            return Err(MailboxError::NotOpen);
        }
        tracing::debug!("Closed mailbox {}", self.path.display());
        Ok(())
    }

    /// Zero the payload, reset the header, close the handle and delete the
    /// backing file. Pending messages are lost.
    pub fn clean(&self) -> Result<(), MailboxError> {
        let mut state = self.state();
        let OpenMailbox { segment, lock } = state.as_mut().ok_or(MailboxError::NotOpen)?;

        let guard = lock.acquire(segment, &self.config.wait)?;
        codec::wipe(segment);
        guard.release()?;

        *state = None;
        fs::remove_file(&self.path)?;
        tracing::debug!("Cleaned mailbox {}", self.path.display());
        Ok(())
    }

    /// Whether the slot is free.
    pub fn is_empty(&self) -> Result<bool, MailboxError> {
        let mut state = self.state();
        let OpenMailbox { segment, lock } = state.as_mut().ok_or(MailboxError::NotOpen)?;

        let guard = lock.acquire(segment, &self.config.wait)?;
        let empty = codec::is_empty(segment);
        guard.release()?;
        Ok(empty)
    }

    /// Store a message in the slot.
    ///
    /// Returns `Ok(false)` when the slot is occupied and `blocking` is false.
    /// A blocking put waits until a reader drains the slot. Payloads larger
    /// than the capacity fail before any lock is taken.
    pub fn put(
        &self,
        msg_type: i32,
        id: i32,
        payload: &[u8],
        blocking: bool,
    ) -> Result<bool, MailboxError> {
        let mut state = self.state();
        let OpenMailbox { segment, lock } = state.as_mut().ok_or(MailboxError::NotOpen)?;
        codec::check_capacity(payload.len(), segment.capacity())?;

        let mut attempt = 0;
        loop {
            let guard = lock.acquire(segment, &self.config.wait)?;
            if codec::is_empty(segment) {
                codec::encode(segment, msg_type, id, payload);
                guard.release()?;
                return Ok(true);
            }
            guard.release()?;

            if !blocking {
                return Ok(false);
            }
            self.config.wait.pause(attempt)?;
            attempt = attempt.saturating_add(1);
        }
    }

    pub fn put_message(&self, message: &Message, blocking: bool) -> Result<bool, MailboxError> {
        self.put(message.msg_type, message.id, &message.data, blocking)
    }

    /// Blocking put of an untagged payload.
    pub fn send(&self, payload: &[u8]) -> Result<(), MailboxError> {
        self.send_tagged(TYPE_NONE, ID_NONE, payload)
    }

    /// Blocking put with type and id tags.
    pub fn send_tagged(&self, msg_type: i32, id: i32, payload: &[u8]) -> Result<(), MailboxError> {
        self.put(msg_type, id, payload, true).map(|_| ())
    }

    /// Take the message out of the slot.
    ///
    /// Returns `Ok(None)` when the slot is empty and `blocking` is false. A
    /// blocking get waits until a writer fills the slot.
    pub fn get(&self, blocking: bool) -> Result<Option<Message>, MailboxError> {
        if blocking {
            return self.recv().map(Some);
        }

        let mut state = self.state();
        let OpenMailbox { segment, lock } = state.as_mut().ok_or(MailboxError::NotOpen)?;
        take_once(segment, lock, &self.config.wait)
    }

    /// Blocking get.
    pub fn recv(&self) -> Result<Message, MailboxError> {
        let mut state = self.state();
        let OpenMailbox { segment, lock } = state.as_mut().ok_or(MailboxError::NotOpen)?;

        let mut attempt = 0;
        loop {
            if let Some(message) = take_once(segment, lock, &self.config.wait)? {
                return Ok(message);
            }
            self.config.wait.pause(attempt)?;
            attempt = attempt.saturating_add(1);
        }
    }
}

fn take_once(
    segment: &Segment,
    lock: &mut LockCoordinator,
    wait: &WaitPolicy,
) -> Result<Option<Message>, MailboxError> {
    let guard = lock.acquire(segment, wait)?;
    let taken = codec::take(segment);
    guard.release()?;
    taken
}
