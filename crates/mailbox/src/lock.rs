//! Cross-process exclusion over a mapped segment.
//!
//! Two strategies, fixed when the mailbox is opened:
//!
//! - **Spin**: compare-and-swap the header lock word from `UNLOCKED` to the
//!   handle's private token, yielding between attempts. Fast, but a process
//!   that dies while holding the token leaves the segment locked for good.
//! - **Advisory**: exclusive `flock(2)` on the backing file. Waiters sleep in
//!   the kernel and the lock is dropped when the holder exits.

use crate::config::AccessMode;
use crate::errors::MailboxError;
use crate::layout::{LOCK_OFFSET, UNLOCKED};
use crate::retry::WaitPolicy;
use crate::segment::Segment;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::File;

/// Draw a nonzero token identifying one handle in the lock word.
pub(crate) fn private_token() -> i32 {
    loop {
        let token = fastrand::i32(..);
        if token != UNLOCKED {
            return token;
        }
    }
}

pub(crate) enum LockCoordinator {
    Spin { token: i32 },
    Advisory { file: Option<File> },
}

impl LockCoordinator {
    pub fn new(mode: AccessMode, token: i32, segment: &Segment) -> Result<Self, MailboxError> {
        match mode {
            AccessMode::Native => Ok(LockCoordinator::Spin { token }),
            AccessMode::FileLock => Ok(LockCoordinator::Advisory {
                file: Some(segment.file().try_clone()?),
            }),
        }
    }

    /// Enter the critical section, waiting according to `wait`.
    pub fn acquire<'a>(
        &'a mut self,
        segment: &'a Segment,
        wait: &WaitPolicy,
    ) -> Result<SectionGuard<'a>, MailboxError> {
        match self {
            LockCoordinator::Spin { token } => {
                let token = *token;
                let mut attempt = 0;
                while segment
                    .compare_exchange_i32(LOCK_OFFSET, UNLOCKED, token)
                    .is_err()
                {
                    wait.pause(attempt)?;
                    attempt = attempt.saturating_add(1);
                }
                Ok(SectionGuard {
                    held: Held::Spin { segment, token },
                })
            }
            LockCoordinator::Advisory { file } => {
                let flock = lock_file(file, wait)?;
                Ok(SectionGuard {
                    held: Held::Advisory { slot: file, flock },
                })
            }
        }
    }
}

fn lock_file(slot: &mut Option<File>, wait: &WaitPolicy) -> Result<Flock<File>, MailboxError> {
    // The slot is only empty while a guard holds the lock, and guards borrow
    // the coordinator mutably.
    let Some(file) = slot.take() else {
        return Err(MailboxError::IoError(std::io::Error::other(
            "advisory lock file missing",
        )));
    };

    let arg = match wait {
        WaitPolicy::Unbounded => FlockArg::LockExclusive,
        WaitPolicy::Bounded(_) => FlockArg::LockExclusiveNonblock,
    };

    let mut file = file;
    let mut attempt = 0;
    loop {
        match Flock::lock(file, arg) {
            Ok(flock) => return Ok(flock),
            Err((returned, errno)) if is_transient(errno) => {
                file = returned;
                if let Err(e) = wait.pause(attempt) {
                    *slot = Some(file);
                    return Err(e);
                }
                attempt = attempt.saturating_add(1);
            }
            Err((returned, errno)) => {
                *slot = Some(returned);
                return Err(errno.into());
            }
        }
    }
}

/// A signal interrupting the wait, or a held lock on a non-blocking attempt.
fn is_transient(errno: Errno) -> bool {
    matches!(errno, Errno::EINTR | Errno::EWOULDBLOCK)
}

/// Take back a file whose unlock failed without dropping the `Flock`, which
/// would retry the unlock and panic.
fn reclaim(flock: Flock<File>) -> Option<File> {
    let file = flock.try_clone().ok();
    // Leaks one descriptor; the lock goes with it when the process exits.
    std::mem::forget(flock);
    file
}

enum Held<'a> {
    Spin {
        segment: &'a Segment,
        token: i32,
    },
    Advisory {
        slot: &'a mut Option<File>,
        flock: Flock<File>,
    },
    Released,
}

/// A held critical section. Dropping it releases the lock.
pub(crate) struct SectionGuard<'a> {
    held: Held<'a>,
}

impl SectionGuard<'_> {
    /// Leave the critical section, reporting any failure.
    pub fn release(mut self) -> Result<(), MailboxError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), MailboxError> {
        match std::mem::replace(&mut self.held, Held::Released) {
            Held::Spin { segment, token } => segment
                .compare_exchange_i32(LOCK_OFFSET, token, UNLOCKED)
                .map(|_| ())
                .map_err(|found| MailboxError::LockLost { found }),
            Held::Advisory { slot, flock } => match flock.unlock() {
                Ok(file) => {
                    *slot = Some(file);
                    Ok(())
                }
                Err((flock, errno)) => {
                    *slot = reclaim(flock);
                    Err(errno.into())
                }
            },
            Held::Released => Ok(()),
        }
    }
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!("Failed to release mailbox lock: {}", e);
        }
    }
}
