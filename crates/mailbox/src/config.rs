use crate::layout::DEFAULT_CAPACITY;
use crate::retry::{RetryConfig, WaitPolicy};
use std::env;
use std::str::FromStr;

/// How a handle guards the segment against other handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Spinlock on the lock word of the mapped header.
    Native,
    /// Exclusive advisory lock on the backing file.
    FileLock,
}

impl AccessMode {
    /// The mode `auto` resolves to.
    ///
    /// The header is accessed through `AtomicI32`, so every target this crate
    /// builds for has lock-free 32-bit atomics on shared mappings and native
    /// access is always available. File locking is an explicit choice.
    pub const fn detect() -> Self {
        AccessMode::Native
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Native => "native",
            AccessMode::FileLock => "filelock",
        }
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" | "spin" => Ok(AccessMode::Native),
            "filelock" | "flock" | "file" => Ok(AccessMode::FileLock),
            "auto" => Ok(AccessMode::detect()),
            other => Err(format!(
                "{other} is not a supported access mode. Use `native`, `filelock` or `auto`."
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxConfig {
    /// Payload capacity in bytes, excluding the header page.
    pub capacity: u32,
    pub access: AccessMode,
    pub wait: WaitPolicy,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            access: AccessMode::detect(),
            wait: WaitPolicy::Unbounded,
        }
    }
}

impl MailboxConfig {
    /// Read `MAILBOX_CAPACITY`, `MAILBOX_ACCESS` and `MAILBOX_WAIT_ATTEMPTS`,
    /// falling back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let capacity = env::var("MAILBOX_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.capacity);

        let access = match env::var("MAILBOX_ACCESS") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("Ignoring MAILBOX_ACCESS: {}", e);
                defaults.access
            }),
            Err(_) => defaults.access,
        };

        let wait = env::var("MAILBOX_WAIT_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(|max_attempts| {
                WaitPolicy::Bounded(RetryConfig {
                    max_attempts,
                    ..RetryConfig::default()
                })
            })
            .unwrap_or(defaults.wait);

        Self {
            capacity,
            access,
            wait,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}
