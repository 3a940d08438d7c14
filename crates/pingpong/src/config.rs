use clap::{Parser, Subcommand};
use mailbox::{AccessMode, MailboxConfig};
use std::path::{Path, PathBuf};

/// Name of the mailbox carrying messages from the first worker to the second.
pub const A_TO_B: &str = "AtoB";
/// Name of the mailbox carrying messages from the second worker to the first.
pub const B_TO_A: &str = "BtoA";

/// Payload that tells a reader the stream is over.
pub const QUIT: &[u8] = b"quit";

/// Line a worker prints on stdout once both of its threads are done.
pub const END_MARKER: &str = "end";

#[derive(Parser, Debug)]
#[command(
    name = "pingpong",
    about = "Measure mailbox throughput between two processes exchanging numbered messages"
)]
pub struct Cli {
    /// Messages each worker sends
    #[arg(long, default_value_t = 1_000_000)]
    pub total: u32,

    /// Locking strategy: native, filelock or auto
    #[arg(long, default_value = "auto")]
    pub access: AccessMode,

    /// Directory holding the mailbox files (defaults to the system temp dir)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Delay between spawning the workers and starting the clock
    #[arg(long, default_value_t = 2000)]
    pub start_delay_ms: u64,

    #[command(subcommand)]
    pub role: Option<Role>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Run one side of the exchange (spawned by the master)
    #[command(hide = true)]
    Worker {
        /// Mailbox this worker writes to
        #[arg(long)]
        write: String,
        /// Mailbox this worker reads from
        #[arg(long)]
        read: String,
        /// Unix time in milliseconds at which both workers start
        #[arg(long)]
        start_at: u64,
    },
}

impl Cli {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn mailbox_config(&self) -> MailboxConfig {
        MailboxConfig::from_env().with_access(self.access)
    }
}

/// Backing file of the named mailbox inside `dir`.
pub fn mailbox_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("mmap.{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_defaults() {
        let cli = Cli::parse_from(["pingpong"]);
        assert_eq!(cli.total, 1_000_000);
        assert_eq!(cli.access, AccessMode::detect());
        assert_eq!(cli.start_delay_ms, 2000);
        assert_eq!(cli.role, None);
        assert_eq!(cli.dir(), std::env::temp_dir());
    }

    #[test]
    fn test_worker_arguments() {
        let cli = Cli::parse_from([
            "pingpong",
            "--total",
            "10",
            "--access",
            "filelock",
            "--dir",
            "/tmp/pp",
            "worker",
            "--write",
            A_TO_B,
            "--read",
            B_TO_A,
            "--start-at",
            "1700000000000",
        ]);

        assert_eq!(cli.total, 10);
        assert_eq!(cli.access, AccessMode::FileLock);
        assert_eq!(cli.dir(), PathBuf::from("/tmp/pp"));
        assert_eq!(
            cli.role,
            Some(Role::Worker {
                write: A_TO_B.to_string(),
                read: B_TO_A.to_string(),
                start_at: 1_700_000_000_000,
            })
        );
    }

    #[test]
    fn test_rejects_unknown_access_mode() {
        assert!(Cli::try_parse_from(["pingpong", "--access", "mutex"]).is_err());
    }

    #[test]
    fn test_mailbox_path() {
        assert_eq!(
            mailbox_path(Path::new("/tmp"), A_TO_B),
            PathBuf::from("/tmp/mmap.AtoB.tmp")
        );
    }
}
