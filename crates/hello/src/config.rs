use mailbox::MailboxConfig;
use std::env;
use std::path::PathBuf;

pub use common::Environment;

pub const DEFAULT_MAILBOX_PATH: &str = "/tmp/ipc.tmp";

#[derive(Debug, Clone)]
pub struct HelloConfig {
    pub environment: Environment,
    pub path: PathBuf,
    pub mailbox: MailboxConfig,
}

impl HelloConfig {
    pub fn from_env() -> Self {
        let path = env::var("MAILBOX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MAILBOX_PATH));

        Self {
            environment: Environment::from_env(),
            path,
            mailbox: MailboxConfig::from_env(),
        }
    }
}
