//! Leaves "hello world" in an empty mailbox, or prints the message a previous
//! run left behind.

mod config;

use anyhow::Context;
use common::setup_logging;
use config::HelloConfig;
use mailbox::Mailbox;

fn main() -> anyhow::Result<()> {
    let config = HelloConfig::from_env();
    setup_logging(config.environment.clone());

    let mailbox = Mailbox::build(&config.path, config.mailbox)
        .with_context(|| format!("Failed to open mailbox {}", config.path.display()))?;

    if mailbox.is_empty()? {
        mailbox.send(b"hello world")?;
        tracing::info!("Left a message in {}", config.path.display());
    } else {
        let msg = mailbox.recv()?;
        tracing::info!("msg={}", msg);
        println!("data={}", String::from_utf8_lossy(&msg.data));
    }

    mailbox.close()?;
    Ok(())
}
