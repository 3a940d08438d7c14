//! Two-process mailbox throughput benchmark.
//!
//! Without a subcommand the binary acts as master: it spawns two copies of
//! itself as workers. Each worker writes a numbered stream into one mailbox
//! while reading the other worker's stream from the second mailbox.

mod config;
mod master;
mod worker;

use clap::Parser;
use common::{Environment, setup_logging};
use config::{Cli, END_MARKER, Role};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(Environment::from_env());

    let dir = cli.dir();
    let config = cli.mailbox_config();

    match &cli.role {
        None => {
            tracing::info!(
                "Starting master (total={}, access={}, dir={})",
                cli.total,
                config.access.as_str(),
                dir.display()
            );
            master::run(&dir, cli.total, &config, cli.start_delay_ms)
        }
        Some(Role::Worker {
            write,
            read,
            start_at,
        }) => {
            let result = worker::run(&dir, write, read, config, cli.total, *start_at);
            if let Err(e) = &result {
                tracing::error!("Worker {} failed: {:#}", write, e);
            }
            println!("{END_MARKER}");
            result
        }
    }
}
