use crate::config::{A_TO_B, B_TO_A, END_MARKER, mailbox_path};
use crate::worker::unix_millis;
use anyhow::{Context, bail};
use mailbox::{AccessMode, Mailbox, MailboxConfig};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};

fn clean_mailbox(dir: &Path, name: &str, config: &MailboxConfig) -> anyhow::Result<()> {
    let path = mailbox_path(dir, name);
    Mailbox::build(&path, config.clone())
        .and_then(|mailbox| mailbox.clean())
        .with_context(|| format!("Failed to clean mailbox {}", path.display()))
}

fn spawn_worker(
    dir: &Path,
    total: u32,
    access: AccessMode,
    write: &str,
    read: &str,
    start_at: u64,
) -> anyhow::Result<Child> {
    let exe = std::env::current_exe().context("Cannot locate the pingpong executable")?;
    Command::new(exe)
        .arg("--total")
        .arg(total.to_string())
        .arg("--access")
        .arg(access.as_str())
        .arg("--dir")
        .arg(dir)
        .arg("worker")
        .args(["--write", write, "--read", read])
        .arg("--start-at")
        .arg(start_at.to_string())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn worker {write}"))
}

/// Echo a worker's report lines until it prints the end marker.
fn forward_output(label: &str, child: &mut Child) -> anyhow::Result<()> {
    let stdout = child.stdout.take().context("Worker stdout not captured")?;
    for line in BufReader::new(stdout).lines() {
        let line = line?;
        if line == END_MARKER {
            break;
        }
        println!("{label}={line}");
    }
    Ok(())
}

/// Spawn two workers with crossed mailboxes, relay their reports and clean
/// both mailboxes afterwards.
pub fn run(
    dir: &Path,
    total: u32,
    config: &MailboxConfig,
    start_delay_ms: u64,
) -> anyhow::Result<()> {
    println!("TOTAL={total}");

    // Stale messages from an aborted run would break the order check
    for name in [A_TO_B, B_TO_A] {
        clean_mailbox(dir, name, config)?;
    }

    let start_at = unix_millis()? + start_delay_ms;
    let mut first = spawn_worker(dir, total, config.access, A_TO_B, B_TO_A, start_at)?;
    let mut second = spawn_worker(dir, total, config.access, B_TO_A, A_TO_B, start_at)?;

    forward_output("in1", &mut first)?;
    forward_output("in2", &mut second)?;

    let first_status = first.wait()?;
    let second_status = second.wait()?;

    println!("cleaning IPC");
    for name in [A_TO_B, B_TO_A] {
        clean_mailbox(dir, name, config)?;
    }

    if !first_status.success() || !second_status.success() {
        bail!("Worker failed: first={first_status}, second={second_status}");
    }
    println!("ending master");
    Ok(())
}
