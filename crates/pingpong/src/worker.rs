use crate::config::QUIT;
use anyhow::{Context, bail};
use mailbox::{Mailbox, MailboxConfig};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub name: String,
    pub total: u32,
    pub elapsed: Duration,
}

impl Report {
    pub fn per_ms(&self) -> f64 {
        let millis = self.elapsed.as_secs_f64() * 1000.0;
        if millis == 0.0 {
            return f64::INFINITY;
        }
        self.total as f64 / millis
    }

    pub fn line(&self) -> String {
        format!(
            "{} total={} millis={}ms micros={}us nanos={}ns speed(r/ms)={:.0}",
            self.name,
            self.total,
            self.elapsed.as_millis(),
            self.elapsed.as_micros(),
            self.elapsed.as_nanos(),
            self.per_ms()
        )
    }
}

pub fn unix_millis() -> anyhow::Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("Time went backwards")?;
    Ok(now.as_millis() as u64)
}

fn wait_until(start_at: u64) -> anyhow::Result<()> {
    while unix_millis()? < start_at {
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

/// Send `0..total` as decimal text, then the quit marker.
pub fn write_stream(
    path: &Path,
    name: &str,
    config: MailboxConfig,
    total: u32,
    start_at: u64,
) -> anyhow::Result<Report> {
    let mailbox = Mailbox::build(path, config)
        .with_context(|| format!("Failed to open mailbox {}", path.display()))?;
    wait_until(start_at)?;

    let started = Instant::now();
    for i in 0..total {
        mailbox.send(i.to_string().as_bytes())?;
    }
    mailbox.send(QUIT)?;
    let elapsed = started.elapsed();

    mailbox.close()?;
    Ok(Report {
        name: name.to_string(),
        total,
        elapsed,
    })
}

/// Receive until the quit marker, checking that every number arrives once
/// and in order.
pub fn read_stream(
    path: &Path,
    name: &str,
    config: MailboxConfig,
    total: u32,
    start_at: u64,
) -> anyhow::Result<Report> {
    let mailbox = Mailbox::build(path, config)
        .with_context(|| format!("Failed to open mailbox {}", path.display()))?;
    wait_until(start_at)?;

    let started = Instant::now();
    let mut expected: u32 = 0;
    loop {
        let msg = mailbox.recv()?;
        if msg.data == QUIT {
            break;
        }
        let text = std::str::from_utf8(&msg.data).context("Message is not valid UTF-8")?;
        let value: u32 = text
            .parse()
            .with_context(|| format!("Unexpected message {text:?}"))?;
        if value != expected {
            bail!("{name}: expected message {expected}, got {value}");
        }
        expected += 1;
    }
    let elapsed = started.elapsed();

    if expected != total {
        bail!("{name}: received {expected} messages, expected {total}");
    }

    mailbox.close()?;
    Ok(Report {
        name: name.to_string(),
        total,
        elapsed,
    })
}

/// Run the writer and reader halves of one worker concurrently and print a
/// report line for each.
pub fn run(
    dir: &Path,
    write: &str,
    read: &str,
    config: MailboxConfig,
    total: u32,
    start_at: u64,
) -> anyhow::Result<()> {
    let write_path = crate::config::mailbox_path(dir, write);
    let read_path = crate::config::mailbox_path(dir, read);

    let (written, received) = thread::scope(|s| {
        let writer = s.spawn(|| write_stream(&write_path, write, config.clone(), total, start_at));
        let reader = s.spawn(|| read_stream(&read_path, read, config.clone(), total, start_at));
        (writer.join(), reader.join())
    });

    let written = written.map_err(|_| anyhow::anyhow!("Writer thread panicked"))??;
    let received = received.map_err(|_| anyhow::anyhow!("Reader thread panicked"))??;

    for report in [&written, &received] {
        tracing::info!("{}", report.line());
        println!("{}", report.line());
    }
    Ok(())
}
