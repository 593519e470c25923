//! On-disk mailboxes, one directory per recipient local-part

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use log::{error, info};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::routing::{Delivery, RouteTable};
use crate::session::Session;

/// What happened to each recipient of one message.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub stored: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

pub struct MailStore {
    root: PathBuf,
    routes: Arc<RouteTable>,
    sequence: AtomicU64,
}

impl MailStore {
    pub fn new(root: impl Into<PathBuf>, routes: Arc<RouteTable>) -> Self {
        Self {
            root: root.into(),
            routes,
            sequence: AtomicU64::new(0),
        }
    }

    /// Writes one copy of the session's message per local recipient.
    /// A failure for one recipient is logged and does not stop the others.
    pub async fn persist(&self, session: &Session) -> DeliveryReport {
        let message = render_message(session);
        let mut report = DeliveryReport::default();

        for recipient in &session.recipient_mail {
            if self.routes.classify(recipient) == Delivery::Remote {
                info!("Not local delivery, skipping save for: {}", recipient);
                report.skipped.push(recipient.clone());
                continue;
            }

            match self.deliver(recipient, &message).await {
                Ok(path) => {
                    info!("Mail saved to {}", path.display());
                    report.stored.push(path);
                }
                Err(e) => {
                    error!("Failed to store mail for {}: {:#}", recipient, e);
                    report.failed.push(recipient.clone());
                }
            }
        }

        report
    }

    async fn deliver(&self, recipient: &str, message: &[u8]) -> Result<PathBuf> {
        let dir = self.root.join(mailbox_name(recipient)?);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create mailbox directory {:?}", dir))?;

        loop {
            let path = dir.join(self.next_file_name());
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {:?}", path))
                }
            };

            file.write_all(message)
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            file.flush().await?;
            return Ok(path);
        }
    }

    fn next_file_name(&self) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}_{:06}.mail", timestamp, sequence)
    }
}

/// The stored form of a message. Headers are the same for every recipient;
/// the body bytes follow untouched.
pub fn render_message(session: &Session) -> Vec<u8> {
    let headers = format!(
        "From: {}\r\nTo: {}\r\n\r\n",
        session.sender_mail,
        session.recipient_mail.join(", ")
    );
    let mut message = Vec::with_capacity(headers.len() + session.body.len());
    message.extend_from_slice(headers.as_bytes());
    message.extend_from_slice(&session.body);
    message
}

/// Directory name for a recipient: its local-part, which must be usable as a
/// single path component under the storage root.
fn mailbox_name(recipient: &str) -> Result<&str> {
    let user = recipient.split('@').next().unwrap_or_default();
    if user.is_empty()
        || user == "."
        || user == ".."
        || user.contains(&['/', '\\', '\0'][..])
    {
        return Err(anyhow!("invalid mailbox name {:?}", user));
    }
    Ok(user)
}
