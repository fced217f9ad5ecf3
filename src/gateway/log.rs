use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::{info, warn};

use super::{DeliveredMessage, GatewayError, GatewayResult, MemberFilter, MemberRef, MessagingGateway};

/// Offline gateway: outgoing traffic is written to the log and attachments
/// are plain files inside a local directory.
///
/// Used when no bridge is configured, so the service can run (and be
/// exercised through the HTTP surface) without a chat platform.
#[derive(Debug, Clone)]
pub struct LogGateway {
    attachments_dir: Arc<PathBuf>,
    next_message_id: Arc<AtomicU64>,
}

impl LogGateway {
    /// Resolve attachment references as file names under `attachments_dir`.
    pub fn new(attachments_dir: impl Into<PathBuf>) -> Self {
        Self {
            attachments_dir: Arc::new(attachments_dir.into()),
            next_message_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn attachment_path(&self, attachment: &str) -> GatewayResult<PathBuf> {
        // References are bare file names; anything path-like is refused.
        if attachment.is_empty() || attachment.contains(['/', '\\']) || attachment.starts_with('.')
        {
            return Err(GatewayError::AttachmentMissing(attachment.to_owned()));
        }
        Ok(self.attachments_dir.join(attachment))
    }
}

impl MessagingGateway for LogGateway {
    fn send_message(
        &self,
        channel: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<DeliveredMessage>> {
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed).to_string();
        info!(%channel, message_id = %id, ?attachment, %text, "send message");
        Box::pin(async move { Ok(DeliveredMessage { id }) })
    }

    fn send_direct(
        &self,
        member: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        info!(%member, ?attachment, %text, "send direct message");
        Box::pin(async { Ok(()) })
    }

    fn edit_message(
        &self,
        channel: &str,
        message: &str,
        text: &str,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        info!(%channel, %message, %text, "edit message");
        Box::pin(async { Ok(()) })
    }

    fn fetch_members(
        &self,
        filter: MemberFilter,
    ) -> BoxFuture<'static, GatewayResult<Vec<MemberRef>>> {
        info!(?filter, "member listing unavailable offline");
        Box::pin(async { Ok(Vec::new()) })
    }

    fn release_attachment(&self, attachment: &str) -> BoxFuture<'static, GatewayResult<()>> {
        let path = self.attachment_path(attachment);
        Box::pin(async move {
            let path = path?;
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    warn!(path = %path.display(), "attachment already released");
                    Ok(())
                }
                Err(err) => Err(GatewayError::transport("release_attachment", err)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn released_attachments_leave_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sol.png");
        std::fs::write(&path, b"png").unwrap();
        let gateway = LogGateway::new(dir.path());

        gateway.release_attachment("sol.png").await.unwrap();
        assert!(!path.exists());
        assert!(gateway.release_attachment("sol.png").await.is_ok());
    }

    #[tokio::test]
    async fn path_like_references_are_refused() {
        let gateway = LogGateway::new("/tmp");
        assert!(matches!(
            gateway.release_attachment("../etc/passwd").await,
            Err(GatewayError::AttachmentMissing(_))
        ));
    }

    #[tokio::test]
    async fn message_ids_are_distinct() {
        let gateway = LogGateway::new("/tmp");
        let first = gateway.send_message("1", "a", None).await.unwrap();
        let second = gateway.send_message("1", "b", None).await.unwrap();
        assert_ne!(first.id, second.id);
    }
}
