//! Outbound side of the chat platform: messages, members and attachments.

mod log;
mod recording;
#[cfg(feature = "webhook-gateway")]
mod webhook;

pub use log::LogGateway;
pub use recording::{RecordedMessage, RecordingGateway};
#[cfg(feature = "webhook-gateway")]
pub use webhook::WebhookGateway;

use std::error::Error;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure talking to the chat platform.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never completed.
    #[error("gateway request `{operation}` failed")]
    Transport {
        /// Gateway call being made.
        operation: &'static str,
        /// Underlying client failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The platform answered with an error status.
    #[error("gateway request `{operation}` returned status {status}")]
    Status {
        /// Gateway call being made.
        operation: &'static str,
        /// HTTP-like status code.
        status: u16,
    },
    /// The referenced attachment is gone.
    #[error("attachment `{0}` not found")]
    AttachmentMissing(String),
    /// The platform refused the call (unknown channel, blocked DMs, ...).
    #[error("gateway rejected `{operation}`: {message}")]
    Rejected {
        /// Gateway call being made.
        operation: &'static str,
        /// Platform explanation.
        message: String,
    },
}

impl GatewayError {
    /// Wrap a transport failure.
    pub fn transport(operation: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        GatewayError::Transport {
            operation,
            source: Box::new(source),
        }
    }

    /// Build a rejection.
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        GatewayError::Rejected {
            operation,
            message: message.into(),
        }
    }
}

/// Identifier of a message the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredMessage {
    /// Platform message id.
    pub id: String,
}

/// Member of the community as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    /// Platform member id.
    pub id: String,
    /// Name shown in rankings and notifications.
    pub display_name: String,
    /// Role ids held by the member.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Selection applied by [`MessagingGateway::fetch_members`].
///
/// An empty filter selects every member; set criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    /// Keep members holding this role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Keep only these member ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,
}

impl MemberFilter {
    /// Members holding `role`.
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            member_ids: Vec::new(),
        }
    }

    /// Exactly the listed members (those still in the community).
    pub fn with_ids(member_ids: Vec<String>) -> Self {
        Self {
            role: None,
            member_ids,
        }
    }

    /// Whether `member` passes the filter.
    pub fn matches(&self, member: &MemberRef) -> bool {
        let role_ok = self
            .role
            .as_ref()
            .is_none_or(|role| member.roles.iter().any(|held| held == role));
        let id_ok = self.member_ids.is_empty() || self.member_ids.contains(&member.id);
        role_ok && id_ok
    }
}

/// Capability used to reach members and channels.
///
/// Attachments are opaque references owned by the gateway: the command
/// surface hands them in, the core stores them, and they are released once
/// the message carrying them went out (or was discarded).
pub trait MessagingGateway: Send + Sync {
    /// Post `text` in `channel`, optionally with an attachment.
    fn send_message(
        &self,
        channel: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<DeliveredMessage>>;
    /// Direct-message a member.
    fn send_direct(
        &self,
        member: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<()>>;
    /// Replace the content of a previously posted message.
    fn edit_message(
        &self,
        channel: &str,
        message: &str,
        text: &str,
    ) -> BoxFuture<'static, GatewayResult<()>>;
    /// List community members matching `filter`.
    fn fetch_members(&self, filter: MemberFilter)
    -> BoxFuture<'static, GatewayResult<Vec<MemberRef>>>;
    /// Drop an attachment that is no longer referenced.
    fn release_attachment(&self, attachment: &str) -> BoxFuture<'static, GatewayResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, roles: &[&str]) -> MemberRef {
        MemberRef {
            id: id.into(),
            display_name: id.to_uppercase(),
            roles: roles.iter().map(|role| role.to_string()).collect(),
        }
    }

    #[test]
    fn filters_combine_role_and_ids() {
        let a = member("a", &["77"]);
        let b = member("b", &["12"]);

        assert!(MemberFilter::default().matches(&a));
        assert!(MemberFilter::with_role("77").matches(&a));
        assert!(!MemberFilter::with_role("77").matches(&b));
        assert!(MemberFilter::with_ids(vec!["b".into()]).matches(&b));

        let both = MemberFilter {
            role: Some("77".into()),
            member_ids: vec!["b".into()],
        };
        assert!(!both.matches(&a));
        assert!(!both.matches(&b));
    }
}
