use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use futures::future::BoxFuture;

use super::{DeliveredMessage, GatewayError, GatewayResult, MemberFilter, MemberRef, MessagingGateway};

/// Outgoing message captured by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    /// Channel, or member id for direct messages.
    pub target: String,
    /// Message body.
    pub text: String,
    /// Attachment reference sent along.
    pub attachment: Option<String>,
}

#[derive(Debug, Default)]
struct Recorded {
    channel_messages: Vec<RecordedMessage>,
    direct_messages: Vec<RecordedMessage>,
    edits: Vec<(String, String, String)>,
    posted: HashSet<String>,
    released: Vec<String>,
    members: Vec<MemberRef>,
    failing_channels: HashSet<String>,
    member_lookups_fail: bool,
    next_id: u64,
}

/// In-memory gateway that records every call; used by tests and dry runs.
///
/// Only messages it posted itself can be edited, which mimics a platform
/// where the leaderboard message was deleted by hand.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingGateway {
    /// Empty recorder with no members.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a community member.
    pub fn add_member(&self, id: &str, display_name: &str, roles: &[&str]) {
        self.lock().members.push(MemberRef {
            id: id.to_owned(),
            display_name: display_name.to_owned(),
            roles: roles.iter().map(|role| (*role).to_owned()).collect(),
        });
    }

    /// Every send to `channel` fails from now on.
    pub fn fail_channel(&self, channel: &str) {
        self.lock().failing_channels.insert(channel.to_owned());
    }

    /// Every member listing fails from now on.
    pub fn fail_member_lookups(&self) {
        self.lock().member_lookups_fail = true;
    }

    /// Messages posted in channels, in order.
    pub fn channel_messages(&self) -> Vec<RecordedMessage> {
        self.lock().channel_messages.clone()
    }

    /// Messages posted in `channel`, in order.
    pub fn messages_in(&self, channel: &str) -> Vec<RecordedMessage> {
        self.lock()
            .channel_messages
            .iter()
            .filter(|message| message.target == channel)
            .cloned()
            .collect()
    }

    /// Direct messages, in order.
    pub fn direct_messages(&self) -> Vec<RecordedMessage> {
        self.lock().direct_messages.clone()
    }

    /// Edits as `(channel, message id, text)`.
    pub fn edits(&self) -> Vec<(String, String, String)> {
        self.lock().edits.clone()
    }

    /// Attachments released so far.
    pub fn released(&self) -> Vec<String> {
        self.lock().released.clone()
    }
}

impl MessagingGateway for RecordingGateway {
    fn send_message(
        &self,
        channel: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<DeliveredMessage>> {
        let mut recorded = self.lock();
        let result = if recorded.failing_channels.contains(channel) {
            Err(GatewayError::rejected("send_message", format!("unknown channel {channel}")))
        } else {
            recorded.next_id += 1;
            let id = format!("m{}", recorded.next_id);
            recorded.posted.insert(id.clone());
            recorded.channel_messages.push(RecordedMessage {
                target: channel.to_owned(),
                text: text.to_owned(),
                attachment: attachment.map(str::to_owned),
            });
            Ok(DeliveredMessage { id })
        };
        Box::pin(async move { result })
    }

    fn send_direct(
        &self,
        member: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        self.lock().direct_messages.push(RecordedMessage {
            target: member.to_owned(),
            text: text.to_owned(),
            attachment: attachment.map(str::to_owned),
        });
        Box::pin(async { Ok(()) })
    }

    fn edit_message(
        &self,
        channel: &str,
        message: &str,
        text: &str,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        let mut recorded = self.lock();
        let result = if recorded.posted.contains(message) {
            recorded
                .edits
                .push((channel.to_owned(), message.to_owned(), text.to_owned()));
            Ok(())
        } else {
            Err(GatewayError::rejected("edit_message", format!("unknown message {message}")))
        };
        Box::pin(async move { result })
    }

    fn fetch_members(
        &self,
        filter: MemberFilter,
    ) -> BoxFuture<'static, GatewayResult<Vec<MemberRef>>> {
        let recorded = self.lock();
        let result: GatewayResult<Vec<MemberRef>> = if recorded.member_lookups_fail {
            Err(GatewayError::rejected("fetch_members", "member listing unavailable"))
        } else {
            Ok(recorded
                .members
                .iter()
                .filter(|member| filter.matches(member))
                .cloned()
                .collect())
        };
        Box::pin(async move { result })
    }

    fn release_attachment(&self, attachment: &str) -> BoxFuture<'static, GatewayResult<()>> {
        self.lock().released.push(attachment.to_owned());
        Box::pin(async { Ok(()) })
    }
}
