use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Messages the bridge posts back in the invoking conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommandReply {
    /// Messages in display order.
    pub messages: Vec<ReplyMessage>,
}

/// A single reply message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReplyMessage {
    /// Message body.
    pub text: String,
    /// Attachment reference to display alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl CommandReply {
    /// Reply made of a single text message.
    pub fn text(text: impl Into<String>) -> Self {
        let mut reply = Self::default();
        reply.push(text, None);
        reply
    }

    /// Append a message.
    pub fn push(&mut self, text: impl Into<String>, attachment: Option<String>) {
        self.messages.push(ReplyMessage {
            text: text.into(),
            attachment,
        });
    }

    /// Text of the first message, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.messages.first().map(|message| message.text.as_str())
    }
}
