//! Per-command execution context shared by the command handlers.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::{
    dto::command::Invoker,
    gateway::{MemberFilter, MessagingGateway},
    state::{AppState, driver::Driver},
};

/// Name shown for members the platform no longer knows.
pub const UNKNOWN_MEMBER: &str = "Unknown Member";

/// Everything a handler may touch while the driver lock is held.
pub struct CommandContext<'a> {
    /// Shared collaborators and configuration.
    pub state: &'a AppState,
    /// The locked driver.
    pub driver: &'a mut Driver,
    /// Member running the command.
    pub invoker: &'a Invoker,
    attachments: VecDeque<String>,
}

impl<'a> CommandContext<'a> {
    /// Bundle the pieces of one invocation.
    pub fn new(
        state: &'a AppState,
        driver: &'a mut Driver,
        invoker: &'a Invoker,
        attachments: Vec<String>,
    ) -> Self {
        Self {
            state,
            driver,
            invoker,
            attachments: attachments.into(),
        }
    }

    /// Attachments not yet claimed by the handler.
    pub fn attachments(&self) -> &VecDeque<String> {
        &self.attachments
    }

    /// Claim the first unclaimed attachment; the handler now owns its release.
    pub fn take_attachment(&mut self) -> Option<String> {
        self.attachments.pop_front()
    }

    /// Attachments nobody claimed, to be released by the dispatcher.
    pub fn into_unclaimed(self) -> Vec<String> {
        self.attachments.into()
    }

    /// Gateway shortcut.
    pub fn gateway(&self) -> &dyn MessagingGateway {
        self.state.gateway()
    }

    /// Post to the admin channel. Failures and a missing channel are only logged.
    pub async fn notify_admins(&self, text: &str) {
        notify_admin_channel(
            self.gateway(),
            self.driver.constants.admin_channel.as_deref(),
            text,
        )
        .await;
    }

    /// Direct-message a member. Failures are only logged.
    pub async fn notify_member(&self, member: &str, text: &str, attachment: Option<&str>) {
        if let Err(err) = self.gateway().send_direct(member, text, attachment).await {
            warn!(error = %err, %member, "failed to notify member");
        }
    }

    /// Release an attachment that is no longer referenced. Failures are only logged.
    pub async fn release(&self, attachment: &str) {
        release_attachment(self.gateway(), attachment).await;
    }

    /// Display name of `member`, or [`UNKNOWN_MEMBER`].
    pub async fn display_name(&self, member: &str) -> String {
        match self
            .gateway()
            .fetch_members(MemberFilter::with_ids(vec![member.to_owned()]))
            .await
        {
            Ok(members) => members
                .into_iter()
                .find(|candidate| candidate.id == member)
                .map(|candidate| candidate.display_name)
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_owned()),
            Err(err) => {
                warn!(error = %err, %member, "failed to resolve member name");
                UNKNOWN_MEMBER.to_owned()
            }
        }
    }
}

/// Post `text` to the admin channel, if one is configured. Failures are only logged.
pub async fn notify_admin_channel(
    gateway: &dyn MessagingGateway,
    channel: Option<&str>,
    text: &str,
) {
    let Some(channel) = channel else {
        debug!(%text, "no admin channel configured; notification dropped");
        return;
    };
    if let Err(err) = gateway.send_message(channel, text, None).await {
        warn!(error = %err, %channel, "failed to notify admin channel");
    }
}

/// Release `attachment`, logging failures.
pub async fn release_attachment(gateway: &dyn MessagingGateway, attachment: &str) {
    if let Err(err) = gateway.release_attachment(attachment).await {
        warn!(error = %err, %attachment, "failed to release attachment");
    }
}

/// Render a grade the way graders type it (`1.0`, `0.5`).
pub fn format_grade(grade: f64) -> String {
    format!("{grade:?}")
}
