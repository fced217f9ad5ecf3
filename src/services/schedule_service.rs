//! Scheduled broadcasts: the admin commands and the minute delivery pass.

use tracing::{debug, error, info};

use crate::{
    dto::{reply::CommandReply, validation::strip_mention},
    error::ServiceError,
    gateway::{GatewayError, MessagingGateway},
    services::context::{CommandContext, notify_admin_channel, release_attachment},
    state::{
        AppState,
        driver::ScheduledMessage,
        timestamp::{format_timestamp, parse_timestamp},
    },
};

/// Placeholder body for attachment-only broadcasts.
const EMPTY_BODY: &str = "\u{200b}";

/// Queue a broadcast signed by the invoker.
///
/// Each attachment beyond the first becomes a separate broadcast at the same time.
pub async fn schedule_message(
    ctx: &mut CommandContext<'_>,
    channel: String,
    text: String,
    time: String,
) -> Result<CommandReply, ServiceError> {
    let channel = strip_mention(&channel).to_owned();
    let time = parse_timestamp(&time, ctx.state.config().utc_offset)?;
    let signature = format!("**{}:**", ctx.invoker.display_name);

    let attachment = ctx.take_attachment();
    let id = ctx.driver.add_scheduled_message(
        ctx.state.ids(),
        ScheduledMessage {
            text: format!("{signature}\n{text}"),
            attachment,
            time,
            channel: channel.clone(),
        },
    );
    while let Some(extra) = ctx.take_attachment() {
        ctx.driver.add_scheduled_message(
            ctx.state.ids(),
            ScheduledMessage {
                text: signature.clone(),
                attachment: Some(extra),
                time,
                channel: channel.clone(),
            },
        );
    }

    info!(%id, %channel, time = %format_timestamp(time), "broadcast scheduled");
    Ok(CommandReply::text(format!(
        "Message scheduled at {}",
        format_timestamp(time)
    )))
}

/// One reply message per pending broadcast.
pub fn list_scheduled(ctx: &CommandContext<'_>) -> CommandReply {
    let pending = ctx.driver.scheduled_messages();
    if pending.is_empty() {
        return CommandReply::text("No scheduled messages.");
    }

    let mut reply = CommandReply::default();
    for (id, message) in pending {
        reply.push(
            format!(
                "**ID: {id}**\n**Text**: {}\n**Time**: {}\n**Channel**: <#{}>",
                message.text,
                format_timestamp(message.time),
                message.channel
            ),
            message.attachment.clone(),
        );
    }
    reply
}

/// Drop a pending broadcast and release its attachment.
pub async fn remove_scheduled(
    ctx: &mut CommandContext<'_>,
    id: String,
) -> Result<CommandReply, ServiceError> {
    let removed = ctx.driver.remove_scheduled_message(id.trim())?;
    if let Some(attachment) = &removed.attachment {
        ctx.release(attachment).await;
    }
    Ok(CommandReply::text("Successfully removed scheduled message."))
}

/// Outcome of one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Broadcasts handed to the gateway.
    pub delivered: usize,
    /// Broadcasts dropped after a failure.
    pub failed: usize,
}

async fn deliver(
    gateway: &dyn MessagingGateway,
    message: &ScheduledMessage,
) -> Result<(), GatewayError> {
    let text = if message.text.is_empty() {
        EMPTY_BODY
    } else {
        message.text.as_str()
    };
    gateway
        .send_message(&message.channel, text, message.attachment.as_deref())
        .await?;
    Ok(())
}

/// Send every broadcast whose time has come.
///
/// Due entries leave the queue before delivery, so a failed broadcast is
/// reported to the admins and not retried.
pub async fn dispatch_due_messages(state: &AppState) -> Result<DispatchReport, ServiceError> {
    let mut driver = state.driver().await;
    let due = driver.take_due_messages(state.now());
    if due.is_empty() {
        debug!("no scheduled messages due");
        return Ok(DispatchReport::default());
    }

    let mut report = DispatchReport::default();
    for (id, message) in due {
        match deliver(state.gateway(), &message).await {
            Ok(()) => {
                report.delivered += 1;
                if let Some(attachment) = &message.attachment {
                    release_attachment(state.gateway(), attachment).await;
                }
            }
            Err(err) => {
                report.failed += 1;
                error!(error = %err, %id, channel = %message.channel, "scheduled message delivery failed");
                notify_admin_channel(
                    state.gateway(),
                    driver.constants.admin_channel.as_deref(),
                    "Error sending scheduled message.",
                )
                .await;
            }
        }
    }

    state.commit(&driver).await?;
    info!(
        delivered = report.delivered,
        failed = report.failed,
        "scheduled messages dispatched"
    );
    Ok(report)
}
