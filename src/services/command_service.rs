//! Command dispatch: authorization, the driver lock, error shaping and the
//! commit after every command.

use tracing::{error, info, warn};

use crate::{
    dto::{
        command::{Command, CommandRequest},
        reply::CommandReply,
    },
    error::ServiceError,
    services::{
        context::{CommandContext, release_attachment},
        leaderboard_service, potd_service, schedule_service,
    },
    state::AppState,
};

/// Reply for admin-only commands run by regular members.
pub const ADMIN_ONLY: &str = "This command is restricted to administrators.";

/// Reply for failures the invoker cannot act on.
pub const UNKNOWN_ERROR: &str = "Unknown error in command. Please contact the bot administrator.";

/// Run one command end to end.
///
/// Expected failures become the reply text. The state is committed whatever
/// the outcome; only a failed commit surfaces as an error.
pub async fn execute(state: &AppState, request: CommandRequest) -> Result<CommandReply, ServiceError> {
    let CommandRequest {
        invoker,
        attachments,
        command,
    } = request;
    info!(
        invoker = %invoker.id,
        name = %invoker.display_name,
        command = command.name(),
        "command received"
    );

    if command.is_admin_only() && !invoker.is_admin {
        warn!(invoker = %invoker.id, command = command.name(), "admin command refused");
        for attachment in &attachments {
            release_attachment(state.gateway(), attachment).await;
        }
        return Ok(CommandReply::text(ADMIN_ONLY));
    }

    let name = command.name();
    let mut driver = state.driver().await;
    let mut ctx = CommandContext::new(state, &mut *driver, &invoker, attachments);

    let reply = match dispatch(&mut ctx, command).await {
        Ok(reply) => reply,
        Err(err) if err.is_expected() => {
            info!(command = name, outcome = %err, "command rejected");
            CommandReply::text(err.to_string())
        }
        Err(err) => {
            error!(command = name, error = ?err, "command failed");
            CommandReply::text(UNKNOWN_ERROR)
        }
    };

    for attachment in ctx.into_unclaimed() {
        release_attachment(state.gateway(), &attachment).await;
    }
    state.commit(&driver).await?;
    Ok(reply)
}

async fn dispatch(
    ctx: &mut CommandContext<'_>,
    command: Command,
) -> Result<CommandReply, ServiceError> {
    match command {
        Command::SubmitAnswer { problem_id, answer } => {
            potd_service::submit_answer(ctx, problem_id, answer).await
        }
        Command::CreateProblem {
            answer,
            start_time,
            end_time,
            problem_text,
        } => potd_service::create_problem(ctx, answer, start_time, end_time, problem_text).await,
        Command::DeleteProblem { problem_id } => potd_service::delete_problem(ctx, problem_id).await,
        Command::UpdateAnswer { problem_id, answer } => {
            potd_service::update_answer(ctx, problem_id, answer).await
        }
        Command::UpdateTime {
            problem_id,
            start_time,
            end_time,
        } => potd_service::update_time(ctx, problem_id, start_time, end_time).await,
        Command::UpdateSeasonTag {
            problem_id,
            season_id,
        } => potd_service::update_season_tag(ctx, problem_id, season_id).await,
        Command::GradeLast {
            grade,
            feedback,
            attempts_to_add,
        } => potd_service::grade_last(ctx, grade, feedback, attempts_to_add).await,
        Command::PeekLast { advance } => potd_service::peek_last(ctx, advance).await,
        Command::UpdateAttempts {
            problem_id,
            member_id,
            delta,
        } => potd_service::update_attempts(ctx, problem_id, member_id, delta).await,
        Command::UpdateGrade {
            problem_id,
            member_id,
            grade,
            feedback,
        } => potd_service::update_grade(ctx, problem_id, member_id, grade, feedback).await,
        Command::NewSeason { increment } => potd_service::new_season(ctx, increment),
        Command::GetRankings { season_id } => {
            leaderboard_service::get_rankings(ctx, season_id).await
        }
        Command::GetMyRank { season_id } => leaderboard_service::get_my_rank(ctx, season_id).await,
        Command::GetAllRankings { season_id } => {
            leaderboard_service::get_all_rankings(ctx, season_id).await
        }
        Command::SeasonRoster {
            season_id,
            with_rank,
        } => leaderboard_service::season_roster(ctx, season_id, with_rank).await,
        Command::CurrentSeason => Ok(leaderboard_service::current_season(ctx)),
        Command::ArchiveSeason { season_id, sheet } => {
            leaderboard_service::archive_season(ctx, season_id, sheet).await
        }
        Command::OverallRankings {
            sheet,
            sort_by_name,
        } => leaderboard_service::overall_rankings(ctx, sheet, sort_by_name).await,
        Command::ScheduleMessage {
            channel,
            text,
            time,
        } => schedule_service::schedule_message(ctx, channel, text, time).await,
        Command::ListScheduled => Ok(schedule_service::list_scheduled(ctx)),
        Command::RemoveScheduled { id } => schedule_service::remove_scheduled(ctx, id).await,
        Command::Store => potd_service::store(ctx).await,
        Command::Load => potd_service::load(ctx).await,
    }
}
