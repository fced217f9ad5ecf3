//! Problem lifecycle, submissions and grading commands.

use time::{Duration, PrimitiveDateTime, Time};
use tracing::info;

use crate::{
    dto::{command::NumericInput, reply::CommandReply, validation::strip_mention},
    error::ServiceError,
    services::context::{CommandContext, format_grade},
    state::{
        ContestError,
        driver::ScheduledMessage,
        season::{NewProblem, Submission},
        timestamp::{display_date, display_timestamp, parse_timestamp},
    },
};

/// Canonical answer stored for problems graded by hand.
const MANUAL_ANSWER: &str = "None";

const INVALID_GRADE: &str = "Please enter a decimal number for the grade between 0 and 1 (outside the range if extra credit).";

const SUBMIT_INSTRUCTIONS: &str = "Submit solutions with the `submit-answer` command, giving the Problem ID and your answer. Please send your solutions to the bot directly. To attach an image, include it with your message.";

/// Accept an answer from the invoker.
///
/// Numeric answers to numeric problems are graded immediately; anything else
/// joins the ungraded queue together with the first attachment.
pub async fn submit_answer(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
    answer: String,
) -> Result<CommandReply, ServiceError> {
    let now = ctx.state.now();
    let attachment = ctx.attachments().front().cloned();
    let outcome = ctx.driver.season.submit_answer(
        &problem_id,
        &ctx.invoker.id,
        &answer,
        attachment,
        now,
    )?;

    let name = ctx.invoker.display_name.clone();
    match outcome {
        Submission::AutoGraded { correct } => {
            let result = if correct { "correct" } else { "wrong" };
            info!(problem = %problem_id, member = %ctx.invoker.id, correct, "answer auto-graded");
            ctx.notify_admins(&format!(
                "{name}'s answer of `{answer}` was marked {result}."
            ))
            .await;
            Ok(CommandReply::text(format!(
                "Your answer `{answer}` was {result}."
            )))
        }
        Submission::Queued => {
            ctx.take_attachment();
            info!(problem = %problem_id, member = %ctx.invoker.id, "answer queued for grading");
            ctx.notify_admins(&format!("Answer Added by {name}.")).await;
            Ok(CommandReply::text("Answer added."))
        }
    }
}

fn tomorrow_midnight(now: PrimitiveDateTime) -> Result<PrimitiveDateTime, ServiceError> {
    now.date()
        .next_day()
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT))
        .ok_or_else(|| ServiceError::InvalidInput("Date out of range.".into()))
}

fn ensure_ordered(start: PrimitiveDateTime, end: PrimitiveDateTime) -> Result<(), ServiceError> {
    if end < start {
        return Err(ServiceError::InvalidInput(
            "The end time must not be before the start time.".into(),
        ));
    }
    Ok(())
}

fn announcement(
    author: &str,
    problem_text: &str,
    season: i64,
    problem_id: &str,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> String {
    format!(
        "**{author}:**\n{problem_text}\n**Season ID:** {season}\n**Problem ID:** {problem_id}\n\n\
         Solutions accepted from **{}** till **{}**.\n\n{SUBMIT_INSTRUCTIONS}",
        display_timestamp(start),
        display_timestamp(end),
    )
}

/// Create a problem and schedule its announcement.
///
/// The first attachment goes out with the announcement at the window start;
/// every further attachment is a solution released at the window end.
pub async fn create_problem(
    ctx: &mut CommandContext<'_>,
    answer: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    problem_text: Option<String>,
) -> Result<CommandReply, ServiceError> {
    let offset = ctx.state.config().utc_offset;
    let output_channel = ctx
        .driver
        .constants
        .potd_output_channel
        .clone()
        .ok_or_else(|| ServiceError::MissingConfiguration("No output channel.".into()))?;
    let solution_channel = ctx.driver.constants.potd_solution_channel.clone();
    if ctx.attachments().len() > 1 && solution_channel.is_none() {
        return Err(ServiceError::MissingConfiguration(
            "No solution channel.".into(),
        ));
    }

    let start = match start_time {
        Some(text) => parse_timestamp(&text, offset)?,
        None => tomorrow_midnight(ctx.state.now())?,
    };
    let end = match end_time {
        Some(text) => parse_timestamp(&text, offset)?,
        None => start
            .checked_add(Duration::days(1))
            .ok_or_else(|| ServiceError::InvalidInput("Date out of range.".into()))?,
    };
    ensure_ordered(start, end)?;

    let problem_text = problem_text.unwrap_or_else(|| match &ctx.driver.constants.year_role {
        Some(role) => format!("<@&{role}> {} Problem:", display_date(start)),
        None => format!("{} Problem:", display_date(start)),
    });

    let problem_id = ctx
        .driver
        .season
        .add_problem(NewProblem {
            problem_text: problem_text.clone(),
            answer: answer.unwrap_or_else(|| MANUAL_ANSWER.to_owned()),
            start_time: start,
            end_time: end,
            season_id: None,
        })
        .id
        .clone();

    let text = announcement(
        &ctx.invoker.display_name,
        &problem_text,
        ctx.driver.season.current_season,
        &problem_id,
        start,
        end,
    );
    let attachment = ctx.take_attachment();
    ctx.driver.add_scheduled_message(
        ctx.state.ids(),
        ScheduledMessage {
            text,
            attachment,
            time: start,
            channel: output_channel,
        },
    );

    if let Some(channel) = solution_channel {
        while let Some(solution) = ctx.take_attachment() {
            ctx.driver.add_scheduled_message(
                ctx.state.ids(),
                ScheduledMessage {
                    text: String::new(),
                    attachment: Some(solution),
                    time: end,
                    channel: channel.clone(),
                },
            );
        }
    }

    info!(problem = %problem_id, start = %display_timestamp(start), "problem created");
    Ok(CommandReply::text(format!(
        "Problem added successfully. Problem ID: {problem_id}"
    )))
}

/// Delete a problem, releasing the attachments of its queued answers.
pub async fn delete_problem(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
) -> Result<CommandReply, ServiceError> {
    let deleted = ctx.driver.season.delete_problem(&problem_id)?;
    for attachment in deleted
        .purged_answers
        .iter()
        .filter_map(|entry| entry.attachment.as_deref())
    {
        ctx.release(attachment).await;
    }

    info!(problem = %problem_id, purged = deleted.purged_answers.len(), "problem deleted");
    Ok(CommandReply::text(format!("Problem {problem_id} deleted.")))
}

/// Replace the canonical answer and tell every regraded member.
pub async fn update_answer(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
    answer: String,
) -> Result<CommandReply, ServiceError> {
    let regraded = ctx.driver.season.set_answer(&problem_id, answer)?;
    for (member, grade) in &regraded {
        let text = format!(
            "Grader: {}\nYour answer to problem {problem_id} has been rescored to {}.",
            ctx.invoker.display_name,
            format_grade(*grade)
        );
        ctx.notify_member(member, &text, None).await;
    }
    Ok(CommandReply::text("Answer set successfully."))
}

/// Move a problem's acceptance window.
pub async fn update_time(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
    start_time: String,
    end_time: String,
) -> Result<CommandReply, ServiceError> {
    let offset = ctx.state.config().utc_offset;
    let start = parse_timestamp(&start_time, offset)?;
    let end = parse_timestamp(&end_time, offset)?;
    ensure_ordered(start, end)?;

    ctx.driver.season.set_time(&problem_id, start, end)?;
    Ok(CommandReply::text("Time set successfully."))
}

/// Retag a problem.
pub async fn update_season_tag(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
    season_id: String,
) -> Result<CommandReply, ServiceError> {
    ctx.driver
        .season
        .set_season(&problem_id, season_id.trim().to_owned())?;
    Ok(CommandReply::text("Season ID set successfully."))
}

/// Grade the head of the queue and send the verdict to the submitter.
pub async fn grade_last(
    ctx: &mut CommandContext<'_>,
    grade: NumericInput,
    feedback: Option<String>,
    attempts_to_add: i64,
) -> Result<CommandReply, ServiceError> {
    let Some(grade) = grade.value() else {
        return Ok(CommandReply::text(INVALID_GRADE));
    };

    let head = ctx.driver.season.ungraded_answers().front().cloned();
    let entry = match ctx.driver.season.grade_last(grade, attempts_to_add) {
        Ok(entry) => entry,
        Err(err @ ContestError::ProblemNotFound(_)) => {
            // The entry left the queue anyway.
            if let Some(attachment) = head.and_then(|entry| entry.attachment) {
                ctx.release(&attachment).await;
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let mut text = format!(
        "Grader: {}\nYour answer `{}` was graded {}/1.",
        ctx.invoker.display_name,
        entry.answer,
        format_grade(grade)
    );
    if let Some(feedback) = feedback.filter(|feedback| !feedback.trim().is_empty()) {
        text.push_str(&format!("\n\n**Feedback: **{feedback}"));
    }
    ctx.notify_member(&entry.person_id, &text, entry.attachment.as_deref())
        .await;
    if let Some(attachment) = &entry.attachment {
        ctx.release(attachment).await;
    }

    info!(
        problem = %entry.problem_id,
        member = %entry.person_id,
        grade,
        "queued answer graded"
    );
    Ok(CommandReply::text("Last answer graded successfully."))
}

/// Show the head of the queue, optionally rotating first.
pub async fn peek_last(
    ctx: &mut CommandContext<'_>,
    advance: bool,
) -> Result<CommandReply, ServiceError> {
    let entry = ctx
        .driver
        .season
        .last_ungraded(advance)
        .cloned()
        .ok_or(ContestError::NoUngradedAnswers)?;
    let problem_text = ctx
        .driver
        .season
        .problem(&entry.problem_id)
        .map(|problem| problem.problem_text.clone())
        .unwrap_or_default();
    let name = ctx.display_name(&entry.person_id).await;

    let mut reply = CommandReply::default();
    reply.push(
        format!(
            "Problem Text: {problem_text}\nProblem ID: {}\nAnswer Text: {}\nPerson: {name} -- {}",
            entry.problem_id, entry.answer, entry.person_id
        ),
        entry.attachment,
    );
    Ok(reply)
}

/// Adjust a member's attempt counter.
pub async fn update_attempts(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
    member_id: String,
    delta: i64,
) -> Result<CommandReply, ServiceError> {
    let member = strip_mention(&member_id).to_owned();
    let attempts = ctx
        .driver
        .season
        .set_attempts(&problem_id, &member, delta)?
        .num_attempts;

    let text = format!(
        "Grader: {}\nYour number of attempts to problem {problem_id} has been updated to {attempts}.",
        ctx.invoker.display_name
    );
    ctx.notify_member(&member, &text, None).await;
    Ok(CommandReply::text(format!(
        "Person {member}'s attempts updated to {attempts}."
    )))
}

/// Overwrite a member's grade; the member hears about it only on change.
pub async fn update_grade(
    ctx: &mut CommandContext<'_>,
    problem_id: String,
    member_id: String,
    grade: NumericInput,
    feedback: Option<String>,
) -> Result<CommandReply, ServiceError> {
    let Some(value) = grade.value() else {
        return Ok(CommandReply::text(format!("Grade {grade} is not a number.")));
    };
    let member = strip_mention(&member_id).to_owned();
    let (changed, _) = ctx
        .driver
        .season
        .set_grade(&problem_id, &member, value, false)?;

    if changed {
        if let Some(feedback) = feedback.filter(|feedback| !feedback.trim().is_empty()) {
            ctx.notify_member(&member, &feedback, None).await;
        }
        let text = format!(
            "Grader: {}\nYour answer to problem {problem_id} has been rescored to {}.",
            ctx.invoker.display_name,
            format_grade(value)
        );
        ctx.notify_member(&member, &text, None).await;
    }
    Ok(CommandReply::text(format!(
        "Person {member}'s grade updated to {}.",
        format_grade(value)
    )))
}

/// Advance the season counter.
pub fn new_season(
    ctx: &mut CommandContext<'_>,
    increment: i64,
) -> Result<CommandReply, ServiceError> {
    let season = ctx.driver.create_season(increment)?;
    info!(season, "season started");
    Ok(CommandReply::text(format!(
        "Season created successfully. New season: {season}"
    )))
}

/// Write the state to the store right away.
pub async fn store(ctx: &mut CommandContext<'_>) -> Result<CommandReply, ServiceError> {
    ctx.state.commit(&*ctx.driver).await?;
    Ok(CommandReply::text("Data stored successfully."))
}

/// Replace the in-memory state with the stored snapshot.
pub async fn load(ctx: &mut CommandContext<'_>) -> Result<CommandReply, ServiceError> {
    ctx.state.reload(&mut *ctx.driver).await?;
    Ok(CommandReply::text("Data loaded successfully."))
}
