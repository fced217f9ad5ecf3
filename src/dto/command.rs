//! Wire format of the `/commands` endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_attachment_refs, state::problem::parse_number};

/// One command invocation relayed by the chat bridge.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CommandRequest {
    /// Member running the command.
    #[validate(nested)]
    pub invoker: Invoker,
    /// Attachment references uploaded with the command, in order.
    #[serde(default)]
    #[validate(custom(function = "validate_attachment_refs"))]
    pub attachments: Vec<String>,
    /// The command and its arguments.
    pub command: Command,
}

/// Identity of the member behind a command, as vouched for by the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct Invoker {
    /// Platform member id.
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    /// Name used in notifications.
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    /// Whether the platform granted administrator rights.
    #[serde(default)]
    pub is_admin: bool,
}

/// A grade as typed by a grader: JSON number or free text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum NumericInput {
    /// Already numeric.
    Number(f64),
    /// Text to be parsed.
    Text(String),
}

impl NumericInput {
    /// Finite numeric value, if the input is one.
    pub fn value(&self) -> Option<f64> {
        match self {
            NumericInput::Number(value) => Some(*value).filter(|value| value.is_finite()),
            NumericInput::Text(text) => parse_number(text),
        }
    }
}

impl fmt::Display for NumericInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericInput::Number(value) => write!(f, "{value}"),
            NumericInput::Text(text) => f.write_str(text),
        }
    }
}

fn one() -> i64 {
    1
}

/// Every command understood by the service.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Submit an answer; the first attachment is kept with queued answers.
    SubmitAnswer {
        /// Target problem.
        problem_id: String,
        /// Answer text, may be empty when only an image is sent.
        #[serde(default)]
        answer: String,
    },
    /// Create a problem and schedule its announcement.
    CreateProblem {
        /// Canonical answer; `None` for manually graded problems.
        #[serde(default)]
        answer: Option<String>,
        /// Window start, defaults to tomorrow 00:00.
        #[serde(default)]
        start_time: Option<String>,
        /// Window end, defaults to one day after the start.
        #[serde(default)]
        end_time: Option<String>,
        /// Statement, defaults to a dated role mention.
        #[serde(default)]
        problem_text: Option<String>,
    },
    /// Delete a problem with its records and queued answers.
    DeleteProblem {
        /// Target problem.
        problem_id: String,
    },
    /// Replace the canonical answer, crediting matching past responses.
    UpdateAnswer {
        /// Target problem.
        problem_id: String,
        /// New canonical answer.
        answer: String,
    },
    /// Move the acceptance window.
    UpdateTime {
        /// Target problem.
        problem_id: String,
        /// New start.
        start_time: String,
        /// New end.
        end_time: String,
    },
    /// Retag a problem to another season.
    UpdateSeasonTag {
        /// Target problem.
        problem_id: String,
        /// New season tag.
        season_id: String,
    },
    /// Grade the head of the ungraded queue.
    GradeLast {
        /// Credit, 0 to 1 (more for extra credit).
        grade: NumericInput,
        /// Note forwarded to the submitter.
        #[serde(default)]
        feedback: Option<String>,
        /// Attempts to add, 1 by default.
        #[serde(default = "one")]
        attempts_to_add: i64,
    },
    /// Show the head of the ungraded queue.
    PeekLast {
        /// Rotate to the next entry first.
        #[serde(default)]
        advance: bool,
    },
    /// Add to a member's attempt counter.
    UpdateAttempts {
        /// Target problem.
        problem_id: String,
        /// Member id or mention.
        member_id: String,
        /// Attempts to add (negative to remove).
        delta: i64,
    },
    /// Overwrite a member's grade.
    UpdateGrade {
        /// Target problem.
        problem_id: String,
        /// Member id or mention.
        member_id: String,
        /// New grade.
        grade: NumericInput,
        /// Note forwarded to the member.
        #[serde(default)]
        feedback: Option<String>,
    },
    /// Advance the season counter.
    NewSeason {
        /// Step, 1 by default.
        #[serde(default = "one")]
        increment: i64,
    },
    /// Public leaderboard of a season.
    GetRankings {
        /// Season, current by default.
        #[serde(default)]
        season_id: Option<String>,
    },
    /// The invoker's own ranking row.
    GetMyRank {
        /// Season, current by default.
        #[serde(default)]
        season_id: Option<String>,
    },
    /// Full, untruncated ranking of a season.
    GetAllRankings {
        /// Season, current by default.
        #[serde(default)]
        season_id: Option<String>,
    },
    /// Points of every participant, alphabetical, zero-filled.
    SeasonRoster {
        /// Season, current by default.
        #[serde(default)]
        season_id: Option<String>,
        /// Include rank and name columns.
        #[serde(default)]
        with_rank: bool,
    },
    /// Current season number.
    CurrentSeason,
    /// Push a season's roster totals to the export sink.
    ArchiveSeason {
        /// Season, previous one by default.
        #[serde(default)]
        season_id: Option<String>,
        /// Target sheet, configured default otherwise.
        #[serde(default)]
        sheet: Option<String>,
    },
    /// All-time standings from the archived seasons.
    OverallRankings {
        /// Archive sheet, configured default otherwise.
        #[serde(default)]
        sheet: Option<String>,
        /// Alphabetical points column instead of the ranked table.
        #[serde(default)]
        sort_by_name: bool,
    },
    /// Queue a broadcast.
    ScheduleMessage {
        /// Channel id or mention.
        channel: String,
        /// Message body.
        text: String,
        /// Delivery time.
        time: String,
    },
    /// Show pending broadcasts.
    ListScheduled,
    /// Drop a pending broadcast.
    RemoveScheduled {
        /// Scheduled message id.
        id: String,
    },
    /// Write the state to storage now.
    Store,
    /// Replace the state with the stored snapshot.
    Load,
}

impl Command {
    /// Kebab-case command name, as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SubmitAnswer { .. } => "submit-answer",
            Command::CreateProblem { .. } => "create-problem",
            Command::DeleteProblem { .. } => "delete-problem",
            Command::UpdateAnswer { .. } => "update-answer",
            Command::UpdateTime { .. } => "update-time",
            Command::UpdateSeasonTag { .. } => "update-season-tag",
            Command::GradeLast { .. } => "grade-last",
            Command::PeekLast { .. } => "peek-last",
            Command::UpdateAttempts { .. } => "update-attempts",
            Command::UpdateGrade { .. } => "update-grade",
            Command::NewSeason { .. } => "new-season",
            Command::GetRankings { .. } => "get-rankings",
            Command::GetMyRank { .. } => "get-my-rank",
            Command::GetAllRankings { .. } => "get-all-rankings",
            Command::SeasonRoster { .. } => "season-roster",
            Command::CurrentSeason => "current-season",
            Command::ArchiveSeason { .. } => "archive-season",
            Command::OverallRankings { .. } => "overall-rankings",
            Command::ScheduleMessage { .. } => "schedule-message",
            Command::ListScheduled => "list-scheduled",
            Command::RemoveScheduled { .. } => "remove-scheduled",
            Command::Store => "store",
            Command::Load => "load",
        }
    }

    /// Whether only administrators may run the command.
    pub fn is_admin_only(&self) -> bool {
        !matches!(
            self,
            Command::SubmitAnswer { .. }
                | Command::GetRankings { .. }
                | Command::GetMyRank { .. }
                | Command::CurrentSeason
        )
    }
}
