//! JSON document layouts persisted in the key-value store.
//!
//! Field names follow the documents written by earlier deployments, so old
//! data files load unchanged. Numeric fields also accept their string form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

/// Member record inside a problem document.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonEntity {
    /// Member identifier.
    pub id: String,
    /// Attempts counted against the member.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub num_attempts: i64,
    /// Current grade.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub grade: f64,
    /// Raw answers, oldest first.
    #[serde(default)]
    pub responses: Vec<String>,
}

/// One problem of the season document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProblemEntity {
    /// Problem identifier.
    pub id: IdEntity,
    /// Statement.
    pub problem_text: String,
    /// Canonical answer.
    pub answer: String,
    /// Window start, `MM-DD-YYYY HH:MM:SS`.
    pub start_time: String,
    /// Window end, `MM-DD-YYYY HH:MM:SS`.
    pub end_time: String,
    /// Season tag.
    pub season_id: IdEntity,
    /// Member records in insertion order.
    #[serde(default)]
    pub persons: Vec<PersonEntity>,
}

/// Entry of the ungraded-queue document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UngradedAnswerEntity {
    /// Problem the answer belongs to.
    pub problem_id: IdEntity,
    /// Submitting member.
    pub person_id: IdEntity,
    /// Raw answer text.
    pub answer: String,
    /// Attachment reference, if any.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Value of the scheduled-messages document (keyed by message id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledMessageEntity {
    /// Message body.
    pub text: String,
    /// Attachment reference, if any.
    #[serde(default)]
    pub filename: Option<String>,
    /// Delivery time, `MM-DD-YYYY HH:MM:SS`.
    pub time: String,
    /// Target channel.
    pub channel: IdEntity,
}

/// The process constants document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstantsEntity {
    /// Current season counter.
    #[serde(rename = "CURRENT_SEASON", default)]
    pub current_season: i64,
    /// Admin channel.
    #[serde(default)]
    pub admin_channel: Option<IdEntity>,
    /// Leaderboard channel.
    #[serde(default)]
    pub leaderboard_output_channel: Option<IdEntity>,
    /// Live leaderboard message.
    #[serde(default)]
    pub leaderboard_output_message: Option<IdEntity>,
    /// Problem announcement channel.
    #[serde(default)]
    pub potd_output_channel: Option<IdEntity>,
    /// Solution channel.
    #[serde(default)]
    pub potd_solution_channel: Option<IdEntity>,
    /// Participant role.
    #[serde(default)]
    pub year_role: Option<IdEntity>,
    /// Community identifier.
    #[serde(default)]
    pub server_id: Option<IdEntity>,
}

/// Season document: every problem, in creation order.
pub type SeasonDocument = Vec<ProblemEntity>;
/// Ungraded-queue document, head first.
pub type UngradedDocument = Vec<UngradedAnswerEntity>;
/// Scheduled-messages document.
pub type ScheduledDocument = IndexMap<String, ScheduledMessageEntity>;

/// Identifier persisted either as a JSON number or a string.
///
/// Chat platforms hand out numeric snowflakes that older documents stored as
/// numbers; everything is handled as text in memory and written back as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IdEntity {
    /// Numeric form.
    Number(i64),
    /// Textual form.
    Text(String),
}

impl From<IdEntity> for String {
    fn from(value: IdEntity) -> Self {
        match value {
            IdEntity::Number(number) => number.to_string(),
            IdEntity::Text(text) => text,
        }
    }
}

impl From<String> for IdEntity {
    fn from(value: String) -> Self {
        IdEntity::Text(value)
    }
}

impl From<&str> for IdEntity {
    fn from(value: &str) -> Self {
        IdEntity::Text(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_documents_with_numeric_fields_load() {
        let raw = r#"{
            "CURRENT_SEASON": 4,
            "admin_channel": 1180000000000000001,
            "leaderboard_output_channel": "1180000000000000002",
            "leaderboard_output_message": null,
            "potd_output_channel": 1180000000000000003,
            "potd_solution_channel": 1180000000000000004,
            "year_role": 1180000000000000005,
            "server_id": 1180000000000000006
        }"#;
        let constants: ConstantsEntity = serde_json::from_str(raw).unwrap();
        assert_eq!(constants.current_season, 4);
        assert_eq!(
            constants.admin_channel.map(String::from).as_deref(),
            Some("1180000000000000001")
        );
        assert_eq!(
            constants
                .leaderboard_output_channel
                .map(String::from)
                .as_deref(),
            Some("1180000000000000002")
        );
        assert!(constants.leaderboard_output_message.is_none());
    }

    #[test]
    fn person_grade_accepts_string_form() {
        let raw = r#"{"id": "7", "num_attempts": 0, "grade": "0", "responses": []}"#;
        let person: PersonEntity = serde_json::from_str(raw).unwrap();
        assert_eq!(person.grade, 0.0);

        let raw = r#"{"id": "7", "num_attempts": "2", "grade": 0.5}"#;
        let person: PersonEntity = serde_json::from_str(raw).unwrap();
        assert_eq!((person.num_attempts, person.grade), (2, 0.5));
        assert!(person.responses.is_empty());
    }

    #[test]
    fn problem_ids_accept_numbers() {
        let raw = r#"{
            "id": 3, "problem_text": "x", "answer": "1",
            "start_time": "01-01-2025 00:00:00", "end_time": "01-02-2025 00:00:00",
            "season_id": 0, "persons": []
        }"#;
        let problem: ProblemEntity = serde_json::from_str(raw).unwrap();
        assert_eq!(String::from(problem.id), "3");
        assert_eq!(String::from(problem.season_id), "0");
    }
}
