use thiserror::Error;

/// Expected failures raised by the competition core.
///
/// Every variant renders as the human readable status reported back to the
/// invoker; none of them leave partial mutations behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContestError {
    /// The referenced problem does not exist.
    #[error("Problem {0} not found.")]
    ProblemNotFound(String),
    /// The referenced member has no record on the problem.
    #[error("Person {0} not found.")]
    PersonNotFound(String),
    /// The referenced scheduled message does not exist.
    #[error("Could not find scheduled message {0}.")]
    ScheduledMessageNotFound(String),
    /// A member record already exists on the problem.
    #[error("Person with id {person_id} already in problem {problem_id}.")]
    DuplicatePerson {
        /// Problem the duplicate was attempted on.
        problem_id: String,
        /// Member that already has a record.
        person_id: String,
    },
    /// Submission attempted outside the acceptance window.
    #[error("Not in correct time interval.")]
    OutOfWindow,
    /// A grade, number or timestamp failed to parse.
    #[error("{0}")]
    InvalidFormat(String),
    /// The ungraded queue is empty.
    #[error("No ungraded answers.")]
    NoUngradedAnswers,
}
