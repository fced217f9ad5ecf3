use std::collections::VecDeque;

use indexmap::IndexMap;
use time::PrimitiveDateTime;

use super::{
    ContestError,
    problem::{Person, Problem, parse_number},
};

/// Free-text submission waiting for a grader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UngradedAnswer {
    /// Problem the answer was submitted to.
    pub problem_id: String,
    /// Submitting member.
    pub person_id: String,
    /// Raw answer text.
    pub answer: String,
    /// Attachment reference held by the messaging gateway.
    pub attachment: Option<String>,
}

/// Input of [`Season::add_problem`].
#[derive(Debug, Clone)]
pub struct NewProblem {
    /// Statement shown to members.
    pub problem_text: String,
    /// Canonical answer.
    pub answer: String,
    /// Window start.
    pub start_time: PrimitiveDateTime,
    /// Window end.
    pub end_time: PrimitiveDateTime,
    /// Season tag; defaults to the current season.
    pub season_id: Option<String>,
}

/// Result of an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Numeric answer compared against a numeric canonical answer.
    AutoGraded {
        /// Whether the answer matched.
        correct: bool,
    },
    /// Free-text answer queued for manual grading.
    Queued,
}

/// A deleted problem together with the queued answers that referenced it.
#[derive(Debug, Clone)]
pub struct DeletedProblem {
    /// The removed problem and all of its member records.
    pub problem: Problem,
    /// Ungraded answers purged from the queue.
    pub purged_answers: Vec<UngradedAnswer>,
}

/// Problem collection, pending-grade queue and score aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Season {
    problems: IndexMap<String, Problem>,
    ungraded_answers: VecDeque<UngradedAnswer>,
    /// Counter advanced by admins; new problems default to this tag.
    pub current_season: i64,
    last_problem_id: u64,
}

impl Season {
    /// Empty season starting at season 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag given to problems created without an explicit season.
    pub fn current_season_id(&self) -> String {
        self.current_season.to_string()
    }

    /// Look up a problem.
    pub fn problem(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.get(problem_id)
    }

    /// Problems in creation order.
    pub fn problems(&self) -> impl Iterator<Item = &Problem> {
        self.problems.values()
    }

    /// The pending-grade queue, head first.
    pub fn ungraded_answers(&self) -> &VecDeque<UngradedAnswer> {
        &self.ungraded_answers
    }

    /// Highest problem id handed out so far.
    pub fn last_problem_id(&self) -> u64 {
        self.last_problem_id
    }

    fn problem_mut(&mut self, problem_id: &str) -> Result<&mut Problem, ContestError> {
        self.problems
            .get_mut(problem_id)
            .ok_or_else(|| ContestError::ProblemNotFound(problem_id.to_owned()))
    }

    fn mint_problem_id(&mut self) -> String {
        self.last_problem_id += 1;
        self.last_problem_id.to_string()
    }

    // -----------------------------------------------------------------------
    // Problem mutators
    // -----------------------------------------------------------------------

    /// Create a problem under a freshly minted id.
    pub fn add_problem(&mut self, new: NewProblem) -> &Problem {
        let id = self.mint_problem_id();
        let season_id = new
            .season_id
            .unwrap_or_else(|| self.current_season_id());
        let problem = Problem::new(
            id.clone(),
            new.problem_text,
            new.answer,
            new.start_time,
            new.end_time,
            season_id,
        );
        self.problems.entry(id).or_insert(problem)
    }

    /// Insert a problem that already carries an id (import path).
    ///
    /// The id counter is advanced past numeric ids so freshly minted ids never
    /// collide with imported ones.
    pub fn insert_problem(&mut self, problem: Problem) {
        if let Ok(numeric) = problem.id.trim().parse::<u64>() {
            self.last_problem_id = self.last_problem_id.max(numeric);
        }
        self.problems.insert(problem.id.clone(), problem);
    }

    /// Remove a problem, its member records and its queued answers.
    pub fn delete_problem(&mut self, problem_id: &str) -> Result<DeletedProblem, ContestError> {
        let problem = self
            .problems
            .shift_remove(problem_id)
            .ok_or_else(|| ContestError::ProblemNotFound(problem_id.to_owned()))?;

        let (purged_answers, kept): (Vec<_>, Vec<_>) = self
            .ungraded_answers
            .drain(..)
            .partition(|entry| entry.problem_id == problem_id);
        self.ungraded_answers = kept.into();

        Ok(DeletedProblem {
            problem,
            purged_answers,
        })
    }

    /// Replace the canonical answer and credit every member who already
    /// submitted a numerically equal response.
    ///
    /// Members whose responses no longer match keep their grade. Returns the
    /// members whose grade changed along with their new grade.
    pub fn set_answer(
        &mut self,
        problem_id: &str,
        answer: String,
    ) -> Result<Vec<(String, f64)>, ContestError> {
        let problem = self.problem_mut(problem_id)?;
        problem.set_answer(answer);

        let Some(expected) = problem.numeric_answer() else {
            return Ok(Vec::new());
        };

        let matching: Vec<String> = problem
            .persons()
            .filter(|person| {
                person
                    .responses
                    .iter()
                    .filter_map(|response| parse_number(response))
                    .any(|value| value == expected)
            })
            .map(|person| person.id.clone())
            .collect();

        let mut regraded = Vec::new();
        for person_id in matching {
            if problem.set_grade(&person_id, 1.0, false)? {
                regraded.push((person_id, 1.0));
            }
        }

        Ok(regraded)
    }

    /// Move a problem's acceptance window.
    pub fn set_time(
        &mut self,
        problem_id: &str,
        start_time: PrimitiveDateTime,
        end_time: PrimitiveDateTime,
    ) -> Result<(), ContestError> {
        let problem = self.problem_mut(problem_id)?;
        problem.start_time = start_time;
        problem.end_time = end_time;
        Ok(())
    }

    /// Retag a problem to another season.
    pub fn set_season(&mut self, problem_id: &str, season_id: String) -> Result<(), ContestError> {
        self.problem_mut(problem_id)?.season_id = season_id;
        Ok(())
    }

    /// Advance the season counter by `increment` and return the new value.
    ///
    /// The counter is left untouched when the sum does not fit.
    pub fn start_new_season(&mut self, increment: i64) -> Result<i64, ContestError> {
        self.current_season = self
            .current_season
            .checked_add(increment)
            .ok_or_else(|| ContestError::InvalidFormat("Season out of range.".into()))?;
        Ok(self.current_season)
    }

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    /// Queue a free-text answer for manual grading.
    pub fn add_answer(
        &mut self,
        problem_id: &str,
        person_id: &str,
        answer: &str,
        attachment: Option<String>,
        now: PrimitiveDateTime,
    ) -> Result<(), ContestError> {
        let problem = self
            .problem(problem_id)
            .ok_or_else(|| ContestError::ProblemNotFound(problem_id.to_owned()))?;
        if !problem.in_interval(now) {
            return Err(ContestError::OutOfWindow);
        }

        self.ungraded_answers.push_back(UngradedAnswer {
            problem_id: problem_id.to_owned(),
            person_id: person_id.to_owned(),
            answer: answer.to_owned(),
            attachment,
        });
        Ok(())
    }

    /// Accept a submission: numeric answers against numeric problems are
    /// graded on the spot, everything else goes to the ungraded queue.
    pub fn submit_answer(
        &mut self,
        problem_id: &str,
        person_id: &str,
        answer: &str,
        attachment: Option<String>,
        now: PrimitiveDateTime,
    ) -> Result<Submission, ContestError> {
        let problem = self
            .problem(problem_id)
            .ok_or_else(|| ContestError::ProblemNotFound(problem_id.to_owned()))?;

        let (Some(expected), Some(submitted)) = (problem.numeric_answer(), parse_number(answer))
        else {
            self.add_answer(problem_id, person_id, answer, attachment, now)?;
            return Ok(Submission::Queued);
        };

        if !problem.in_interval(now) {
            return Err(ContestError::OutOfWindow);
        }

        let correct = expected == submitted;
        self.grade_answer(problem_id, person_id, if correct { 1.0 } else { 0.0 }, 1)?;
        if let Some(person) = self.problem_mut(problem_id)?.person_mut(person_id) {
            person.responses.push(answer.to_owned());
        }

        Ok(Submission::AutoGraded { correct })
    }

    // -----------------------------------------------------------------------
    // Grading
    // -----------------------------------------------------------------------

    /// Record a grade for a member, creating the record on first contact.
    ///
    /// New records start with `max(1, attempts_to_add)` attempts; existing ones
    /// add `attempts_to_add` and keep the higher grade.
    pub fn grade_answer(
        &mut self,
        problem_id: &str,
        person_id: &str,
        grade: f64,
        attempts_to_add: i64,
    ) -> Result<&Person, ContestError> {
        let problem = self.problem_mut(problem_id)?;

        if problem.person(person_id).is_none() {
            return problem.add_person(person_id, attempts_to_add.max(1), grade, Vec::new());
        }

        problem.set_attempts(person_id, attempts_to_add, true)?;
        problem.set_grade(person_id, grade, true)?;
        problem
            .person(person_id)
            .ok_or_else(|| ContestError::PersonNotFound(person_id.to_owned()))
    }

    /// Grade the head of the queue and remove it.
    ///
    /// The removed entry is returned so its attachment can be released.
    pub fn grade_last(
        &mut self,
        grade: f64,
        attempts_to_add: i64,
    ) -> Result<UngradedAnswer, ContestError> {
        let head = self
            .ungraded_answers
            .front()
            .cloned()
            .ok_or(ContestError::NoUngradedAnswers)?;

        let graded = self
            .grade_answer(&head.problem_id, &head.person_id, grade, attempts_to_add)
            .map(|_| ());
        self.ungraded_answers.pop_front();
        graded?;

        Ok(head)
    }

    /// Peek at the head of the queue, rotating it to the tail first when `advance`.
    pub fn last_ungraded(&mut self, advance: bool) -> Option<&UngradedAnswer> {
        if advance {
            self.ungraded_answers.rotate_left(1.min(self.ungraded_answers.len()));
        }
        self.ungraded_answers.front()
    }

    /// Admin correction of a member's attempt counter (delta), creating the
    /// record when no submission was ever recorded.
    pub fn set_attempts(
        &mut self,
        problem_id: &str,
        person_id: &str,
        delta: i64,
    ) -> Result<&Person, ContestError> {
        let problem = self.problem_mut(problem_id)?;
        if problem.person(person_id).is_none() {
            return problem.add_person(person_id, delta, 0.0, Vec::new());
        }
        problem.set_attempts(person_id, delta, true)
    }

    /// Admin correction of a member's grade, creating the record when needed.
    ///
    /// Returns whether the grade changed and the updated record.
    pub fn set_grade(
        &mut self,
        problem_id: &str,
        person_id: &str,
        grade: f64,
        max_out: bool,
    ) -> Result<(bool, &Person), ContestError> {
        let problem = self.problem_mut(problem_id)?;

        let changed = if problem.person(person_id).is_none() {
            problem.add_person(person_id, 1, grade, Vec::new())?;
            true
        } else {
            problem.set_grade(person_id, grade, max_out)?
        };

        let person = problem
            .person(person_id)
            .ok_or_else(|| ContestError::PersonNotFound(person_id.to_owned()))?;
        Ok((changed, person))
    }

    // -----------------------------------------------------------------------
    // Scores
    // -----------------------------------------------------------------------

    /// Total points per member over every problem tagged `season_id`.
    pub fn get_grades(&self, season_id: &str) -> IndexMap<String, f64> {
        let mut scores = IndexMap::new();
        for problem in self
            .problems
            .values()
            .filter(|problem| problem.season_id == season_id)
        {
            for (person_id, score) in problem.solve_scores() {
                *scores.entry(person_id).or_insert(0.0) += score;
            }
        }
        scores
    }

    pub(crate) fn restore_queue(&mut self, queue: VecDeque<UngradedAnswer>) {
        self.ungraded_answers = queue;
    }
}
