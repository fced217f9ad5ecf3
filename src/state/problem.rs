use indexmap::IndexMap;
use time::PrimitiveDateTime;

use super::ContestError;

/// Flat points awarded for any positive credit on a problem.
const BASE_SCORE: f64 = 10.0;
/// Pool split between the solve-equivalents of a problem.
const SOLVE_POOL: f64 = 100.0;

/// Submission record of one member on one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    /// Member identifier.
    pub id: String,
    /// Number of attempts counted against the member.
    pub num_attempts: i64,
    /// Credit in `[0, 1]`, above 1 for extra credit. 0 means not credited yet.
    pub grade: f64,
    /// Raw answers submitted, oldest first.
    pub responses: Vec<String>,
}

impl Person {
    /// Build a record, normalising the attempt counter.
    pub fn new(id: String, num_attempts: i64, grade: f64, responses: Vec<String>) -> Self {
        let mut person = Self {
            id,
            num_attempts,
            grade,
            responses,
        };
        person.normalize_attempts();
        person
    }

    /// Attempts never go negative, and credited members always count at least one.
    fn normalize_attempts(&mut self) {
        if self.num_attempts < 0 {
            self.num_attempts = 0;
        }
        if self.grade > 0.0 && self.num_attempts < 1 {
            self.num_attempts = 1;
        }
    }
}

/// A single timed question with its acceptance window and submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Identifier minted by the owning season.
    pub id: String,
    /// Statement shown to members.
    pub problem_text: String,
    /// Canonical answer; compared numerically when it parses as a number.
    pub answer: String,
    /// First instant (inclusive) submissions are accepted.
    pub start_time: PrimitiveDateTime,
    /// Last instant (inclusive) submissions are accepted.
    pub end_time: PrimitiveDateTime,
    /// Season tag used for score aggregation.
    pub season_id: String,
    persons: IndexMap<String, Person>,
}

impl Problem {
    /// Create a problem without any submissions.
    pub fn new(
        id: String,
        problem_text: String,
        answer: String,
        start_time: PrimitiveDateTime,
        end_time: PrimitiveDateTime,
        season_id: String,
    ) -> Self {
        Self {
            id,
            problem_text,
            answer,
            start_time,
            end_time,
            season_id,
            persons: IndexMap::new(),
        }
    }

    /// Look up a member's record.
    pub fn person(&self, person_id: &str) -> Option<&Person> {
        self.persons.get(person_id)
    }

    pub(crate) fn person_mut(&mut self, person_id: &str) -> Option<&mut Person> {
        self.persons.get_mut(person_id)
    }

    /// Records in insertion order.
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    /// Insert a new member record; existing records are never overwritten.
    pub fn add_person(
        &mut self,
        person_id: &str,
        num_attempts: i64,
        grade: f64,
        responses: Vec<String>,
    ) -> Result<&Person, ContestError> {
        if self.persons.contains_key(person_id) {
            return Err(ContestError::DuplicatePerson {
                problem_id: self.id.clone(),
                person_id: person_id.to_owned(),
            });
        }

        let person = Person::new(person_id.to_owned(), num_attempts, grade, responses);
        let entry = self.persons.entry(person_id.to_owned()).or_insert(person);
        Ok(&*entry)
    }

    /// Add `num_attempts` to the counter when `add`, overwrite it otherwise.
    pub fn set_attempts(
        &mut self,
        person_id: &str,
        num_attempts: i64,
        add: bool,
    ) -> Result<&Person, ContestError> {
        let person = self
            .persons
            .get_mut(person_id)
            .ok_or_else(|| ContestError::PersonNotFound(person_id.to_owned()))?;

        if add {
            person.num_attempts = person
                .num_attempts
                .checked_add(num_attempts)
                .ok_or_else(|| ContestError::InvalidFormat("Attempts out of range.".into()))?;
        } else {
            person.num_attempts = num_attempts;
        }
        person.normalize_attempts();

        Ok(&*person)
    }

    /// Store a new grade, keeping the higher one when `max_out`.
    ///
    /// Returns whether the stored grade changed.
    pub fn set_grade(
        &mut self,
        person_id: &str,
        grade: f64,
        max_out: bool,
    ) -> Result<bool, ContestError> {
        let person = self
            .persons
            .get_mut(person_id)
            .ok_or_else(|| ContestError::PersonNotFound(person_id.to_owned()))?;

        let previous = person.grade;
        person.grade = if max_out {
            previous.max(grade)
        } else {
            grade
        };
        person.normalize_attempts();

        Ok(person.grade != previous)
    }

    /// Replace the canonical answer.
    pub fn set_answer(&mut self, answer: String) {
        self.answer = answer;
    }

    /// Canonical answer as a number, when it is one.
    pub fn numeric_answer(&self) -> Option<f64> {
        parse_number(&self.answer)
    }

    /// Whether `now` lies inside `[start_time, end_time]`.
    pub fn in_interval(&self, now: PrimitiveDateTime) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Points earned by every credited member on this problem.
    pub fn solve_scores(&self) -> Vec<(String, f64)> {
        let solves: f64 = self
            .persons
            .values()
            .map(|person| person.grade.clamp(0.0, 1.0))
            .sum();

        if solves <= 0.0 {
            return Vec::new();
        }

        let solve_score = SOLVE_POOL / solves;
        self.persons
            .values()
            .filter(|person| person.grade > 0.0)
            .map(|person| {
                let attempts = person.num_attempts.max(1) as f64;
                let score = person.grade * (BASE_SCORE + solve_score / attempts);
                (person.id.clone(), score)
            })
            .collect()
    }
}

/// Parse free text as a finite number, ignoring surrounding whitespace.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
