use indexmap::IndexMap;
use time::PrimitiveDateTime;

use super::{ContestError, ids::IdGenerator, season::Season};

/// Broadcast waiting for its delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMessage {
    /// Message body.
    pub text: String,
    /// Attachment reference held by the messaging gateway.
    pub attachment: Option<String>,
    /// Earliest delivery time.
    pub time: PrimitiveDateTime,
    /// Target channel.
    pub channel: String,
}

/// Channel and role references configured for the community.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constants {
    /// Channel receiving grading notifications and dispatch failures.
    pub admin_channel: Option<String>,
    /// Channel holding the live leaderboard message.
    pub leaderboard_output_channel: Option<String>,
    /// Id of the live leaderboard message, once posted.
    pub leaderboard_output_message: Option<String>,
    /// Channel problems are announced in.
    pub potd_output_channel: Option<String>,
    /// Channel solutions are posted in when a window closes.
    pub potd_solution_channel: Option<String>,
    /// Role of the members taking part in the competition.
    pub year_role: Option<String>,
    /// Community (server) identifier.
    pub server_id: Option<String>,
}

/// Top-level process state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Driver {
    /// The single active season.
    pub season: Season,
    /// Community configuration persisted alongside the season.
    pub constants: Constants,
    scheduled_messages: IndexMap<String, ScheduledMessage>,
}

impl Driver {
    /// Assemble a driver from its parts.
    pub fn new(
        season: Season,
        constants: Constants,
        scheduled_messages: IndexMap<String, ScheduledMessage>,
    ) -> Self {
        Self {
            season,
            constants,
            scheduled_messages,
        }
    }

    /// Pending broadcasts keyed by id, in scheduling order.
    pub fn scheduled_messages(&self) -> &IndexMap<String, ScheduledMessage> {
        &self.scheduled_messages
    }

    /// Queue a broadcast under a freshly generated id.
    pub fn add_scheduled_message(
        &mut self,
        ids: &dyn IdGenerator,
        message: ScheduledMessage,
    ) -> String {
        let mut id = ids.next_id();
        while self.scheduled_messages.contains_key(&id) {
            id = ids.next_id();
        }
        self.scheduled_messages.insert(id.clone(), message);
        id
    }

    /// Drop a pending broadcast.
    pub fn remove_scheduled_message(&mut self, id: &str) -> Result<ScheduledMessage, ContestError> {
        self.scheduled_messages
            .shift_remove(id)
            .ok_or_else(|| ContestError::ScheduledMessageNotFound(id.to_owned()))
    }

    /// Remove and return every broadcast due at `now`.
    ///
    /// Entries leave the map before delivery is attempted, so each one is
    /// handed out at most once.
    pub fn take_due_messages(&mut self, now: PrimitiveDateTime) -> Vec<(String, ScheduledMessage)> {
        let due: Vec<String> = self
            .scheduled_messages
            .iter()
            .filter(|(_, message)| message.time <= now)
            .map(|(id, _)| id.clone())
            .collect();

        due.into_iter()
            .filter_map(|id| {
                self.scheduled_messages
                    .shift_remove(&id)
                    .map(|message| (id, message))
            })
            .collect()
    }

    /// Advance the season counter.
    pub fn create_season(&mut self, increment: i64) -> Result<i64, ContestError> {
        self.season.start_new_season(increment)
    }
}
