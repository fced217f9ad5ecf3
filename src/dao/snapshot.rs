//! Conversion of the in-memory [`Driver`] to and from its four JSON documents.

use std::{collections::VecDeque, sync::Arc};

use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use time::UtcOffset;
use tracing::{debug, info};

use crate::{
    dao::{
        kv_store::KeyValueStore,
        models::{
            ConstantsEntity, IdEntity, PersonEntity, ProblemEntity, ScheduledDocument,
            ScheduledMessageEntity, SeasonDocument, UngradedAnswerEntity, UngradedDocument,
        },
        storage::{StorageError, StorageResult},
    },
    state::{
        driver::{Constants, Driver, ScheduledMessage},
        problem::Problem,
        season::{Season, UngradedAnswer},
        timestamp::{format_timestamp, parse_timestamp},
    },
};

/// Key of the season (problems) document.
pub const SEASON_KEY: &str = "data";
/// Key of the ungraded-queue document.
pub const UNGRADED_KEY: &str = "ungraded";
/// Key of the scheduled-messages document.
pub const SCHEDULED_KEY: &str = "scheduled_messages";
/// Key of the constants document.
pub const CONSTANTS_KEY: &str = "constants";

/// Reads and writes full [`Driver`] snapshots through a [`KeyValueStore`].
#[derive(Clone)]
pub struct SnapshotRepository {
    store: Arc<dyn KeyValueStore>,
    offset: UtcOffset,
}

impl SnapshotRepository {
    /// Wrap `store`; `offset` resolves timestamps carrying an explicit zone.
    pub fn new(store: Arc<dyn KeyValueStore>, offset: UtcOffset) -> Self {
        Self { store, offset }
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Rebuild the driver from storage. Missing documents start empty.
    pub async fn load(&self) -> StorageResult<Driver> {
        let problems: SeasonDocument = self.load_document(SEASON_KEY).await?.unwrap_or_default();
        let ungraded: UngradedDocument =
            self.load_document(UNGRADED_KEY).await?.unwrap_or_default();
        let scheduled: ScheduledDocument =
            self.load_document(SCHEDULED_KEY).await?.unwrap_or_default();
        let constants: ConstantsEntity =
            self.load_document(CONSTANTS_KEY).await?.unwrap_or_default();

        let mut season = Season::new();
        for entity in problems {
            season.insert_problem(self.problem_from_entity(entity)?);
        }
        season.restore_queue(ungraded.into_iter().map(UngradedAnswer::from).collect());
        season.current_season = constants.current_season;

        let scheduled = scheduled
            .into_iter()
            .map(|(id, entity)| Ok((id, self.scheduled_from_entity(entity)?)))
            .collect::<StorageResult<IndexMap<_, _>>>()?;

        let driver = Driver::new(season, constants.into(), scheduled);
        info!(
            problems = driver.season.problems().count(),
            ungraded = driver.season.ungraded_answers().len(),
            scheduled = driver.scheduled_messages().len(),
            season = driver.season.current_season,
            "loaded state snapshot"
        );
        Ok(driver)
    }

    /// Write every document of `driver`.
    pub async fn save(&self, driver: &Driver) -> StorageResult<()> {
        let problems: SeasonDocument = driver.season.problems().map(ProblemEntity::from).collect();
        let ungraded: UngradedDocument = driver
            .season
            .ungraded_answers()
            .iter()
            .map(UngradedAnswerEntity::from)
            .collect();
        let scheduled: ScheduledDocument = driver
            .scheduled_messages()
            .iter()
            .map(|(id, message)| (id.clone(), ScheduledMessageEntity::from(message)))
            .collect();
        let mut constants = ConstantsEntity::from(&driver.constants);
        constants.current_season = driver.season.current_season;

        self.save_document(SEASON_KEY, &problems).await?;
        self.save_document(UNGRADED_KEY, &ungraded).await?;
        self.save_document(SCHEDULED_KEY, &scheduled).await?;
        self.save_document(CONSTANTS_KEY, &constants).await?;
        debug!("stored state snapshot");
        Ok(())
    }

    async fn load_document<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(bytes) = self.store.load(key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StorageError::corrupt(key, err))
    }

    async fn save_document<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode {
            document: key.to_owned(),
            source,
        })?;
        self.store.save(key, bytes).await
    }

    fn problem_from_entity(&self, entity: ProblemEntity) -> StorageResult<Problem> {
        let start_time = parse_timestamp(&entity.start_time, self.offset)
            .map_err(|err| StorageError::corrupt(SEASON_KEY, err))?;
        let end_time = parse_timestamp(&entity.end_time, self.offset)
            .map_err(|err| StorageError::corrupt(SEASON_KEY, err))?;

        let mut problem = Problem::new(
            entity.id.into(),
            entity.problem_text,
            entity.answer,
            start_time,
            end_time,
            entity.season_id.into(),
        );
        for person in entity.persons {
            problem
                .add_person(
                    &person.id,
                    person.num_attempts,
                    person.grade,
                    person.responses,
                )
                .map_err(|err| StorageError::corrupt(SEASON_KEY, err))?;
        }
        Ok(problem)
    }

    fn scheduled_from_entity(
        &self,
        entity: ScheduledMessageEntity,
    ) -> StorageResult<ScheduledMessage> {
        let time = parse_timestamp(&entity.time, self.offset)
            .map_err(|err| StorageError::corrupt(SCHEDULED_KEY, err))?;
        Ok(ScheduledMessage {
            text: entity.text,
            attachment: entity.filename,
            time,
            channel: entity.channel.into(),
        })
    }
}

impl From<&Problem> for ProblemEntity {
    fn from(problem: &Problem) -> Self {
        Self {
            id: problem.id.as_str().into(),
            problem_text: problem.problem_text.clone(),
            answer: problem.answer.clone(),
            start_time: format_timestamp(problem.start_time),
            end_time: format_timestamp(problem.end_time),
            season_id: problem.season_id.as_str().into(),
            persons: problem
                .persons()
                .map(|person| PersonEntity {
                    id: person.id.clone(),
                    num_attempts: person.num_attempts,
                    grade: person.grade,
                    responses: person.responses.clone(),
                })
                .collect(),
        }
    }
}

impl From<&UngradedAnswer> for UngradedAnswerEntity {
    fn from(answer: &UngradedAnswer) -> Self {
        Self {
            problem_id: answer.problem_id.as_str().into(),
            person_id: answer.person_id.as_str().into(),
            answer: answer.answer.clone(),
            filename: answer.attachment.clone(),
        }
    }
}

impl From<UngradedAnswerEntity> for UngradedAnswer {
    fn from(entity: UngradedAnswerEntity) -> Self {
        Self {
            problem_id: entity.problem_id.into(),
            person_id: entity.person_id.into(),
            answer: entity.answer,
            attachment: entity.filename,
        }
    }
}

impl From<&ScheduledMessage> for ScheduledMessageEntity {
    fn from(message: &ScheduledMessage) -> Self {
        Self {
            text: message.text.clone(),
            filename: message.attachment.clone(),
            time: format_timestamp(message.time),
            channel: message.channel.as_str().into(),
        }
    }
}

impl From<&Constants> for ConstantsEntity {
    fn from(constants: &Constants) -> Self {
        let id = |value: &Option<String>| value.as_deref().map(IdEntity::from);
        Self {
            current_season: 0,
            admin_channel: id(&constants.admin_channel),
            leaderboard_output_channel: id(&constants.leaderboard_output_channel),
            leaderboard_output_message: id(&constants.leaderboard_output_message),
            potd_output_channel: id(&constants.potd_output_channel),
            potd_solution_channel: id(&constants.potd_solution_channel),
            year_role: id(&constants.year_role),
            server_id: id(&constants.server_id),
        }
    }
}

impl From<ConstantsEntity> for Constants {
    fn from(entity: ConstantsEntity) -> Self {
        Self {
            admin_channel: entity.admin_channel.map(String::from),
            leaderboard_output_channel: entity.leaderboard_output_channel.map(String::from),
            leaderboard_output_message: entity.leaderboard_output_message.map(String::from),
            potd_output_channel: entity.potd_output_channel.map(String::from),
            potd_solution_channel: entity.potd_solution_channel.map(String::from),
            year_role: entity.year_role.map(String::from),
            server_id: entity.server_id.map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, offset};

    use super::*;
    use crate::{
        dao::kv_store::MemoryStore,
        state::{ids::SequentialIds, season::NewProblem},
    };

    fn repository(store: &MemoryStore) -> SnapshotRepository {
        SnapshotRepository::new(Arc::new(store.clone()), offset!(-5))
    }

    fn populated_driver() -> Driver {
        let mut driver = Driver::default();
        driver.create_season(2).unwrap();
        driver.constants.admin_channel = Some("900".into());
        driver.constants.year_role = Some("77".into());

        let first = driver
            .season
            .add_problem(NewProblem {
                problem_text: "First".into(),
                answer: "12".into(),
                start_time: datetime!(2025-03-01 00:00),
                end_time: datetime!(2025-03-02 00:00),
                season_id: None,
            })
            .id
            .clone();
        let second = driver
            .season
            .add_problem(NewProblem {
                problem_text: "Second".into(),
                answer: "None".into(),
                start_time: datetime!(2025-03-02 00:00),
                end_time: datetime!(2025-03-03 00:00),
                season_id: Some("1".into()),
            })
            .id
            .clone();

        let now = datetime!(2025-03-01 12:00);
        driver
            .season
            .submit_answer(&first, "zed", "11", None, now)
            .unwrap();
        driver
            .season
            .submit_answer(&first, "amy", "12", None, now)
            .unwrap();
        driver
            .season
            .submit_answer(&first, "zed", "12", None, now)
            .unwrap();
        driver.season.set_grade(&second, "bo", 1.5, false).unwrap();
        driver
            .season
            .add_answer(
                &second,
                "amy",
                "proof",
                Some("a.png".into()),
                datetime!(2025-03-02 01:00),
            )
            .unwrap();

        driver.add_scheduled_message(
            &SequentialIds::default(),
            ScheduledMessage {
                text: "hello".into(),
                attachment: None,
                time: datetime!(2025-03-04 09:30),
                channel: "123".into(),
            },
        );
        driver
    }

    #[tokio::test]
    async fn snapshot_round_trip_preserves_state() {
        let store = MemoryStore::new();
        let repo = repository(&store);
        let driver = populated_driver();

        repo.save(&driver).await.unwrap();
        let restored = repo.load().await.unwrap();

        assert_eq!(restored, driver);
        let order: Vec<_> = restored
            .season
            .problem("1")
            .unwrap()
            .persons()
            .map(|person| person.id.as_str())
            .collect();
        assert_eq!(order, vec!["zed", "amy"]);
        assert_eq!(restored.season.last_problem_id(), 2);
    }

    #[tokio::test]
    async fn fractional_window_survives_reload() {
        let store = MemoryStore::new();
        let repo = repository(&store);
        let mut driver = Driver::default();
        let id = driver
            .season
            .add_problem(NewProblem {
                problem_text: "Timed".into(),
                answer: "1".into(),
                start_time: parse_timestamp("2025-03-14T11:00:00.250Z", offset!(-5)).unwrap(),
                end_time: parse_timestamp("2025-03-14T12:00:00.750Z", offset!(-5)).unwrap(),
                season_id: None,
            })
            .id
            .clone();

        repo.save(&driver).await.unwrap();
        let restored = repo.load().await.unwrap();

        assert_eq!(restored, driver);
        let late = datetime!(2025-03-14 07:00:00.5);
        assert_eq!(
            restored.season.problem(&id).unwrap().in_interval(late),
            driver.season.problem(&id).unwrap().in_interval(late)
        );
    }

    #[tokio::test]
    async fn documents_use_the_persisted_layout() {
        let store = MemoryStore::new();
        repository(&store).save(&populated_driver()).await.unwrap();

        let constants: serde_json::Value =
            serde_json::from_slice(&store.get(CONSTANTS_KEY).unwrap()).unwrap();
        assert_eq!(constants["CURRENT_SEASON"], 2);
        assert_eq!(constants["admin_channel"], "900");
        assert!(constants["potd_output_channel"].is_null());

        let data: serde_json::Value =
            serde_json::from_slice(&store.get(SEASON_KEY).unwrap()).unwrap();
        assert_eq!(data[0]["start_time"], "03-01-2025 00:00:00");
        assert_eq!(data[0]["persons"][0]["responses"][1], "12");

        let ungraded: serde_json::Value =
            serde_json::from_slice(&store.get(UNGRADED_KEY).unwrap()).unwrap();
        assert_eq!(ungraded[0]["filename"], "a.png");

        let scheduled: serde_json::Value =
            serde_json::from_slice(&store.get(SCHEDULED_KEY).unwrap()).unwrap();
        assert_eq!(scheduled["1"]["time"], "03-04-2025 09:30:00");
    }

    #[tokio::test]
    async fn empty_store_loads_default_driver() {
        let store = MemoryStore::new();
        let driver = repository(&store).load().await.unwrap();
        assert_eq!(driver, Driver::default());
    }

    #[tokio::test]
    async fn corrupt_documents_are_reported() {
        let store = MemoryStore::new();
        store.insert(UNGRADED_KEY, "{not json");
        let err = repository(&store).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref document, .. } if document == UNGRADED_KEY));
    }
}
