use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Value, json};
use tempfile::TempDir;
use time::{Duration, macros::datetime};

use potd_back::{
    config::AppConfig,
    dao::kv_store::MemoryStore,
    dto::{command::CommandRequest, reply::CommandReply},
    export::{ExportSink, JsonSheetSink},
    gateway::RecordingGateway,
    services::{
        command_service::{self, ADMIN_ONLY},
        leaderboard_service, schedule_service,
    },
    state::{
        AppState, Collaborators, SharedState,
        clock::FixedClock,
        driver::{Constants, Driver},
        ids::SequentialIds,
        season::Season,
    },
};

const ADMIN: (&str, &str) = ("900", "Grace");
const ADA: (&str, &str) = ("1", "Ada");
const ALAN: (&str, &str) = ("2", "Alan");

struct Harness {
    state: SharedState,
    gateway: RecordingGateway,
    store: MemoryStore,
    clock: Arc<FixedClock>,
    export: JsonSheetSink,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let gateway = RecordingGateway::new();
        gateway.add_member(ADA.0, ADA.1, &["year"]);
        gateway.add_member(ALAN.0, ALAN.1, &["year"]);
        gateway.add_member(ADMIN.0, ADMIN.1, &[]);

        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(datetime!(2025-03-01 12:00)));
        let export = JsonSheetSink::new(dir.path().join("sheets.json"));

        let constants = Constants {
            admin_channel: Some("admin".into()),
            leaderboard_output_channel: Some("board".into()),
            potd_output_channel: Some("potd".into()),
            potd_solution_channel: Some("solutions".into()),
            year_role: Some("year".into()),
            ..Constants::default()
        };
        let state = AppState::new(
            AppConfig::default(),
            Collaborators {
                store: Arc::new(store.clone()),
                gateway: Arc::new(gateway.clone()),
                export: Arc::new(export.clone()),
                clock: clock.clone(),
                ids: Arc::new(SequentialIds::default()),
            },
            Driver::new(Season::new(), constants, IndexMap::new()),
        );

        Self {
            state,
            gateway,
            store,
            clock,
            export,
            _dir: dir,
        }
    }

    async fn run_as(
        &self,
        (id, name): (&str, &str),
        is_admin: bool,
        attachments: &[&str],
        command: Value,
    ) -> CommandReply {
        let request: CommandRequest = serde_json::from_value(json!({
            "invoker": { "id": id, "display_name": name, "is_admin": is_admin },
            "attachments": attachments,
            "command": command,
        }))
        .unwrap();
        command_service::execute(&self.state, request).await.unwrap()
    }

    async fn admin(&self, command: Value) -> String {
        text(self.run_as(ADMIN, true, &[], command).await)
    }

    async fn member(&self, who: (&str, &str), command: Value) -> String {
        text(self.run_as(who, false, &[], command).await)
    }

    async fn create_problem(&self, answer: Option<&str>) -> String {
        let reply = self
            .admin(json!({
                "type": "create-problem",
                "answer": answer,
                "start_time": "03-01-2025 00:00",
                "end_time": "03-02-2025 00:00",
                "problem_text": "Find x.",
            }))
            .await;
        reply
            .rsplit(' ')
            .next()
            .map(str::to_owned)
            .unwrap_or_default()
    }

    fn stored(&self, key: &str) -> Option<Value> {
        self.store
            .get(key)
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }
}

fn text(reply: CommandReply) -> String {
    reply.first_text().unwrap_or_default().to_owned()
}

#[tokio::test]
async fn numeric_answers_are_graded_on_the_spot() {
    let harness = Harness::new();
    let problem = harness.create_problem(Some("42")).await;
    assert_eq!(problem, "1");

    let reply = harness
        .member(ADA, json!({ "type": "submit-answer", "problem_id": "1", "answer": "42.0" }))
        .await;
    assert_eq!(reply, "Your answer `42.0` was correct.");
    let reply = harness
        .member(ALAN, json!({ "type": "submit-answer", "problem_id": "1", "answer": "41" }))
        .await;
    assert_eq!(reply, "Your answer `41` was wrong.");

    let admin_log: Vec<String> = harness
        .gateway
        .messages_in("admin")
        .into_iter()
        .map(|message| message.text)
        .collect();
    assert_eq!(
        admin_log,
        vec![
            "Ada's answer of `42.0` was marked correct.".to_owned(),
            "Alan's answer of `41` was marked wrong.".to_owned(),
        ]
    );

    let rankings = harness
        .member(ALAN, json!({ "type": "get-rankings" }))
        .await;
    assert!(rankings.contains("Ada"));
    assert!(rankings.contains("110.00"));
    assert!(!rankings.contains("Alan"));

    let mine = harness.member(ALAN, json!({ "type": "get-my-rank" })).await;
    assert_eq!(mine, "You did not have any points in that season.");
}

#[tokio::test]
async fn free_text_answers_wait_for_a_grader() {
    let harness = Harness::new();
    harness.create_problem(None).await;

    let reply = text(
        harness
            .run_as(
                ADA,
                false,
                &["img-1"],
                json!({ "type": "submit-answer", "problem_id": "1", "answer": "see picture" }),
            )
            .await,
    );
    assert_eq!(reply, "Answer added.");
    assert!(!harness.gateway.released().contains(&"img-1".to_owned()));
    assert_eq!(
        harness.gateway.messages_in("admin").last().map(|m| m.text.clone()),
        Some("Answer Added by Ada.".to_owned())
    );

    let peek = harness
        .run_as(ADMIN, true, &[], json!({ "type": "peek-last" }))
        .await;
    assert_eq!(peek.messages[0].attachment.as_deref(), Some("img-1"));
    assert!(peek.messages[0].text.ends_with("Person: Ada -- 1"));

    let reply = harness
        .admin(json!({ "type": "grade-last", "grade": "0.5", "feedback": "Nice" }))
        .await;
    assert_eq!(reply, "Last answer graded successfully.");

    let dms = harness.gateway.direct_messages();
    let verdict = dms.last().unwrap();
    assert_eq!(verdict.target, "1");
    assert_eq!(
        verdict.text,
        "Grader: Grace\nYour answer `see picture` was graded 0.5/1.\n\n**Feedback: **Nice"
    );
    assert_eq!(verdict.attachment.as_deref(), Some("img-1"));
    assert!(harness.gateway.released().contains(&"img-1".to_owned()));

    let reply = harness
        .admin(json!({ "type": "grade-last", "grade": 1 }))
        .await;
    assert_eq!(reply, "No ungraded answers.");
    let reply = harness
        .admin(json!({ "type": "grade-last", "grade": "half" }))
        .await;
    assert!(reply.starts_with("Please enter a decimal number"));
}

#[tokio::test]
async fn submissions_respect_the_window() {
    let harness = Harness::new();
    harness.create_problem(Some("7")).await;

    harness.clock.set(datetime!(2025-03-02 00:00));
    let on_the_edge = harness
        .member(ADA, json!({ "type": "submit-answer", "problem_id": "1", "answer": "7" }))
        .await;
    assert_eq!(on_the_edge, "Your answer `7` was correct.");

    harness.clock.advance(Duration::seconds(1));
    let late = text(
        harness
            .run_as(
                ALAN,
                false,
                &["img-late"],
                json!({ "type": "submit-answer", "problem_id": "1", "answer": "7" }),
            )
            .await,
    );
    assert_eq!(late, "Not in correct time interval.");
    assert!(harness.gateway.released().contains(&"img-late".to_owned()));

    let missing = harness
        .member(ADA, json!({ "type": "submit-answer", "problem_id": "99", "answer": "7" }))
        .await;
    assert_eq!(missing, "Problem 99 not found.");
}

#[tokio::test]
async fn admin_commands_are_refused_to_members() {
    let harness = Harness::new();
    let reply = harness
        .member(
            ADA,
            json!({ "type": "create-problem", "answer": "1", "problem_text": "x" }),
        )
        .await;
    assert_eq!(reply, ADMIN_ONLY);
    assert!(harness.stored("data").is_none());

    let season = harness.member(ADA, json!({ "type": "current-season" })).await;
    assert_eq!(season, "0");
}

#[tokio::test]
async fn every_command_commits_the_state() {
    let harness = Harness::new();
    harness.create_problem(Some("3")).await;

    let data = harness.stored("data").unwrap();
    assert_eq!(data[0]["id"], json!("1"));
    assert_eq!(data[0]["answer"], json!("3"));

    let reply = harness
        .admin(json!({ "type": "new-season" }))
        .await;
    assert_eq!(reply, "Season created successfully. New season: 1");
    assert_eq!(harness.stored("constants").unwrap()["CURRENT_SEASON"], json!(1));

    // A rejected command still commits.
    harness.state.driver().await.season.current_season = 5;
    let reply = harness
        .admin(json!({ "type": "delete-problem", "problem_id": "8" }))
        .await;
    assert_eq!(reply, "Problem 8 not found.");
    assert_eq!(harness.stored("constants").unwrap()["CURRENT_SEASON"], json!(5));

    harness.state.driver().await.season.current_season = 9;
    let reply = harness.admin(json!({ "type": "load" })).await;
    assert_eq!(reply, "Data loaded successfully.");
    assert_eq!(harness.state.driver().await.season.current_season, 5);
}

#[tokio::test]
async fn answer_corrections_regrade_past_responses() {
    let harness = Harness::new();
    harness.create_problem(Some("10")).await;
    harness
        .member(ADA, json!({ "type": "submit-answer", "problem_id": "1", "answer": "12" }))
        .await;

    let reply = harness
        .admin(json!({ "type": "update-answer", "problem_id": "1", "answer": "12" }))
        .await;
    assert_eq!(reply, "Answer set successfully.");
    assert_eq!(
        harness.gateway.direct_messages().last().map(|m| m.text.clone()),
        Some("Grader: Grace\nYour answer to problem 1 has been rescored to 1.0.".to_owned())
    );

    let reply = harness
        .admin(json!({
            "type": "update-grade",
            "problem_id": "1",
            "member_id": "<@2>",
            "grade": 0.5,
        }))
        .await;
    assert_eq!(reply, "Person 2's grade updated to 0.5.");

    let reply = harness
        .admin(json!({
            "type": "update-attempts",
            "problem_id": "1",
            "member_id": "2",
            "delta": 2,
        }))
        .await;
    assert_eq!(reply, "Person 2's attempts updated to 3.");
}

#[tokio::test]
async fn problem_announcements_go_out_when_due() {
    let harness = Harness::new();
    let reply = text(
        harness
            .run_as(
                ADMIN,
                true,
                &["statement", "solution"],
                json!({
                    "type": "create-problem",
                    "answer": "5",
                    "start_time": "03-01-2025 13:00",
                    "end_time": "03-02-2025 13:00",
                }),
            )
            .await,
    );
    assert_eq!(reply, "Problem added successfully. Problem ID: 1");
    assert_eq!(harness.state.driver().await.scheduled_messages().len(), 2);

    let report = schedule_service::dispatch_due_messages(&harness.state)
        .await
        .unwrap();
    assert_eq!(report.delivered, 0);

    harness.clock.set(datetime!(2025-03-01 13:00));
    schedule_service::dispatch_due_messages(&harness.state)
        .await
        .unwrap();
    let announced = harness.gateway.messages_in("potd");
    assert_eq!(announced.len(), 1);
    assert!(announced[0].text.starts_with("**Grace:**\n<@&year> 03/01/2025 Problem:\n**Season ID:** 0\n**Problem ID:** 1"));
    assert_eq!(announced[0].attachment.as_deref(), Some("statement"));

    harness.clock.set(datetime!(2025-03-02 13:00));
    schedule_service::dispatch_due_messages(&harness.state)
        .await
        .unwrap();
    let solutions = harness.gateway.messages_in("solutions");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].text, "\u{200b}");
    assert_eq!(
        harness.gateway.released(),
        vec!["statement".to_owned(), "solution".to_owned()]
    );
}

#[tokio::test]
async fn failed_broadcasts_are_reported_and_dropped() {
    let harness = Harness::new();
    harness.gateway.fail_channel("broken");

    let reply = harness
        .admin(json!({
            "type": "schedule-message",
            "channel": "<#news>",
            "text": "Hello",
            "time": "03-01-2025 12:30",
        }))
        .await;
    assert_eq!(reply, "Message scheduled at 03-01-2025 12:30:00");
    harness
        .admin(json!({
            "type": "schedule-message",
            "channel": "broken",
            "text": "Lost",
            "time": "03-01-2025 12:30",
        }))
        .await;

    let listing = harness
        .run_as(ADMIN, true, &[], json!({ "type": "list-scheduled" }))
        .await;
    assert_eq!(listing.messages.len(), 2);
    assert!(listing.messages[0].text.contains("**Channel**: <#news>"));

    harness.clock.set(datetime!(2025-03-01 12:30));
    let report = schedule_service::dispatch_due_messages(&harness.state)
        .await
        .unwrap();
    assert_eq!((report.delivered, report.failed), (1, 1));
    assert_eq!(harness.gateway.messages_in("news")[0].text, "**Grace:**\nHello");
    assert_eq!(
        harness.gateway.messages_in("admin").last().map(|m| m.text.clone()),
        Some("Error sending scheduled message.".to_owned())
    );

    let again = schedule_service::dispatch_due_messages(&harness.state)
        .await
        .unwrap();
    assert_eq!((again.delivered, again.failed), (0, 0));
    assert_eq!(
        harness.admin(json!({ "type": "list-scheduled" })).await,
        "No scheduled messages."
    );
    assert_eq!(
        harness
            .admin(json!({ "type": "remove-scheduled", "id": "7" }))
            .await,
        "Could not find scheduled message 7."
    );
}

#[tokio::test]
async fn leaderboard_is_edited_in_place_and_reposted_when_lost() {
    let harness = Harness::new();
    harness.create_problem(Some("1")).await;
    harness
        .member(ADA, json!({ "type": "submit-answer", "problem_id": "1", "answer": "1" }))
        .await;

    leaderboard_service::refresh_leaderboard(&harness.state)
        .await
        .unwrap();
    let posted = harness.gateway.messages_in("board");
    assert_eq!(posted.len(), 1);
    assert!(posted[0].text.contains("Ada"));
    let first_id = harness
        .state
        .driver()
        .await
        .constants
        .leaderboard_output_message
        .clone()
        .unwrap();

    leaderboard_service::refresh_leaderboard(&harness.state)
        .await
        .unwrap();
    assert_eq!(harness.gateway.messages_in("board").len(), 1);
    assert_eq!(harness.gateway.edits().len(), 1);

    harness
        .state
        .driver()
        .await
        .constants
        .leaderboard_output_message = Some("deleted".into());
    leaderboard_service::refresh_leaderboard(&harness.state)
        .await
        .unwrap();
    assert_eq!(harness.gateway.messages_in("board").len(), 2);
    let new_id = harness
        .state
        .driver()
        .await
        .constants
        .leaderboard_output_message
        .clone()
        .unwrap();
    assert_ne!(new_id, first_id);
    assert_eq!(
        harness.stored("constants").unwrap()["leaderboard_output_message"],
        json!(new_id)
    );
}

#[tokio::test]
async fn seasons_are_archived_from_the_roster() {
    let harness = Harness::new();
    harness.create_problem(Some("2")).await;
    harness
        .member(ADA, json!({ "type": "submit-answer", "problem_id": "1", "answer": "2" }))
        .await;

    let roster = harness
        .admin(json!({ "type": "season-roster", "with_rank": true }))
        .await;
    let ada = roster.find("Ada").unwrap();
    let alan = roster.find("Alan").unwrap();
    assert!(ada < alan);

    harness.admin(json!({ "type": "new-season" })).await;
    let reply = harness.admin(json!({ "type": "archive-season" })).await;
    assert_eq!(reply, "Added season 0 to sheet 'POTD Sheet'.");

    let workbook = harness.export.read().await.unwrap();
    assert_eq!(workbook["POTD Sheet"]["Ada"]["0"], 110.0);
    assert_eq!(workbook["POTD Sheet"]["Alan"]["0"], 0.0);
}

#[tokio::test]
async fn overall_rankings_average_archived_seasons() {
    let harness = Harness::new();
    for (season, ada, alan) in [
        ("0", 0.0, 40.0),
        ("1", 100.0, 40.0),
        ("2", 80.0, 10.0),
        ("3", 60.0, 40.0),
        ("4", 90.0, 40.0),
    ] {
        harness
            .export
            .write_season_snapshot(
                "POTD Sheet",
                season,
                vec![("Ada".into(), ada), ("Alan".into(), alan), ("Left".into(), 500.0)],
            )
            .await
            .unwrap();
    }

    let ranked = harness.admin(json!({ "type": "overall-rankings" })).await;
    assert_eq!(
        ranked,
        "```Rank  Name  Points\n   1   Ada   82.50\n   2  Alan   40.00```"
    );

    let sorted = harness
        .admin(json!({ "type": "overall-rankings", "sort_by_name": true }))
        .await;
    assert_eq!(sorted, "```Points\n 82.50\n 40.00```");

    let empty = harness
        .admin(json!({ "type": "overall-rankings", "sheet": "Elsewhere" }))
        .await;
    assert_eq!(
        empty,
        "```Rank  Name  Points\n   1   Ada    0.00\n   1  Alan    0.00```"
    );

    let refused = harness
        .member(ADA, json!({ "type": "overall-rankings" }))
        .await;
    assert_eq!(refused, ADMIN_ONLY);
}

#[tokio::test]
async fn broadcasts_hand_attachment_references_to_the_gateway() {
    let harness = Harness::new();
    harness
        .run_as(
            ADMIN,
            true,
            &["chart", "table"],
            json!({
                "type": "schedule-message",
                "channel": "news",
                "text": "Results",
                "time": "03-01-2025 12:00",
            }),
        )
        .await;

    let report = schedule_service::dispatch_due_messages(&harness.state)
        .await
        .unwrap();
    assert_eq!((report.delivered, report.failed), (2, 0));
    let sent: Vec<_> = harness
        .gateway
        .messages_in("news")
        .into_iter()
        .map(|message| (message.text, message.attachment))
        .collect();
    assert_eq!(
        sent,
        vec![
            ("**Grace:**\nResults".to_owned(), Some("chart".to_owned())),
            ("**Grace:**".to_owned(), Some("table".to_owned())),
        ]
    );
    assert_eq!(
        harness.gateway.released(),
        vec!["chart".to_owned(), "table".to_owned()]
    );
}

#[tokio::test]
async fn overflowing_counters_are_refused() {
    let harness = Harness::new();
    harness.create_problem(Some("2")).await;
    harness
        .admin(json!({
            "type": "update-attempts",
            "problem_id": "1",
            "member_id": "2",
            "delta": 1,
        }))
        .await;

    let attempts = harness
        .admin(json!({
            "type": "update-attempts",
            "problem_id": "1",
            "member_id": "2",
            "delta": i64::MAX,
        }))
        .await;
    assert_eq!(attempts, "Attempts out of range.");

    assert_eq!(
        harness.admin(json!({ "type": "new-season" })).await,
        "Season created successfully. New season: 1"
    );
    let season = harness
        .admin(json!({ "type": "new-season", "increment": i64::MAX }))
        .await;
    assert_eq!(season, "Season out of range.");
    assert_eq!(harness.state.driver().await.season.current_season, 1);
}
