use crate::helpers::{RecordingSink, TestPlanner, local};
use chrono::{TimeZone, Utc};

#[tokio::test]
async fn reminder_fires_once_at_its_minute_and_again_next_day() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Walk dog", "Sam", "09:00").await;
    let scheduler = env.planner.scheduler();
    let sink = RecordingSink::default();

    scheduler.tick_at(local(1, 8, 59), &sink).await;
    assert_eq!(sink.sent().len(), 0);

    scheduler.tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(sink.sent().len(), 1);

    scheduler.tick_at(local(1, 9, 1), &sink).await;
    assert_eq!(sink.sent().len(), 1);

    scheduler.tick_at(local(2, 9, 0), &sink).await;
    assert_eq!(sink.sent().len(), 2);

    let reminder = &sink.sent()[0];
    assert_eq!(reminder.conversation_id.as_str(), "c1");
    assert!(reminder.text.contains("Walk dog"));
    assert!(reminder.text.contains("Sam"));
}

#[tokio::test]
async fn same_time_in_two_conversations_notifies_each_once() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Walk dog", "Sam", "09:00").await;
    env.create_task("c2", "Buy bread", "Ann", "09:00").await;
    let sink = RecordingSink::default();

    let report = env.planner.scheduler().tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(report.delivered, 2);

    let mut targets: Vec<String> = sink
        .sent()
        .iter()
        .map(|m| m.conversation_id.to_string())
        .collect();
    targets.sort();
    assert_eq!(targets, ["c1", "c2"]);
}

#[tokio::test]
async fn failed_delivery_does_not_block_other_conversations() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("blocked", "Walk dog", "Sam", "09:00").await;
    env.create_task("open", "Buy bread", "Ann", "09:00").await;
    let sink = RecordingSink::default();
    sink.fail_for("blocked");

    let report = env.planner.scheduler().tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(sink.sent()[0].conversation_id.as_str(), "open");
}

#[tokio::test]
async fn reminder_minute_is_read_in_the_reference_zone() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Walk dog", "Sam", "09:00").await;
    let sink = RecordingSink::default();
    let scheduler = env.planner.scheduler();

    // 09:00 in the UTC+3 reference zone is 06:00 UTC.
    let before = Utc.with_ymd_and_hms(2025, 6, 1, 5, 59, 0).single().unwrap();
    scheduler.tick_at(before, &sink).await;
    assert!(sink.sent().is_empty());

    let at = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).single().unwrap();
    scheduler.tick_at(at, &sink).await;
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn unreadable_row_does_not_silence_other_reminders() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Walk dog", "Sam", "09:00").await;

    let conn = rusqlite::Connection::open(env.config.store.resolved_path()).unwrap();
    conn.execute(
        "INSERT INTO tasks (id, description, assignee, reminder_time, status, conversation_id) \
         VALUES ('broken', 'Feed fish', 'Ann', '9am', 'pending', 'c2')",
        [],
    )
    .unwrap();
    drop(conn);

    let sink = RecordingSink::default();
    let report = env.planner.scheduler().tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(sink.sent()[0].conversation_id.as_str(), "c1");

    let listing = env.say("c1", "/tasks").await;
    assert_eq!(listing.len(), 1);
    assert!(listing[0].contains("Walk dog"));
}
