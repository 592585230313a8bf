use crate::helpers::{RecordingSink, TestPlanner, local};

#[tokio::test]
async fn pending_reminders_survive_a_restart() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Walk dog", "Sam", "09:00").await;
    let id = env.create_task("c2", "Buy bread", "Ann", "10:00").await;
    env.say("c2", &format!("/done {id}")).await;

    let env = env.restart();
    let armed = env.planner.scheduler().armed();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].conversation_id.as_str(), "c1");

    let sink = RecordingSink::default();
    env.planner.scheduler().tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn restart_within_the_minute_does_not_repeat_a_reminder() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Walk dog", "Sam", "09:00").await;
    let sink = RecordingSink::default();
    env.planner.scheduler().tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(sink.sent().len(), 1);

    env.clock.set(local(1, 9, 0));
    let env = env.restart();
    let report = env.planner.scheduler().tick_at(local(1, 9, 0), &sink).await;
    assert_eq!(report.suppressed, 1);
    assert_eq!(sink.sent().len(), 1);

    env.planner.scheduler().tick_at(local(2, 9, 0), &sink).await;
    assert_eq!(sink.sent().len(), 2);
}
