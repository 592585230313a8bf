use crate::helpers::{RecordingSink, TestPlanner, local};
use famplan::messages;
use famplan::task::{TaskId, TaskStatus};

#[tokio::test]
async fn done_completes_once_then_reports_not_found() {
    let env = TestPlanner::start(local(1, 8, 0));
    let id = env.create_task("c1", "Fix shelf", "Dad", "18:00").await;
    let task_id = TaskId::new(id.clone());

    let done = format!("/done {id}");
    assert_eq!(env.say("c1", &done).await, [messages::task_completed(&task_id)]);
    assert_eq!(env.say("c1", &done).await, [messages::TASK_NOT_FOUND]);

    let task = env.planner.store().get(&task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(env.planner.scheduler().armed_for(&task_id).is_none());
}

#[tokio::test]
async fn done_from_another_conversation_completes_the_task() {
    let env = TestPlanner::start(local(1, 8, 0));
    let id = env.create_task("parents", "Book dentist", "Mom", "12:00").await;

    let reply = env.say("kids", &format!("/done {id}")).await;
    assert_eq!(reply, [messages::task_completed(&TaskId::new(id))]);
    assert!(env.planner.store().find_pending().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_or_missing_id_leaves_tasks_untouched() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.create_task("c1", "Fix shelf", "Dad", "18:00").await;

    assert_eq!(env.say("c1", "/done").await, [messages::DONE_USAGE]);
    assert_eq!(
        env.say("c1", "/done 00000000000000000000000000000000").await,
        [messages::TASK_NOT_FOUND]
    );
    assert_eq!(env.planner.store().find_pending().unwrap().len(), 1);
}

#[tokio::test]
async fn completed_task_is_never_reminded() {
    let env = TestPlanner::start(local(1, 8, 0));
    let id = env.create_task("c1", "Fix shelf", "Dad", "09:00").await;
    env.say("c1", &format!("/done {id}")).await;

    let sink = RecordingSink::default();
    let scheduler = env.planner.scheduler();
    for at in [local(1, 9, 0), local(2, 9, 0), local(3, 9, 0)] {
        scheduler.tick_at(at, &sink).await;
    }
    assert!(sink.sent().is_empty());
}
