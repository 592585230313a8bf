use crate::helpers::{TestPlanner, local};
use famplan::messages;
use famplan::task::TaskStatus;

#[tokio::test]
async fn valid_dialogue_persists_exactly_one_pending_task() {
    let env = TestPlanner::start(local(1, 8, 0));

    assert_eq!(env.say("c1", "/addtask").await, [messages::ASK_DESCRIPTION]);
    assert_eq!(env.say("c1", "Take out trash").await, [messages::ASK_ASSIGNEE]);
    assert_eq!(env.say("c1", "Alex").await, [messages::ASK_DEADLINE]);
    assert_eq!(env.say("c1", "7:6:2025").await, [messages::ASK_REMINDER_TIME]);
    let reply = env.say("c1", "20:00").await;

    let pending = env.planner.store().find_pending().unwrap();
    assert_eq!(pending.len(), 1);
    let task = &pending[0];
    assert_eq!(reply, [messages::task_created(&task.id)]);
    assert_eq!(task.description, "Take out trash");
    assert_eq!(task.assignee, "Alex");
    assert_eq!(task.deadline.unwrap().to_string(), "07:06:2025");
    assert_eq!(task.reminder_time.to_string(), "20:00");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.conversation_id.as_str(), "c1");
    assert!(env.planner.scheduler().armed_for(&task.id).is_some());
}

#[tokio::test]
async fn malformed_fields_are_retried_without_limit() {
    let env = TestPlanner::start(local(1, 8, 0));
    env.say("c1", "/addtask").await;
    env.say("c1", "Take out trash").await;
    env.say("c1", "Alex").await;

    for _ in 0..5 {
        assert_ne!(env.say("c1", "2025-06-07").await, [messages::ASK_REMINDER_TIME]);
    }
    env.say("c1", "07:06:2025").await;
    for bad in ["25:00", "12:75", "8", "8:00pm"] {
        let reply = env.say("c1", bad).await;
        assert!(reply[0].contains("HH:MM"), "unexpected reply {reply:?}");
    }
    assert!(env.planner.store().find_pending().unwrap().is_empty());

    env.say("c1", "8:05").await;
    let pending = env.planner.store().find_pending().unwrap();
    assert_eq!(pending[0].reminder_time.to_string(), "08:05");
}

#[tokio::test]
async fn cancel_at_any_stage_writes_nothing() {
    let env = TestPlanner::start(local(1, 8, 0));
    let steps = ["Take out trash", "Alex", "07:06:2025"];

    for stop_after in 0..=steps.len() {
        let conversation = format!("c{stop_after}");
        env.say(&conversation, "/addtask").await;
        for step in &steps[..stop_after] {
            env.say(&conversation, step).await;
        }
        assert_eq!(env.say(&conversation, "/cancel").await, [messages::CANCELLED]);
        assert!(!env.planner.engine().has_session(&conversation.as_str().into()));
    }

    assert!(env.planner.store().find_pending().unwrap().is_empty());
    assert!(env.planner.scheduler().armed().is_empty());
}

#[tokio::test]
async fn parallel_conversations_do_not_interfere() {
    let env = TestPlanner::start(local(1, 8, 0));

    let (a, b) = tokio::join!(
        env.create_task("family-a", "Feed cat", "Lena", "09:00"),
        env.create_task("family-b", "Water plants", "Oleg", "09:00"),
    );
    assert_ne!(a, b);

    let pending = env.planner.store().find_pending().unwrap();
    assert_eq!(pending.len(), 2);
    for task in &pending {
        match task.conversation_id.as_str() {
            "family-a" => assert_eq!(task.assignee, "Lena"),
            "family-b" => assert_eq!(task.assignee, "Oleg"),
            other => panic!("unexpected conversation {other}"),
        }
    }
}

#[tokio::test]
async fn text_without_dialogue_gets_a_hint() {
    let env = TestPlanner::start(local(1, 8, 0));
    assert_eq!(env.say("c1", "hello").await, [messages::NO_SESSION]);
    assert_eq!(env.say("c1", "/start").await, [messages::GREETING]);
}
