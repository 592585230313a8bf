use crate::helpers::{local, temp_config};
use famplan::channels::run_runtime;
use famplan::channels::stdio::JsonLinesAdapter;
use famplan::channels::traits::OutboundMessage;
use famplan::messages;
use famplan::scheduler::ManualClock;
use famplan::Planner;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio_util::sync::CancellationToken;

async fn send(input: &mut DuplexStream, conversation: &str, text: &str) {
    let line = serde_json::json!({ "conversation_id": conversation, "text": text });
    input
        .write_all(format!("{line}\n").as_bytes())
        .await
        .unwrap();
}

async fn next_message(output: &mut Lines<BufReader<DuplexStream>>) -> OutboundMessage {
    let line = tokio::time::timeout(Duration::from_secs(10), output.next_line())
        .await
        .expect("reply in time")
        .unwrap()
        .expect("output open");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn json_lines_session_creates_task_and_delivers_reminder() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(&dir);
    config.scheduler.tick_interval_secs = 1;
    let clock = Arc::new(ManualClock::new(local(1, 8, 0)));
    let planner = Planner::from_config(&config, clock.clone()).unwrap();

    let (mut input, adapter_in) = tokio::io::duplex(4096);
    let (adapter_out, output) = tokio::io::duplex(4096);
    let adapter = Arc::new(JsonLinesAdapter::new(adapter_in, adapter_out));
    let cancel = CancellationToken::new();
    let runtime = tokio::spawn(run_runtime(planner, adapter, cancel.clone()));
    let mut output = BufReader::new(output).lines();

    for (text, expected) in [
        ("/addtask", messages::ASK_DESCRIPTION),
        ("Vacuum", messages::ASK_ASSIGNEE),
        ("Ira", messages::ASK_DEADLINE),
        ("15:06:2025", messages::ASK_REMINDER_TIME),
    ] {
        send(&mut input, "77", text).await;
        let reply = next_message(&mut output).await;
        assert_eq!(reply.conversation_id.as_str(), "77");
        assert_eq!(reply.text, expected);
    }
    send(&mut input, "77", "09:00").await;
    assert!(next_message(&mut output).await.text.starts_with("Task added!"));

    clock.set(local(1, 9, 0));
    let reminder = next_message(&mut output).await;
    assert_eq!(reminder.conversation_id.as_str(), "77");
    assert!(reminder.text.contains("Vacuum"));

    drop(input);
    tokio::time::timeout(Duration::from_secs(10), runtime)
        .await
        .expect("runtime stops at EOF")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn cancellation_stops_the_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let planner =
        Planner::from_config(&config, Arc::new(ManualClock::new(local(1, 8, 0)))).unwrap();

    let (_input, adapter_in) = tokio::io::duplex(64);
    let (adapter_out, _output) = tokio::io::duplex(64);
    let adapter = Arc::new(JsonLinesAdapter::new(adapter_in, adapter_out));
    let cancel = CancellationToken::new();
    let runtime = tokio::spawn(run_runtime(planner, adapter, cancel.clone()));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(10), runtime)
        .await
        .expect("runtime stops on cancel")
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn burst_of_whole_dialogues_keeps_each_conversation_in_order() {
    const CONVERSATIONS: usize = 50;

    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    let planner =
        Planner::from_config(&config, Arc::new(ManualClock::new(local(1, 8, 0)))).unwrap();
    let store = Arc::clone(planner.store());

    let (mut input, adapter_in) = tokio::io::duplex(1 << 16);
    let (adapter_out, output) = tokio::io::duplex(1 << 20);
    let adapter = Arc::new(JsonLinesAdapter::new(adapter_in, adapter_out));
    let runtime = tokio::spawn(run_runtime(planner, adapter, CancellationToken::new()));

    let mut burst = String::new();
    for n in 0..CONVERSATIONS {
        let (description, assignee) = (format!("desc{n}"), format!("who{n}"));
        for text in [
            "/addtask",
            description.as_str(),
            assignee.as_str(),
            "15:06:2025",
            "09:00",
        ] {
            let line = serde_json::json!({ "conversation_id": n.to_string(), "text": text });
            burst.push_str(&format!("{line}\n"));
        }
    }
    input.write_all(burst.as_bytes()).await.unwrap();
    drop(input);

    tokio::time::timeout(Duration::from_secs(30), runtime)
        .await
        .expect("runtime stops at EOF")
        .unwrap()
        .unwrap();

    let pending = store.find_pending().unwrap();
    assert_eq!(pending.len(), CONVERSATIONS);
    for task in &pending {
        let n = task.conversation_id.as_str();
        assert_eq!(task.description, format!("desc{n}"));
        assert_eq!(task.assignee, format!("who{n}"));
    }

    let mut output = BufReader::new(output).lines();
    let mut created = 0;
    while let Some(line) = output.next_line().await.unwrap() {
        let reply: OutboundMessage = serde_json::from_str(&line).unwrap();
        assert_ne!(reply.text, messages::NO_SESSION, "out-of-order input: {line}");
        if reply.text.starts_with("Task added!") {
            created += 1;
        }
    }
    assert_eq!(created, CONVERSATIONS);
}
