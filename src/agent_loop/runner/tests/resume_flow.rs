use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::support::*;
use crate::agent_loop::events::{AgentEvent, SessionEvent};
use crate::agent_loop::resume::ResumeKind;
use crate::agent_loop::types::ExitReason;
use crate::conversation::{InMemoryTurnLog, TurnLog};
use crate::types::Turn;

fn interrupted_log(pending: &str, reply: &str) -> InMemoryTurnLog {
    interrupted_batch(&[("c1", pending)], reply)
}

fn interrupted_batch(pending: &[(&str, &str)], reply: &str) -> InMemoryTurnLog {
    let calls = pending
        .iter()
        .map(|(id, tool)| call(id, tool, &format!(r#"{{"text":"{id}"}}"#)))
        .collect();
    InMemoryTurnLog::from_turns(vec![
        Turn::system("You are a careful assistant."),
        Turn::user("list the files"),
        Turn::assistant_with_calls(None, calls),
        Turn::user(reply),
    ])
}

fn resume_kinds(events: &Arc<Mutex<Vec<SessionEvent>>>) -> Vec<ResumeKind> {
    event_kinds(events)
        .into_iter()
        .filter_map(|event| match event {
            AgentEvent::ResumeDecided { kind, .. } => Some(kind),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn continue_replays_pending_calls_before_asking_the_model() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new(vec![finish("c2", "done")]);
    let runner = test_loop(provider.clone(), registry(vec![echo_tool(invocations.clone())]));
    let (sink, events) = capture_events();
    let mut log = interrupted_log("echo", "Continue.");

    let outcome = runner
        .run(request_with_sink("a1", sink), &mut log)
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::Finished);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(provider.calls(), 1);
    assert!(!log.turns().iter().any(|turn| turn.text() == "Continue."));
    assert_eq!(tool_turns(&log)[0], ("c1".to_string(), "c1".to_string()));

    let first_request = &provider.requests()[0];
    assert!(first_request
        .messages
        .iter()
        .any(|message| message["role"] == "tool" && message["tool_call_id"] == "c1"));
    assert_eq!(resume_kinds(&events), vec![ResumeKind::Replay]);
}

#[tokio::test]
async fn repeating_the_original_request_counts_as_continue() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new(vec![finish("c2", "done")]);
    let runner = test_loop(provider, registry(vec![echo_tool(invocations.clone())]));
    let mut log = interrupted_log("echo", "list the files");

    runner.run(request("a1"), &mut log).await.unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_resumable_calls_are_not_replayed() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new(vec![finish("c2", "done")]);
    let runner = test_loop(provider.clone(), registry(vec![delegate_tool(invocations.clone())]));
    let (sink, events) = capture_events();
    let mut log = interrupted_log("delegate", "go on");

    let outcome = runner
        .run(request_with_sink("a1", sink), &mut log)
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::Finished);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    assert_eq!(provider.calls(), 1);

    let turns = log.turns();
    assert!(matches!(
        &turns[3],
        Turn::Tool { tool_call_id, internal: true, .. } if tool_call_id == "c1"
    ));
    assert!(turns[3].text().contains("cannot be replayed"));
    assert!(turns[4].is_user());
    assert!(turns[4].text().starts_with("Continue the interrupted task."));
    assert_eq!(resume_kinds(&events), vec![ResumeKind::RefusedNonResumable]);
}

#[tokio::test]
async fn a_new_request_leaves_pending_calls_unexecuted() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new(vec![finish("c2", "poem written")]);
    let runner = test_loop(provider, registry(vec![echo_tool(invocations.clone())]));
    let mut log = interrupted_log("echo", "actually, write me a poem");

    let outcome = runner.run(request("a1"), &mut log).await.unwrap();

    assert_eq!(outcome.response, "poem written");
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    let turns = log.turns();
    assert!(matches!(&turns[3], Turn::Tool { internal: true, .. }));
    assert!(turns[3].text().contains("new message"));
    assert_eq!(turns[4].text(), "actually, write me a poem");
}

#[tokio::test]
async fn continue_replays_every_pending_call_in_order() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new(vec![finish("c3", "done")]);
    let runner = test_loop(provider.clone(), registry(vec![echo_tool(invocations.clone())]));
    let mut log = interrupted_batch(&[("c1", "echo"), ("c2", "echo")], "continue");

    let outcome = runner.run(request("a1"), &mut log).await.unwrap();

    assert_eq!(outcome.exit, ExitReason::Finished);
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert_eq!(provider.calls(), 1);
    assert_eq!(
        tool_turns(&log)[..2],
        [
            ("c1".to_string(), "c1".to_string()),
            ("c2".to_string(), "c2".to_string()),
        ]
    );
    let turns = log.turns();
    assert!(turns[2].has_tool_calls());
    assert!(!turns[3].is_internal() && !turns[4].is_internal());
}

#[tokio::test]
async fn one_non_resumable_call_refuses_the_whole_batch() {
    let echoes = Arc::new(AtomicUsize::new(0));
    let delegations = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider::new(vec![finish("c3", "done")]);
    let tools = registry(vec![
        echo_tool(echoes.clone()),
        delegate_tool(delegations.clone()),
    ]);
    let runner = test_loop(provider.clone(), tools);
    let mut log = interrupted_batch(&[("c1", "echo"), ("c2", "delegate")], "continue");

    let outcome = runner.run(request("a1"), &mut log).await.unwrap();

    assert_eq!(outcome.exit, ExitReason::Finished);
    assert_eq!(echoes.load(Ordering::SeqCst), 0);
    assert_eq!(delegations.load(Ordering::SeqCst), 0);
    assert_eq!(provider.calls(), 1);

    let turns = log.turns();
    let synthetic: Vec<&str> = turns[3..5]
        .iter()
        .filter_map(|turn| match turn {
            Turn::Tool {
                tool_call_id,
                internal: true,
                ..
            } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(synthetic, vec!["c1", "c2"]);
    assert!(turns[5].is_user());
    assert!(turns[5].text().starts_with("Continue the interrupted task."));
    assert!(provider.requests()[0]
        .messages
        .iter()
        .any(|message| message["role"] == "tool" && message["tool_call_id"] == "c2"));
}
