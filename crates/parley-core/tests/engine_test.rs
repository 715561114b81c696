//! Integration tests for message ingestion and debounced decisions.
//!
//! Timers run on tokio's paused clock; message timestamps come from a
//! manual clock advanced alongside it.

mod common;

use common::{at, settle, FlakyStore, Harness};
use parley_core::{
    ChatReply, Engine, EngineParts, InboundMessage, ManualClock, TriggerLevel, Verdict,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn msg(conversation_id: &str, sender: &str, text: &str) -> InboundMessage {
    InboundMessage::new(conversation_id, sender, text)
}

/// Advance both the paused tokio clock and the manual wall clock.
async fn elapse(h: &Harness, secs: f64) {
    h.clock
        .advance(chrono::Duration::milliseconds((secs * 1000.0) as i64));
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_topic_gap_example() {
    let h = Harness::new();

    let a = h.engine.handle_message(msg("g", "A", "hi")).await.unwrap();
    h.clock.set(at(50));
    let b = h.engine.handle_message(msg("g", "B", "yo")).await.unwrap();

    assert_eq!(a.topic_id, b.topic_id);
    assert_eq!(b.time_since_last_group_message, 50.0);
    assert_eq!(b.time_since_last_user_message, 0.0);
    assert_eq!(b.recent_messages, vec!["A: hi", "B: yo"]);

    h.clock.set(at(700));
    let c = h.engine.handle_message(msg("g", "A", "back")).await.unwrap();
    assert_ne!(c.topic_id, a.topic_id);
    assert_eq!(c.recent_messages, vec!["A: back"]);
    assert_eq!(c.time_since_last_user_message, 0.0);

    let archived = h.store.topic(a.topic_id.unwrap()).unwrap().unwrap();
    assert_eq!(archived.end_time, Some(at(50)));
    assert_eq!(h.store.topic_messages(a.topic_id.unwrap(), 10).unwrap().len(), 2);

    let open = h.store.topic(c.topic_id.unwrap()).unwrap().unwrap();
    assert_eq!(open.start_time, at(700));
    assert!(open.end_time.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_same_sender_gap_uses_their_previous_message() {
    let h = Harness::new();

    h.engine.handle_message(msg("g", "A", "hi")).await.unwrap();
    h.clock.set(at(20));
    h.engine.handle_message(msg("g", "B", "hey")).await.unwrap();
    h.clock.set(at(45));
    let snapshot = h
        .engine
        .handle_message(msg("g", "A", "what's up").with_display_name("Alice"))
        .await
        .unwrap();

    assert_eq!(snapshot.time_since_last_group_message, 25.0);
    assert_eq!(snapshot.time_since_last_user_message, 45.0);
    assert_eq!(snapshot.latest_message, "what's up");
    assert_eq!(snapshot.recent_messages.last().unwrap(), "Alice: what's up");
}

#[tokio::test(start_paused = true)]
async fn test_single_message_fires_at_debounce_deadline() {
    let h = Harness::new();
    let start = tokio::time::Instant::now();

    h.engine.handle_message(msg("g", "A", "lunch?")).await.unwrap();
    assert_eq!(
        h.engine.scheduler().fire_at("g"),
        Some(start + Duration::from_secs(3))
    );

    elapse(&h, 2.9).await;
    settle().await;
    assert_eq!(h.oracle.judge_count(), 0);
    assert!(h.engine.scheduler().is_pending("g"));

    tokio::time::sleep_until(start + Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(h.oracle.judge_count(), 1);
    assert!(!h.engine.scheduler().is_pending("g"));
}

#[tokio::test(start_paused = true)]
async fn test_debounce_reschedule_fires_once() {
    let h = Harness::new();
    let start = tokio::time::Instant::now();

    h.engine.handle_message(msg("g", "A", "first")).await.unwrap();
    elapse(&h, 1.0).await;
    h.engine.handle_message(msg("g", "B", "second")).await.unwrap();
    assert_eq!(
        h.engine.scheduler().fire_at("g"),
        Some(start + Duration::from_secs(4))
    );
    assert!(h.engine.scheduler().is_pending("g"));
    assert_eq!(h.engine.scheduler().pending_count(), 1);

    // t = 3.5: the first timer would have fired by now
    elapse(&h, 2.5).await;
    assert_eq!(h.oracle.judge_count(), 0);

    // t = 4.5: the rearmed timer has fired
    elapse(&h, 1.0).await;
    settle().await;
    assert_eq!(h.oracle.judge_count(), 1);
    assert!(!h.engine.scheduler().is_pending("g"));

    elapse(&h, 30.0).await;
    assert_eq!(h.oracle.judge_count(), 1);

    let judged = h.oracle.judged.lock().unwrap()[0].clone();
    assert_eq!(judged.latest_message, "second");
    assert_eq!(judged.recent_messages.len(), 2);
    assert!(!judged.is_at_mentioned);
}

#[tokio::test(start_paused = true)]
async fn test_silent_verdict_is_audited_and_sends_nothing() {
    let h = Harness::new();
    let mut events = h.engine.subscribe();

    h.engine.handle_message(msg("g", "A", "lol")).await.unwrap();
    elapse(&h, 5.0).await;
    settle().await;

    assert_eq!(h.oracle.judge_count(), 1);
    assert_eq!(h.oracle.respond_count(), 0);
    assert_eq!(h.sender.total(), 0);

    let records = h.audit.recent(10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conversation_id, "g");
    assert_eq!(records[0].model, "scripted");
    assert!(!records[0].should_intervene);
    assert_eq!(records[0].context_summary, "lol");

    let kinds: Vec<&str> = events.drain().iter().map(|e| e.event_type()).collect();
    assert_eq!(kinds, vec!["topic.opened", "decision.made"]);
}

#[tokio::test(start_paused = true)]
async fn test_intervention_applies_summary_and_sends_each_line() {
    let h = Harness::new();
    h.oracle.set_verdict(
        Verdict::intervene(TriggerLevel::High, "direct question").with_significant_info(),
    );
    h.oracle.set_reply(
        ChatReply::new(vec!["Friday works".to_string(), "7pm?".to_string()])
            .with_summary("planning dinner"),
    );
    let mut events = h.engine.subscribe();

    let snapshot = h
        .engine
        .handle_message(msg("g", "A", "when should we meet?"))
        .await
        .unwrap();
    elapse(&h, 5.0).await;
    settle().await;

    assert_eq!(h.sender.lines("g"), vec!["Friday works", "7pm?"]);
    let topic = h.store.topic(snapshot.topic_id.unwrap()).unwrap().unwrap();
    assert_eq!(topic.summary.as_deref(), Some("planning dinner"));

    let state = h.engine.conversations().get("g").await.unwrap();
    assert_eq!(
        state.open_topic.unwrap().summary.as_deref(),
        Some("planning dinner")
    );

    let kinds: Vec<&str> = events.drain().iter().map(|e| e.event_type()).collect();
    assert!(kinds.contains(&"memory.significant_info"));
    assert!(kinds.contains(&"decision.intervened"));
    assert!(h.audit.recent(1).unwrap()[0].has_significant_info);

    // The summary is visible to the next decision.
    h.engine.handle_message(msg("g", "B", "sounds good")).await.unwrap();
    elapse(&h, 5.0).await;
    settle().await;
    let judged = h.oracle.judged.lock().unwrap().last().cloned().unwrap();
    assert_eq!(judged.topic_summary.as_deref(), Some("planning dinner"));
}

#[tokio::test(start_paused = true)]
async fn test_mention_bypasses_judge_and_cancels_debounce() {
    let h = Harness::new();

    h.engine.handle_message(msg("g", "A", "anyone here?")).await.unwrap();
    assert!(h.engine.scheduler().is_pending("g"));

    elapse(&h, 1.0).await;
    let snapshot = h
        .engine
        .handle_message(msg("g", "B", "@parley what do you think").mentioning())
        .await
        .unwrap();
    assert!(snapshot.is_at_mentioned);
    assert!(!h.engine.scheduler().is_pending("g"));

    settle().await;
    elapse(&h, 10.0).await;

    assert_eq!(h.oracle.judge_count(), 0);
    assert_eq!(h.oracle.respond_count(), 1);
    let responded = h.oracle.responded.lock().unwrap()[0].clone();
    assert!(responded.is_at_mentioned);
    assert_eq!(responded.latest_message, "@parley what do you think");
    assert_eq!(h.sender.lines("g"), vec!["hello there"]);
    assert!(h.audit.recent(10).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_oracle_failure_sends_nothing_and_writes_no_audit() {
    let h = Harness::new();
    h.oracle.fail_judge.store(true, Ordering::SeqCst);
    h.oracle
        .set_verdict(Verdict::intervene(TriggerLevel::High, "would speak"));

    h.engine.handle_message(msg("g", "A", "hello?")).await.unwrap();
    elapse(&h, 5.0).await;
    settle().await;

    assert_eq!(h.oracle.judge_count(), 1);
    assert_eq!(h.oracle.respond_count(), 0);
    assert_eq!(h.sender.total(), 0);
    assert!(h.audit.recent(10).unwrap().is_empty());

    // The engine keeps working afterwards.
    h.oracle.fail_judge.store(false, Ordering::SeqCst);
    h.engine.handle_message(msg("g", "A", "hello??")).await.unwrap();
    elapse(&h, 5.0).await;
    settle().await;
    assert_eq!(h.sender.total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_evaluation_is_not_cancelled_and_not_overlapped() {
    let h = Harness::new();
    *h.oracle.judge_delay.lock().unwrap() = Duration::from_secs(5);

    // Fires at t=3, judge runs until t=8.
    h.engine.handle_message(msg("g", "A", "one")).await.unwrap();
    elapse(&h, 4.0).await;

    // Rearmed at t=4 for t=7; waits for the in-flight evaluation.
    h.engine.handle_message(msg("g", "A", "two")).await.unwrap();
    elapse(&h, 20.0).await;
    settle().await;

    assert_eq!(h.oracle.judge_count(), 2);
    assert_eq!(h.oracle.max_concurrent_judges.load(Ordering::SeqCst), 1);

    let judged = h.oracle.judged.lock().unwrap().clone();
    assert_eq!(judged[0].latest_message, "one");
    assert_eq!(judged[1].latest_message, "two");
}

#[tokio::test(start_paused = true)]
async fn test_conversations_are_independent() {
    let h = Harness::new();

    h.engine.handle_message(msg("g1", "A", "hi")).await.unwrap();
    h.engine.handle_message(msg("g2", "B", "hey")).await.unwrap();
    elapse(&h, 1.0).await;
    h.engine.handle_message(msg("g1", "A", "still there?")).await.unwrap();
    assert_eq!(h.engine.scheduler().pending_count(), 2);

    elapse(&h, 10.0).await;
    settle().await;

    let judged = h.oracle.judged.lock().unwrap().clone();
    assert_eq!(judged.len(), 2);
    let mut conversations: Vec<String> = judged.iter().map(|s| s.conversation_id.clone()).collect();
    conversations.sort();
    assert_eq!(conversations, vec!["g1", "g2"]);
    assert_eq!(h.engine.conversations().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_append_failure_propagates_but_keeps_message() {
    let store = Arc::new(FlakyStore::new());
    let oracle = Arc::new(common::ScriptedOracle::default());
    let sender = Arc::new(common::RecordingSender::default());
    let audit = Arc::new(parley_core::SqliteAuditLog::in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(common::t0()));
    let engine = Engine::new(
        common::test_config(),
        EngineParts::new(store.clone(), oracle.clone(), sender, audit).with_clock(clock),
    );

    store.fail_appends.store(true, Ordering::SeqCst);
    let err = engine
        .handle_message(msg("g", "A", "will this stick?"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), parley_core::ErrorCode::DbOperationFailed);
    assert!(!engine.scheduler().is_pending("g"));

    let state = engine.conversations().get("g").await.unwrap();
    let topic = state.open_topic.unwrap();
    assert_eq!(topic.messages.len(), 1);
    assert!(engine.pending_writes() >= 1);

    // The queued write lands once the store recovers.
    store.fail_appends.store(false, Ordering::SeqCst);
    for _ in 0..20 {
        if engine.pending_writes() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert_eq!(engine.pending_writes(), 0);
    assert_eq!(store.inner.topic_messages(topic.id, 10).unwrap().len(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(oracle.judge_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejects_missing_identifiers() {
    let h = Harness::new();
    assert!(h.engine.handle_message(msg("", "A", "hi")).await.is_err());
    assert!(h.engine.handle_message(msg("g", " ", "hi")).await.is_err());
    assert!(h.engine.conversations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_bursts_judge_each_conversation_once() {
    let h = Harness::new();

    let sends = (0..8).flat_map(|g| {
        let engine = &h.engine;
        (0..3).map(move |n| async move {
            engine
                .handle_message(msg(&format!("g{}", g), &format!("u{}", n), "ping"))
                .await
        })
    });
    let results = futures::future::join_all(sends).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(h.engine.scheduler().pending_count(), 8);

    elapse(&h, 10.0).await;
    settle().await;

    assert_eq!(h.oracle.judge_count(), 8);
    assert_eq!(h.engine.scheduler().pending_count(), 0);
    for g in 0..8 {
        let state = h.engine.conversations().get(&format!("g{}", g)).await.unwrap();
        assert_eq!(state.open_topic.unwrap().messages.len(), 3);
    }
}
