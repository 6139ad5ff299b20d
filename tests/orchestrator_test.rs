//! Turn lifecycle tests against a scripted backend.

mod common;

use std::time::Duration;

use bytes::Bytes;
use common::{messages_url, sse, FlakyLedgerStore, Harness};
use stepflow::adapters::mock::MockResponse;
use stepflow::flow::StepChange;
use stepflow::traits::{HttpError, Response};
use stepflow::{Flow, MessageLedger, Role, SessionStatus, Step, TurnError, TurnOutcome, TurnUpdate};

const CRISIS: &str = r#"{"blocked":true,"reason":"CRISIS","resources":{"US":"988","ES":"024"}}"#;

#[tokio::test]
async fn test_tokens_then_done_commit_and_advance() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script(
        "s1",
        &[r#"{"content":"Hi"}"#, r#"{"content":" there"}"#, r#"{"next_step":"clarify"}"#],
    );

    let outcome = h
        .orchestrator
        .submit("s1", "I feel stuck", Step::Receive)
        .await
        .unwrap();
    let turn = outcome.completed().expect("turn should complete");

    assert_eq!(turn.assistant_message.content, "Hi there");
    assert_eq!(turn.assistant_message.step, Step::Receive);
    assert_eq!(
        turn.transition,
        Some(StepChange {
            from: Step::Receive,
            to: Step::Clarify
        })
    );
    assert_eq!(turn.current_step, Step::Clarify);
    assert!(!turn.session_complete);
    assert!(!turn.ledger_degraded);

    let history = h.history("s1").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "I feel stuck");
    assert_eq!(history[1].content, "Hi there");
    assert_eq!(
        h.orchestrator.current_step("s1").await.unwrap(),
        Step::Clarify
    );
}

#[tokio::test]
async fn test_crisis_after_tokens_commits_nothing() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script(
        "s1",
        &[r#"{"content":"I hear"}"#, r#"{"content":" you"}"#, CRISIS, r#"{"next_step":"clarify"}"#],
    );

    let outcome = h.orchestrator.submit("s1", "help", Step::Receive).await.unwrap();
    let TurnOutcome::Crisis(payload) = outcome else {
        panic!("expected crisis, got {:?}", outcome);
    };
    assert_eq!(payload.resource("US"), Some("988"));
    assert_eq!(payload.resource("ES"), Some("024"));

    let history = h.history("s1").await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_user());

    let state = h.orchestrator.state("s1").await.unwrap();
    assert_eq!(state.session.current_step, Step::Receive);
    assert!(!state.in_flight);
}

#[tokio::test]
async fn test_stream_closing_without_done_is_incomplete() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script("s1", &[r#"{"content":"Hi"}"#]);

    let err = h
        .orchestrator
        .submit("s1", "hello", Step::Receive)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::IncompleteStream { received_chars: 2 }));
    assert!(err.is_retryable());

    let history = h.history("s1").await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_user());
    assert!(!h.orchestrator.state("s1").await.unwrap().in_flight);
}

#[tokio::test]
async fn test_done_sentinel_before_done_event_is_incomplete() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script("s1", &[r#"{"content":"Hi"}"#, "[DONE]", r#"{"next_step":"clarify"}"#]);

    let err = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap_err();
    assert!(matches!(err, TurnError::IncompleteStream { .. }));
}

#[tokio::test]
async fn test_second_submit_while_in_flight_is_ignored() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script_slow(
        "s1",
        &[r#"{"content":"Hi"}"#, r#"{"next_step":"clarify"}"#],
        Duration::from_millis(20),
    );

    let (first, second) = tokio::join!(
        h.orchestrator.submit("s1", "one", Step::Receive),
        h.orchestrator.submit("s1", "two", Step::Receive),
    );

    assert!(first.unwrap().completed().is_some());
    assert_eq!(second.unwrap(), TurnOutcome::Ignored);
    assert_eq!(h.mock.count("POST"), 1);

    let history = h.history("s1").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "one");
}

#[tokio::test]
async fn test_sessions_stream_independently() {
    let h = Harness::new();
    h.open_solve("a").await;
    h.open_solve("b").await;
    h.script_slow("a", &[r#"{"content":"A"}"#, r#"{"next_step":"clarify"}"#], Duration::from_millis(10));
    h.script_slow("b", &[r#"{"content":"B"}"#, r#"{"next_step":"clarify"}"#], Duration::from_millis(10));

    let (a, b) = tokio::join!(
        h.orchestrator.submit("a", "first", Step::Receive),
        h.orchestrator.submit("b", "second", Step::Receive),
    );

    assert_eq!(a.unwrap().completed().unwrap().assistant_message.content, "A");
    assert_eq!(b.unwrap().completed().unwrap().assistant_message.content, "B");
    assert_eq!(h.mock.count("POST"), 2);
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script(
        "s1",
        &[r#"{"content":"Hi"}"#, "{not json", r#"{"content":"!"}"#, r#"{"next_step":"clarify"}"#],
    );

    let outcome = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();
    assert_eq!(outcome.completed().unwrap().assistant_message.content, "Hi!");
}

#[tokio::test]
async fn test_chunks_split_mid_frame() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::stream([
            "data: {\"cont",
            "ent\":\"caf\u{e9}\"}\n\ndata: {\"next_",
            "step\":\"clarify\"}\n\n",
        ]),
    );

    let outcome = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert_eq!(turn.assistant_message.content, "caf\u{e9}");
    assert_eq!(turn.current_step, Step::Clarify);
}

#[tokio::test]
async fn test_error_frame_fails_turn() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script("s1", &[r#"{"content":"Hi"}"#, r#"{"error":"STREAM_ERROR","message":"overloaded"}"#]);

    let err = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap_err();
    match err {
        TurnError::Backend { code, message } => {
            assert_eq!(code, "STREAM_ERROR");
            assert_eq!(message.as_deref(), Some("overloaded"));
        }
        other => panic!("expected backend error, got {:?}", other),
    }
    assert_eq!(h.history("s1").await.len(), 1);
}

#[tokio::test]
async fn test_broken_stream_is_transport_error() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::BrokenStream {
            chunks: vec![Bytes::from("data: {\"content\":\"Hi\"}\n\n")],
            error: HttpError::Io("connection reset".to_string()),
        },
    );

    let err = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap_err();
    assert!(matches!(err, TurnError::Transport(HttpError::Io(_))));
    assert!(!h.orchestrator.state("s1").await.unwrap().in_flight);
}

#[tokio::test]
async fn test_json_body_final_reply() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::Json(
            r#"{"content":"Hello","next_step":"clarify","emotion_detected":"anxious","confidence":0.9}"#
                .to_string(),
        ),
    );

    let outcome = h.orchestrator.submit("s1", "hi", Step::Receive).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert_eq!(turn.assistant_message.content, "Hello");
    assert_eq!(turn.assistant_message.emotion.as_deref(), Some("anxious"));
    assert_eq!(turn.confidence, Some(0.9));
    assert_eq!(turn.current_step, Step::Clarify);
}

#[tokio::test]
async fn test_json_body_crisis() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::Json(CRISIS.to_string()),
    );

    let outcome = h.orchestrator.submit("s1", "hi", Step::Receive).await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Crisis(_)));
    assert_eq!(h.history("s1").await.len(), 1);
}

#[tokio::test]
async fn test_rejected_request_with_crisis_body() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::Success(Response::new(403, Bytes::from(CRISIS))),
    );

    let outcome = h.orchestrator.submit("s1", "hi", Step::Receive).await.unwrap();
    let TurnOutcome::Crisis(payload) = outcome else {
        panic!("expected crisis");
    };
    assert_eq!(payload.resource("US"), Some("988"));
}

#[tokio::test]
async fn test_server_error_keeps_user_message() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::Success(Response::new(502, Bytes::from("bad gateway"))),
    );

    let err = h.orchestrator.submit("s1", "hi", Step::Receive).await.unwrap_err();
    assert!(matches!(
        err,
        TurnError::Transport(HttpError::ServerError { status: 502, .. })
    ));
    assert!(err.is_retryable());

    let history = h.history("s1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hi");
}

#[tokio::test]
async fn test_cancel_discards_reply() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.push_response(
        &messages_url(Flow::Solve, "s1"),
        MockResponse::delayed(
            sse(&[r#"{"content":"Hi"}"#, r#"{"content":" there"}"#, r#"{"next_step":"clarify"}"#]),
            Duration::from_millis(40),
        ),
    );
    h.script("s1", &[r#"{"content":"Again"}"#, r#"{"next_step":"clarify"}"#]);

    let (outcome, cancelled) = tokio::join!(
        h.orchestrator.submit("s1", "hello", Step::Receive),
        async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            h.orchestrator.cancel("s1").await.unwrap()
        }
    );

    assert!(cancelled);
    assert_eq!(outcome.unwrap(), TurnOutcome::Cancelled);
    assert_eq!(h.history("s1").await.len(), 1);

    let state = h.orchestrator.state("s1").await.unwrap();
    assert!(!state.in_flight);
    assert_eq!(state.session.current_step, Step::Receive);

    let retry = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();
    assert_eq!(retry.completed().unwrap().assistant_message.content, "Again");
}

#[tokio::test]
async fn test_cancel_without_turn() {
    let h = Harness::new();
    h.open_solve("s1").await;
    assert!(!h.orchestrator.cancel("s1").await.unwrap());
}

#[tokio::test]
async fn test_step_follows_last_named_step() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script_once("s1", &[r#"{"content":"a"}"#, r#"{"next_step":"clarify"}"#]);
    h.script_once("s1", &[r#"{"content":"b"}"#, r#"{"emotion_detected":"calm"}"#]);
    h.script_once("s1", &[r#"{"content":"c"}"#, r#"{"next_step":"reframe"}"#]);
    h.script_once("s1", &[r#"{"content":"d"}"#, r#"{"next_step":null}"#]);

    let mut steps = Vec::new();
    for text in ["1", "2", "3", "4"] {
        let current = h.orchestrator.current_step("s1").await.unwrap();
        h.orchestrator.submit("s1", text, current).await.unwrap();
        steps.push(h.orchestrator.current_step("s1").await.unwrap());
    }

    assert_eq!(
        steps,
        vec![Step::Clarify, Step::Clarify, Step::Reframe, Step::Reframe]
    );

    let history = h.history("s1").await;
    let assistant_steps: Vec<_> = history
        .iter()
        .filter(|m| !m.is_user())
        .map(|m| m.step)
        .collect();
    assert_eq!(
        assistant_steps,
        vec![Step::Receive, Step::Clarify, Step::Clarify, Step::Reframe]
    );
}

#[tokio::test]
async fn test_options_extracted_on_entering_options() {
    let h = Harness::new();
    h.open("s1", Flow::Solve, Step::Reframe).await;
    h.script(
        "s1",
        &[
            r#"{"content":"A) Rest\nB) Talk to a friend\nC) Go for a walk"}"#,
            r#"{"next_step":"options"}"#,
        ],
    );

    let outcome = h.orchestrator.submit("s1", "ok", Step::Reframe).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert_eq!(turn.current_step, Step::Options);
    assert_eq!(turn.options, vec!["Rest", "Talk to a friend", "Go for a walk"]);
}

#[tokio::test]
async fn test_no_options_without_transition() {
    let h = Harness::new();
    h.open("s1", Flow::Solve, Step::Options).await;
    h.script("s1", &[r#"{"content":"A) Rest\nB) Walk"}"#, r#"{"confidence":0.5}"#]);

    let outcome = h.orchestrator.submit("s1", "more please", Step::Options).await.unwrap();
    assert!(outcome.completed().unwrap().options.is_empty());
}

#[tokio::test]
async fn test_select_option_moves_to_commit() {
    let h = Harness::new();
    h.open("s1", Flow::Solve, Step::Options).await;

    let message = h.orchestrator.select_option("s1", " Rest ").await.unwrap();
    assert_eq!(message.content, "Rest");
    assert_eq!(message.step, Step::Options);
    assert_eq!(h.orchestrator.current_step("s1").await.unwrap(), Step::Commit);
    assert_eq!(h.history("s1").await.len(), 1);
}

#[tokio::test]
async fn test_done_at_terminal_step_completes_session() {
    let h = Harness::new();
    h.open("s1", Flow::Solve, Step::Commit).await;
    h.script("s1", &[r#"{"content":"Well done."}"#, r#"{"confidence":1.0}"#]);

    let outcome = h.orchestrator.submit("s1", "I will rest", Step::Commit).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert!(turn.transition.is_none());
    assert!(turn.session_complete);

    let state = h.orchestrator.state("s1").await.unwrap();
    assert_eq!(state.session.status, SessionStatus::Completed);

    let again = h.orchestrator.submit("s1", "hello?", Step::Commit).await.unwrap();
    assert_eq!(again, TurnOutcome::Ignored);
    assert_eq!(h.mock.count("POST"), 1);
}

#[tokio::test]
async fn test_learn_flow_server_ids_and_completion() {
    let h = Harness::new();
    h.open("l1", Flow::Learn, Step::Practice).await;
    h.mock.set_response(
        &messages_url(Flow::Learn, "l1"),
        MockResponse::stream(sse(&[
            r#"{"content":"Great plan"}"#,
            r#"{"next_step":"plan","message_id":42,"step_completed":"practice","session_completed":true}"#,
        ])),
    );

    let outcome = h.orchestrator.submit("l1", "my plan", Step::Practice).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert_eq!(turn.assistant_message.id, "42");
    assert_eq!(turn.assistant_message.step, Step::Practice);
    assert_eq!(turn.current_step, Step::Plan);
    assert!(turn.session_complete);
}

#[tokio::test]
async fn test_caller_step_realigns_machine() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script("s1", &[r#"{"content":"ok"}"#, r#"{"emotion_detected":"calm"}"#]);

    let outcome = h.orchestrator.submit("s1", "hi", Step::Clarify).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert_eq!(turn.user_message.step, Step::Clarify);
    assert_eq!(turn.assistant_message.step, Step::Clarify);

    let requests = h.mock.get_requests();
    assert_eq!(
        requests[0].body.as_deref(),
        Some(r#"{"content":"hi","step":"clarify"}"#)
    );
}

#[tokio::test]
async fn test_blank_text_and_unknown_session() {
    let h = Harness::new();
    h.open_solve("s1").await;

    let outcome = h.orchestrator.submit("s1", "   \n", Step::Receive).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Ignored);
    assert!(h.mock.get_requests().is_empty());

    let err = h.orchestrator.submit("nope", "hi", Step::Receive).await.unwrap_err();
    assert!(matches!(err, TurnError::UnknownSession(_)));
}

#[tokio::test]
async fn test_updates_are_published_in_order() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script(
        "s1",
        &[r#"{"content":"Hi"}"#, r#"{"content":" there"}"#, r#"{"next_step":"clarify"}"#],
    );
    let mut updates = h.orchestrator.subscribe();

    h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();

    let mut received = Vec::new();
    while let Ok(update) = updates.try_recv() {
        received.push(update);
    }

    assert_eq!(received.len(), 4);
    assert!(matches!(received[0], TurnUpdate::Started { .. }));
    assert!(matches!(&received[1], TurnUpdate::Content { content, .. } if content == "Hi"));
    assert!(matches!(&received[2], TurnUpdate::Content { content, .. } if content == "Hi there"));
    assert!(matches!(
        &received[3],
        TurnUpdate::Committed { step: Step::Clarify, .. }
    ));
    assert!(received.iter().all(|u| u.session_id() == "s1"));
}

#[tokio::test]
async fn test_ledger_failure_degrades_but_completes() {
    let store = FlakyLedgerStore::failing();
    let h = Harness::with_ledger(MessageLedger::new(store.clone()));
    h.open_solve("s1").await;
    h.script("s1", &[r#"{"content":"Hi"}"#, r#"{"next_step":"clarify"}"#]);

    let outcome = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();
    let turn = outcome.completed().unwrap();
    assert_eq!(turn.assistant_message.content, "Hi");
    assert!(turn.ledger_degraded);
    assert_eq!(h.orchestrator.state("s1").await.unwrap().unsynced, 2);
    assert!(h.history("s1").await.is_empty());

    store.set_failing(false);
    let messages = h.orchestrator.resume("s1", Flow::Solve).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hello");
    let state = h.orchestrator.state("s1").await.unwrap();
    assert_eq!(state.unsynced, 0);
    assert_eq!(state.session.current_step, Step::Clarify);
}

#[tokio::test]
async fn test_retried_user_message_keeps_history_order() {
    let store = FlakyLedgerStore::failing();
    let h = Harness::with_ledger(MessageLedger::new(store.clone()));
    h.open_solve("s1").await;
    h.script_slow(
        "s1",
        &[r#"{"content":"Tell me more"}"#, r#"{"next_step":"clarify"}"#],
        Duration::from_millis(20),
    );

    let (outcome, ()) = tokio::join!(
        h.orchestrator.submit("s1", "I feel stuck", Step::Receive),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.set_failing(false);
        }
    );
    assert!(outcome.unwrap().completed().unwrap().ledger_degraded);
    assert_eq!(h.orchestrator.state("s1").await.unwrap().unsynced, 1);

    let messages = h.orchestrator.resume("s1", Flow::Solve).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "I feel stuck");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(h.orchestrator.state("s1").await.unwrap().unsynced, 0);
}

#[tokio::test]
async fn test_failed_snapshot_is_rewritten_on_resume() {
    let store = std::sync::Arc::new(FlakyLedgerStore::default());
    store.set_snapshots_failing(true);
    let h = Harness::with_ledger(MessageLedger::new(store.clone()));
    h.open_solve("s1").await;
    h.script("s1", &[r#"{"content":"Hi"}"#, r#"{"next_step":"clarify"}"#]);

    let outcome = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();
    assert!(outcome.completed().unwrap().ledger_degraded);
    assert_eq!(h.orchestrator.state("s1").await.unwrap().unsynced, 0);
    assert!(h.ledger.load_session("s1").await.unwrap().is_none());

    store.set_snapshots_failing(false);
    h.orchestrator.resume("s1", Flow::Solve).await.unwrap();

    let snapshot = h.ledger.load_session("s1").await.unwrap().expect("snapshot");
    assert_eq!(snapshot.current_step, Step::Clarify);
    assert_eq!(h.orchestrator.current_step("s1").await.unwrap(), Step::Clarify);
}

#[tokio::test]
async fn test_mistyped_done_field_still_commits() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.script(
        "s1",
        &[r#"{"content":"Hi"}"#, r#"{"next_step":"clarify","confidence":"high"}"#],
    );

    let outcome = h.orchestrator.submit("s1", "hello", Step::Receive).await.unwrap();
    let turn = outcome.completed().expect("turn should complete");
    assert_eq!(turn.assistant_message.content, "Hi");
    assert_eq!(turn.confidence, None);
    assert_eq!(turn.current_step, Step::Clarify);
}

#[tokio::test]
async fn test_complete_sends_first_step_action() {
    let h = Harness::new();
    h.open("s1", Flow::Solve, Step::Commit).await;
    h.mock.set_response(
        "http://api/sessions/s1",
        MockResponse::Success(Response::new(200, Bytes::from("{}"))),
    );

    h.orchestrator
        .complete("s1", "Call my sister tonight", None)
        .await
        .unwrap();

    let patch = h
        .mock
        .get_requests()
        .into_iter()
        .find(|r| r.method == "PATCH")
        .expect("patch request");
    assert_eq!(
        patch.body.as_deref(),
        Some(r#"{"status":"completed","first_step_action":"Call my sister tonight"}"#)
    );
    let state = h.orchestrator.state("s1").await.unwrap();
    assert_eq!(state.session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_complete_failure_is_api_error() {
    let h = Harness::new();
    h.open("s1", Flow::Solve, Step::Commit).await;
    h.mock.set_response(
        "http://api/sessions/s1",
        MockResponse::Success(Response::new(500, Bytes::from("boom"))),
    );

    let err = h.orchestrator.complete("s1", "rest", None).await.unwrap_err();
    assert!(matches!(err, TurnError::Api(_)));
    let state = h.orchestrator.state("s1").await.unwrap();
    assert_eq!(state.session.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_abandon_stops_session() {
    let h = Harness::new();
    h.open_solve("s1").await;
    h.mock.set_response(
        "http://api/sessions/s1",
        MockResponse::Success(Response::new(200, Bytes::from("{}"))),
    );

    h.orchestrator.abandon("s1").await.unwrap();

    let state = h.orchestrator.state("s1").await.unwrap();
    assert_eq!(state.session.status, SessionStatus::Abandoned);
    assert_eq!(h.mock.count("PATCH"), 1);

    let outcome = h.orchestrator.submit("s1", "hi", Step::Receive).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Ignored);
}

#[tokio::test]
async fn test_start_creates_and_opens_session() {
    let h = Harness::new();
    h.mock.set_response(
        "http://api/learn",
        MockResponse::Json(r#"{"session_id":7,"status":"active","current_step":"start"}"#.to_string()),
    );

    let session = h.orchestrator.start(Flow::Learn).await.unwrap();
    assert_eq!(session.id, "7");
    assert_eq!(session.current_step, Step::Start);

    let state = h.orchestrator.state("7").await.unwrap();
    assert_eq!(state.progress_index, Some(0));
    assert_eq!(state.step_count, 4);
    assert_eq!(
        h.ledger.load_session("7").await.unwrap().map(|s| s.flow),
        Some(Flow::Learn)
    );
}
