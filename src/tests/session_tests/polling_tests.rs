// Session Polling Tests - active conversation poller, summary refresh and fetch errors

use super::helpers::*;
use crate::protocol::MARK_AS_READ_DESTINATION;
use crate::session::{Pane, SessionSignal, SessionState};
use crate::storage::MessageStatus;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_open_conversation_is_polled() {
    let mut h = harness();
    h.connect().await;

    h.session.select_conversation(BOB);
    h.settle().await;
    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert_eq!(h.session.polling(), Some(BOB));

    h.advance_period().await;
    assert_eq!(h.api.history_calls_for(BOB), 2);

    h.advance(Duration::from_secs(5)).await;
    assert_eq!(h.api.history_calls_for(BOB), 3);
}

#[tokio::test(start_paused = true)]
async fn test_selecting_again_is_noop() {
    let mut h = harness();
    h.connect().await;
    h.session.select_conversation(BOB);
    h.settle().await;

    h.session.select_conversation(BOB);
    h.settle().await;
    assert_eq!(h.api.history_calls_for(BOB), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switching_conversation_restarts_poller() {
    let mut h = harness();
    h.connect().await;
    h.session.select_conversation(BOB);
    h.settle().await;

    h.advance(Duration::from_secs(3)).await;
    h.session.select_conversation(CAROL);
    h.settle().await;
    assert_eq!(h.session.polling(), Some(CAROL));

    // Bob's poller would have fired here
    h.advance(Duration::from_millis(2_500)).await;
    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert_eq!(h.api.history_calls_for(CAROL), 1);

    h.advance(Duration::from_secs(3)).await;
    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert_eq!(h.api.history_calls_for(CAROL), 2);
}

#[tokio::test(start_paused = true)]
async fn test_close_conversation_stops_polling() {
    let mut h = harness();
    h.connect().await;
    h.session.select_conversation(BOB);
    h.settle().await;

    h.session.close_conversation();
    assert!(h.session.active_conversation().is_none());
    assert!(h.session.polling().is_none());

    h.advance(Duration::from_secs(20)).await;
    assert_eq!(h.api.history_calls_for(BOB), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_poller_while_disconnected() {
    let mut h = harness();

    h.session.select_conversation(BOB);
    h.settle().await;

    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert!(h.session.polling().is_none());
    h.advance(Duration::from_secs(20)).await;
    assert_eq!(h.api.history_calls_for(BOB), 1);
}

#[tokio::test(start_paused = true)]
async fn test_history_replaces_conversation() {
    let mut h = harness();
    h.api.state().histories.insert(
        BOB.to_string(),
        vec![
            record("m-1", "c-1", BOB, ME, "first"),
            record("m-2", "c-1", ME, BOB, "second"),
        ],
    );
    h.connect().await;

    h.session.select_conversation(BOB);
    h.settle().await;

    let contents: Vec<&str> = h.session.messages(BOB).iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second"]);
    assert_eq!(
        h.session.active_conversation().and_then(|a| a.chat_id.as_deref()),
        Some("c-1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_history_for_closed_conversation_is_discarded() {
    let mut h = harness();
    h.api.state().histories.insert(BOB.to_string(), vec![record("m-1", "c-1", BOB, ME, "late")]);
    h.connect().await;

    // Switch away before Bob's history arrives
    h.session.select_conversation(BOB);
    h.session.select_conversation(CAROL);
    h.settle().await;

    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert!(h.session.messages(BOB).is_empty());
    assert!(!h.session.is_loading_history(BOB));
}

#[tokio::test(start_paused = true)]
async fn test_history_fetches_do_not_overlap() {
    let mut h = harness();
    h.connect().await;

    h.session.select_conversation(BOB);
    assert!(h.session.is_loading_history(BOB));
    h.session.reload_active_conversation();
    h.session.reload_active_conversation();
    h.settle().await;

    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert!(!h.session.is_loading_history(BOB));

    h.session.reload_active_conversation();
    h.settle().await;
    assert_eq!(h.api.history_calls_for(BOB), 2);
}

#[tokio::test(start_paused = true)]
async fn test_summary_fetches_do_not_overlap() {
    let mut h = harness();
    h.connect().await;
    let calls = h.api.state().summary_calls;

    h.session.refresh_summaries();
    assert!(h.session.is_loading_summaries());
    h.session.refresh_summaries();
    h.settle().await;

    assert_eq!(h.api.state().summary_calls, calls + 1);
}

#[tokio::test(start_paused = true)]
async fn test_summaries_refresh_periodically() {
    let mut h = harness();
    h.connect().await;
    assert_eq!(h.api.state().summary_calls, 1);

    h.advance_period().await;
    assert_eq!(h.api.state().summary_calls, 2);

    h.advance(Duration::from_secs(5)).await;
    assert_eq!(h.api.state().summary_calls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_keeps_open_conversation_read() {
    let mut h = harness();
    h.api.state().summaries = vec![
        summary(BOB, Some("c-1"), None, 3, None),
        summary(CAROL, Some("c-2"), None, 4, None),
    ];
    h.connect().await;
    h.session.select_conversation(BOB);
    h.settle().await;

    // Server still reports the old counters
    h.advance_period().await;

    assert_eq!(h.unread(BOB), Some(0));
    assert_eq!(h.unread(CAROL), Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_poll_marks_unread_partner_messages_read() {
    let mut h = harness();
    let mut from_bob = record("m-1", "c-1", BOB, ME, "seen yet?");
    from_bob.status = MessageStatus::Delivered;
    h.api.state().histories.insert(BOB.to_string(), vec![from_bob]);
    h.connect().await;

    h.session.select_conversation(BOB);
    h.settle().await;
    let receipts = h.transport.published_to(MARK_AS_READ_DESTINATION);
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["chatId"], "c-1");

    h.advance_period().await;
    assert_eq!(h.transport.published_to(MARK_AS_READ_DESTINATION).len(), 2);

    // Once the server reports them read, polls stop sending receipts
    if let Some(history) = h.api.state().histories.get_mut(BOB) {
        history[0].status = MessageStatus::Read;
    }
    h.advance_period().await;
    h.advance_period().await;
    assert_eq!(h.transport.published_to(MARK_AS_READ_DESTINATION).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_history_failure_is_scoped_to_history_pane() {
    let mut h = harness();
    h.api.state().history_failure = Some(Failure::Unavailable);
    h.connect().await;

    h.session.select_conversation(BOB);
    h.settle().await;

    assert!(h.session.history_error().is_some());
    assert!(h.session.summary_error().is_none());
    assert_eq!(h.session.state(), SessionState::Connected);
    assert!(h.signals().iter().any(|s| matches!(s, SessionSignal::FetchFailed { pane: Pane::History, .. })));

    h.api.state().history_failure = None;
    h.advance_period().await;
    assert!(h.session.history_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_summary_auth_failure_signals() {
    let mut h = harness();
    h.api.state().summary_failure = Some(Failure::Unauthorized);
    h.connect().await;

    assert!(h.session.summary_error().is_some());
    assert!(h.session.is_connected());
    let signals = h.signals();
    assert!(signals.contains(&SessionSignal::AuthenticationFailed));
    assert!(signals.iter().any(|s| matches!(s, SessionSignal::FetchFailed { pane: Pane::Summaries, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_open_on_first_summaries() {
    let mut h = harness();
    h.api.state().summaries = vec![summary(BOB, Some("c-1"), None, 1, None)];

    h.session.open_on_first_summaries(CAROL);
    h.session.open_on_first_summaries(BOB);
    assert!(h.session.active_conversation().is_none());

    h.connect().await;

    assert_eq!(h.session.active_conversation().map(|a| a.partner_id.as_str()), Some(BOB));
    assert_eq!(h.session.polling(), Some(BOB));
    assert_eq!(h.api.history_calls_for(BOB), 1);
    assert_eq!(h.unread(BOB), Some(0));

    // Applied once only
    h.session.close_conversation();
    h.advance_period().await;
    assert!(h.session.active_conversation().is_none());
}
