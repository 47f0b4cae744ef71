// Summary Tests - ordering, unread counters and partner display

use super::at;
use crate::storage::{ChatPartner, ConversationSummary, PresenceStatus, SummaryList};
use chrono::{DateTime, Utc};

fn partner(id: &str) -> ChatPartner {
    ChatPartner {
        id: id.to_string(),
        username: format!("{}_user", id),
        first_name: None,
        last_name: None,
        status: None,
    }
}

fn summary(id: &str, chat_id: Option<&str>, latest: Option<DateTime<Utc>>, unread: u64) -> ConversationSummary {
    ConversationSummary {
        chat_partner: partner(id),
        chat_id: chat_id.map(str::to_string),
        latest_message_timestamp: latest,
        unread_count: unread,
    }
}

fn order(list: &SummaryList) -> Vec<&str> {
    list.iter().map(|s| s.chat_partner.id.as_str()).collect()
}

#[test]
fn test_replace_sorts_newest_first_empty_last() {
    let mut list = SummaryList::new();
    list.replace(vec![
        summary("empty", None, None, 0),
        summary("old", Some("c-old"), Some(at(10)), 0),
        summary("new", Some("c-new"), Some(at(50)), 2),
        summary("mid", Some("c-mid"), Some(at(30)), 0),
    ]);

    assert_eq!(order(&list), vec!["new", "mid", "old", "empty"]);
    assert_eq!(list.len(), 4);
    assert_eq!(list.unread_total(), 2);
}

#[test]
fn test_replace_is_stable_for_equal_timestamps() {
    let mut list = SummaryList::new();
    list.replace(vec![
        summary("a", Some("c-a"), Some(at(10)), 0),
        summary("b", Some("c-b"), Some(at(10)), 0),
        summary("x", None, None, 0),
        summary("y", None, None, 0),
    ]);

    assert_eq!(order(&list), vec!["a", "b", "x", "y"]);
}

#[test]
fn test_replace_discards_previous_entries() {
    let mut list = SummaryList::new();
    list.replace(vec![summary("a", Some("c-a"), Some(at(1)), 3)]);
    list.replace(vec![summary("b", Some("c-b"), Some(at(2)), 0)]);

    assert!(list.get("a").is_none());
    assert_eq!(order(&list), vec!["b"]);
}

#[test]
fn test_mark_opened_zeroes_unread() {
    let mut list = SummaryList::new();
    list.replace(vec![summary("bob", Some("c-1"), Some(at(1)), 4)]);

    assert!(list.mark_opened("c-1"));
    assert_eq!(list.get("bob").map(|s| s.unread_count), Some(0));
    assert!(!list.mark_opened("missing"));
}

#[test]
fn test_bump_unread_by_chat_id_and_partner_fallback() {
    let mut list = SummaryList::new();
    list.replace(vec![
        summary("bob", Some("c-1"), Some(at(1)), 0),
        summary("carol", None, None, 0),
    ]);

    assert!(list.bump_unread(Some("c-1"), "bob"));
    assert!(list.bump_unread(Some("c-2"), "carol"));
    assert!(!list.bump_unread(Some("c-3"), "dave"));

    assert_eq!(list.get("bob").map(|s| s.unread_count), Some(1));
    assert_eq!(list.get("carol").map(|s| s.unread_count), Some(1));
}

#[test]
fn test_record_message_resorts_and_fills_chat_id() {
    let mut list = SummaryList::new();
    list.replace(vec![
        summary("bob", Some("c-1"), Some(at(10)), 0),
        summary("carol", None, None, 0),
    ]);

    assert!(list.record_message(Some("c-2"), "carol", at(20)));
    assert_eq!(order(&list), vec!["carol", "bob"]);
    assert_eq!(list.get("carol").and_then(|s| s.chat_id.as_deref()), Some("c-2"));
    assert_eq!(list.get_by_chat("c-2").map(|s| s.chat_partner.id.as_str()), Some("carol"));

    // Older timestamps never move the latest time backwards
    assert!(list.record_message(Some("c-2"), "carol", at(5)));
    assert_eq!(list.get("carol").and_then(|s| s.latest_message_timestamp), Some(at(20)));

    assert!(!list.record_message(None, "unknown", at(30)));
}

#[test]
fn test_set_partner_status() {
    let mut list = SummaryList::new();
    list.replace(vec![summary("bob", Some("c-1"), Some(at(1)), 0)]);

    assert!(list.set_partner_status("bob", PresenceStatus::Online));
    assert_eq!(
        list.get("bob").and_then(|s| s.chat_partner.status),
        Some(PresenceStatus::Online)
    );
    assert!(!list.set_partner_status("nobody", PresenceStatus::Online));
}

#[test]
fn test_display_name() {
    let mut p = partner("bob");
    assert_eq!(p.display_name(), "bob_user");

    p.first_name = Some("Bob".to_string());
    assert_eq!(p.display_name(), "Bob");

    p.last_name = Some("Marley".to_string());
    assert_eq!(p.display_name(), "Bob Marley");

    p.first_name = Some("  ".to_string());
    assert_eq!(p.display_name(), "Marley");
}

#[test]
fn test_summary_deserializes_gateway_shape() {
    let json = r#"[
        {
            "chatPartner": {"id": "u-2", "username": "bob", "firstName": "Bob", "status": "ONLINE"},
            "chatId": "c-1",
            "latestMessageTimestamp": "2024-03-01T10:00:00Z",
            "unreadCount": 3
        },
        {
            "chatPartner": {"id": "u-3", "username": "carol"},
            "chatId": null,
            "latestMessageTimestamp": null
        }
    ]"#;

    let summaries: Vec<ConversationSummary> = serde_json::from_str(json).expect("Failed to parse summaries");
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].chat_partner.status, Some(PresenceStatus::Online));
    assert_eq!(summaries[0].unread_count, 3);
    assert_eq!(summaries[0].chat_partner.display_name(), "Bob");
    assert!(summaries[1].chat_id.is_none());
    assert!(summaries[1].latest_message_timestamp.is_none());
    assert_eq!(summaries[1].unread_count, 0);
    assert!(summaries[1].chat_partner.status.is_none());
}
