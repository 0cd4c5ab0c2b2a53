//! Webhook event log and its retention purge.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use chrono::Utc;

#[test]
fn test_events_listed_in_arrival_order() {
    let conn = setup_test_db();

    let first = queries::record_webhook_event(&conn, Gateway::Paystack, "charge.success", Some("pv_c1_1")).unwrap();
    let second = queries::record_webhook_event(&conn, Gateway::Paystack, "charge.success", Some("pv_c1_1")).unwrap();
    queries::record_webhook_event(&conn, Gateway::Paystack, "transfer.success", None).unwrap();

    assert!(second > first);
    let events = queries::list_webhook_events_for_reference(&conn, "pv_c1_1").unwrap();
    assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![first, second]);
    assert_eq!(events[0].gateway, Gateway::Paystack);
}

#[test]
fn test_purge_removes_only_expired_events() {
    let conn = setup_test_db();

    queries::record_webhook_event(&conn, Gateway::Paystack, "charge.success", Some("pv_new")).unwrap();
    conn.execute(
        "INSERT INTO webhook_events (gateway, event, reference, received_at) VALUES ('paystack', 'charge.success', 'pv_old', ?1)",
        [Utc::now().timestamp() - 31 * 86400],
    )
    .unwrap();

    let deleted = queries::purge_old_webhook_events(&conn, 30).unwrap();

    assert_eq!(deleted, 1);
    assert!(queries::list_webhook_events_for_reference(&conn, "pv_old").unwrap().is_empty());
    assert_eq!(queries::list_webhook_events_for_reference(&conn, "pv_new").unwrap().len(), 1);
}
