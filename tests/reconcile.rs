//! Reconciler properties: idempotency, terminal-status protection,
//! single-active-subscription, signature rejection, end-to-end scenario.

mod common;

use common::*;
use subgate::error::AppError;
use subgate::reconcile::{apply_notification, ReconcileOutcome};

fn apply(
    conn: &mut rusqlite::Connection,
    notifier: &RecordingNotifier,
    n: &PaymentNotification,
) -> subgate::error::Result<ReconcileOutcome> {
    apply_notification(conn, TEST_SERVER_KEY, notifier, n)
}

#[test]
fn settlement_marks_order_paid_and_activates_subscription() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    let n = signed_notification(&order, "settlement", None);
    let outcome = apply(&mut conn, &notifier, &n).expect("reconcile failed");

    match outcome {
        ReconcileOutcome::Applied {
            transition,
            subscription,
        } => {
            assert_eq!(transition.previous, OrderStatus::Pending);
            assert_eq!(transition.new, OrderStatus::Paid);
            let sub = subscription.expect("subscription should be activated");
            assert_eq!(sub.user_id, user.id);
            assert_eq!(sub.order_id, order.order_id);
            assert_eq!(sub.expired_at, sub.started_at + 30 * 86400);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Payment mirror carries the gateway facts
    let payment = queries::get_payment(&conn, &order.order_id)
        .expect("query failed")
        .expect("payment missing");
    assert_eq!(payment.transaction_status, "settlement");
    assert_eq!(payment.transaction_id.as_deref(), n.transaction_id.as_deref());
    assert!(payment.raw_response.is_some());

    // Order carries the entitlement window end
    let order = queries::get_order(&conn, &order.order_id)
        .expect("query failed")
        .expect("order missing");
    assert!(order.expiry_date.is_some());

    // Notify collaborator fired exactly once
    let events = notifier.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], (user.id, "payment_success".to_string()));
}

#[test]
fn duplicate_delivery_is_a_no_op() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    let n = signed_notification(&order, "settlement", None);
    apply(&mut conn, &notifier, &n).expect("first delivery failed");
    let outcome = apply(&mut conn, &notifier, &n).expect("second delivery failed");

    assert!(matches!(
        outcome,
        ReconcileOutcome::Duplicate {
            status: OrderStatus::Paid
        }
    ));
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 1);
    assert_eq!(
        notifier.events.lock().unwrap().len(),
        1,
        "notify must not fire again on a duplicate"
    );
}

#[test]
fn terminal_status_never_moves_backward() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    apply(&mut conn, &notifier, &signed_notification(&order, "settlement", None))
        .expect("settlement failed");

    // A stale "pending" delivered after the fact must not revert the order.
    let outcome = apply(&mut conn, &notifier, &signed_notification(&order, "pending", None))
        .expect("stale pending failed");
    match outcome {
        ReconcileOutcome::Applied { transition, .. } => {
            assert_eq!(transition.previous, OrderStatus::Paid);
            assert_eq!(transition.new, OrderStatus::Paid);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Neither may a different terminal status overwrite it.
    apply(&mut conn, &notifier, &signed_notification(&order, "expire", None))
        .expect("expire failed");
    let order = queries::get_order(&conn, &order.order_id)
        .expect("query failed")
        .expect("order missing");
    assert_eq!(order.status, OrderStatus::Paid);
}

#[test]
fn capture_respects_fraud_signal() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);

    let order = create_test_order(&mut conn, user.id, &package);
    apply(&mut conn, &notifier, &signed_notification(&order, "capture", Some("accept")))
        .expect("capture accept failed");
    let order = queries::get_order(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let order2 = create_test_order(&mut conn, user.id, &package);
    apply(&mut conn, &notifier, &signed_notification(&order2, "capture", Some("challenge")))
        .expect("capture challenge failed");
    let order2 = queries::get_order(&conn, &order2.order_id).unwrap().unwrap();
    assert_eq!(order2.status, OrderStatus::Failed);
    assert_eq!(
        count_subscriptions(&conn, user.id, "active"),
        1,
        "challenged capture must not activate"
    );
}

#[test]
fn tampered_amount_is_rejected_without_mutation() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    // Signature computed over the original amount; payload carries another.
    let mut n = signed_notification(&order, "settlement", None);
    n.gross_amount = "1.00".to_string();

    let err = apply(&mut conn, &notifier, &n).unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    // Zero state mutation of any kind.
    let order = queries::get_order(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    let payment = queries::get_payment(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(payment.transaction_status, "pending");
    assert!(payment.raw_response.is_none());
    assert_eq!(count_webhook_events(&conn, &order.order_id), 0);
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 0);
    assert!(notifier.events.lock().unwrap().is_empty());
}

#[test]
fn unknown_order_is_rejected_without_creation() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();

    let ghost = Order {
        order_id: "ORD-999-0-0".to_string(),
        user_id: 999,
        package_code: "basic".to_string(),
        gross_amount: 100_000,
        status: OrderStatus::Pending,
        expiry_date: None,
        created_at: 0,
        updated_at: 0,
    };
    let n = signed_notification(&ghost, "settlement", None);

    let err = apply(&mut conn, &notifier, &n).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0, "unknown orders are never silently created");
}

#[test]
fn unknown_transaction_status_is_rejected_before_io() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    let n = signed_notification(&order, "refund", None);
    let err = apply(&mut conn, &notifier, &n).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(count_webhook_events(&conn, &order.order_id), 0);
}

#[test]
fn new_activation_supersedes_previous_subscription() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");
    let basic = create_test_package(&conn, "basic", 100_000, 30);
    let premium = create_test_package(&conn, "premium", 500_000, 180);

    let first = create_test_order(&mut conn, user.id, &basic);
    apply(&mut conn, &notifier, &signed_notification(&first, "settlement", None))
        .expect("first settlement failed");

    let second = create_test_order(&mut conn, user.id, &premium);
    apply(&mut conn, &notifier, &signed_notification(&second, "settlement", None))
        .expect("second settlement failed");

    assert_eq!(count_subscriptions(&conn, user.id, "active"), 1);
    assert_eq!(count_subscriptions(&conn, user.id, "cancelled"), 1);

    let active = queries::get_active_subscription(&conn, user.id)
        .expect("query failed")
        .expect("active subscription missing");
    assert_eq!(active.package_code, "premium");
    assert_eq!(active.order_id, second.order_id);

    // The superseded order is closed out too: only one paid order per user.
    let first = queries::get_order(&conn, &first.order_id).unwrap().unwrap();
    assert_eq!(first.status, OrderStatus::Expired);
    let second = queries::get_order(&conn, &second.order_id).unwrap().unwrap();
    assert_eq!(second.status, OrderStatus::Paid);
}

#[test]
fn activation_failure_does_not_unwind_the_payment() {
    // No foreign keys here so an order can reference a package that is
    // missing at activation time.
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    // The bundled SQLite defaults foreign_keys to ON; disable to match the
    // setup described above.
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    init_db(&conn).unwrap();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "a@example.com");

    let (order, _) = queries::create_order(
        &mut conn,
        &CreateOrder {
            user_id: user.id,
            package_code: "ghost-package".to_string(),
            gross_amount: 100_000,
        },
    )
    .expect("create failed");

    let outcome = apply(&mut conn, &notifier, &signed_notification(&order, "settlement", None))
        .expect("reconcile must not fail on activation errors");

    match outcome {
        ReconcileOutcome::Applied {
            transition,
            subscription,
        } => {
            assert_eq!(transition.new, OrderStatus::Paid);
            assert!(subscription.is_none(), "provisioning failed");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // The payment status committed and stays committed.
    let order = queries::get_order(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 0);
    assert!(
        notifier.events.lock().unwrap().is_empty(),
        "no success notification without an entitlement"
    );
}

#[test]
fn concurrent_paid_notifications_leave_one_active_subscription() {
    let db_path =
        std::env::temp_dir().join(format!("subgate-test-{}.db", uuid::Uuid::new_v4()));
    let pool = subgate::db::create_pool(db_path.to_str().unwrap()).expect("pool failed");
    {
        let conn = pool.get().unwrap();
        init_db(&conn).expect("init failed");
    }

    let (user, order_ids) = {
        let conn = pool.get().unwrap();
        let user = create_test_user(&conn, "a@example.com");
        create_test_package(&conn, "basic", 100_000, 30);

        // Seeded directly: going through order creation would expire each
        // predecessor, and this test needs several pending orders racing.
        let order_ids: Vec<String> =
            (0..6).map(|i| format!("ORD-{}-1000-{}", user.id, i)).collect();
        for order_id in &order_ids {
            conn.execute(
                "INSERT INTO orders (order_id, user_id, package_code, gross_amount, status, created_at, updated_at)
                 VALUES (?1, ?2, 'basic', 100000, 'pending', 1000, 1000)",
                rusqlite::params![order_id, user.id],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO payments (order_id, transaction_status, updated_at)
                 VALUES (?1, 'pending', 1000)",
                rusqlite::params![order_id],
            )
            .unwrap();
        }
        (user, order_ids)
    };

    let notifier = std::sync::Arc::new(RecordingNotifier::default());
    let handles: Vec<_> = order_ids
        .iter()
        .map(|order_id| {
            let pool = pool.clone();
            let notifier = notifier.clone();
            let order_id = order_id.clone();
            let user_id = user.id;
            std::thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let order = Order {
                    order_id,
                    user_id,
                    package_code: "basic".to_string(),
                    gross_amount: 100_000,
                    status: OrderStatus::Pending,
                    expiry_date: None,
                    created_at: 1000,
                    updated_at: 1000,
                };
                let n = signed_notification(&order, "settlement", None);
                apply(&mut conn, &*notifier, &n)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().expect("reconcile failed under contention");
    }

    let conn = pool.get().unwrap();
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 1);
    assert_eq!(count_subscriptions(&conn, user.id, "cancelled"), 5);
    let paid: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM orders WHERE user_id = ?1 AND status = 'paid'",
            rusqlite::params![user.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(paid, 1, "exactly one order may stay paid");
    assert_eq!(notifier.events.lock().unwrap().len(), 6);

    drop(conn);
    drop(pool);
    let _ = std::fs::remove_file(&db_path);
}

#[test]
fn end_to_end_settlement_duplicate_then_stale_expire() {
    let mut conn = setup_test_db();
    let notifier = RecordingNotifier::default();
    let user = create_test_user(&conn, "fortytwo@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);
    assert_eq!(order.status, OrderStatus::Pending);

    // Notification A: settlement with a valid signature.
    let a = signed_notification(&order, "settlement", None);
    apply(&mut conn, &notifier, &a).expect("A failed");
    let current = queries::get_order(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Paid);
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 1);

    // Notification B: identical payload, delivered again.
    let outcome = apply(&mut conn, &notifier, &a).expect("B failed");
    assert!(matches!(outcome, ReconcileOutcome::Duplicate { .. }));
    let current = queries::get_order(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Paid);
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 1);

    // Notification C: expire for the same order. No backward transition.
    let c = signed_notification(&order, "expire", None);
    apply(&mut conn, &notifier, &c).expect("C failed");
    let current = queries::get_order(&conn, &order.order_id).unwrap().unwrap();
    assert_eq!(current.status, OrderStatus::Paid);
    assert_eq!(count_subscriptions(&conn, user.id, "active"), 1);
}
