//! Order ledger invariants: creation, stale-pending expiry, cancellation.

mod common;

use common::*;
use subgate::error::AppError;

#[test]
fn create_order_inserts_pending_order_and_payment_shell() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);

    let order = create_test_order(&mut conn, user.id, &package);

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.gross_amount, 100_000);
    assert!(order.expiry_date.is_none());

    let payment = queries::get_payment(&conn, &order.order_id)
        .expect("query failed")
        .expect("payment shell missing");
    assert_eq!(payment.transaction_status, "pending");
    assert!(payment.transaction_id.is_none());
}

#[test]
fn create_order_expires_stale_pending_orders() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);

    let first = create_test_order(&mut conn, user.id, &package);

    let (second, expired) = queries::create_order(
        &mut conn,
        &CreateOrder {
            user_id: user.id,
            package_code: package.code.clone(),
            gross_amount: package.price,
        },
    )
    .expect("create failed");

    assert_eq!(expired, 1, "stale pending order should be expired");
    let first = queries::get_order(&conn, &first.order_id)
        .expect("query failed")
        .expect("order missing");
    assert_eq!(first.status, OrderStatus::Expired);
    assert_eq!(second.status, OrderStatus::Pending);
}

#[test]
fn create_order_does_not_touch_paid_orders() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);

    let paid = create_test_order(&mut conn, user.id, &package);
    conn.execute(
        "UPDATE orders SET status = 'paid' WHERE order_id = ?1",
        rusqlite::params![paid.order_id],
    )
    .unwrap();

    let (_, expired) = queries::create_order(
        &mut conn,
        &CreateOrder {
            user_id: user.id,
            package_code: package.code.clone(),
            gross_amount: package.price,
        },
    )
    .expect("create failed");

    assert_eq!(expired, 0, "paid orders are history, not stale retries");
    let paid = queries::get_order(&conn, &paid.order_id)
        .expect("query failed")
        .expect("order missing");
    assert_eq!(paid.status, OrderStatus::Paid);
}

#[test]
fn cancel_sets_failed_and_marks_payment() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    let cancelled =
        queries::cancel_order(&mut conn, &order.order_id, user.id).expect("cancel failed");
    assert_eq!(cancelled.status, OrderStatus::Failed);

    let payment = queries::get_payment(&conn, &order.order_id)
        .expect("query failed")
        .expect("payment missing");
    assert_eq!(payment.transaction_status, "cancel");
}

#[test]
fn cancel_rejected_unless_pending() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    conn.execute(
        "UPDATE orders SET status = 'paid' WHERE order_id = ?1",
        rusqlite::params![order.order_id],
    )
    .unwrap();

    let err = queries::cancel_order(&mut conn, &order.order_id, user.id).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let order = queries::get_order(&conn, &order.order_id)
        .expect("query failed")
        .expect("order missing");
    assert_eq!(order.status, OrderStatus::Paid, "terminal status untouched");
}

#[test]
fn cancel_rejects_wrong_user() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");
    let other = create_test_user(&conn, "b@example.com");
    let package = create_test_package(&conn, "basic", 100_000, 30);
    let order = create_test_order(&mut conn, user.id, &package);

    let err = queries::cancel_order(&mut conn, &order.order_id, other.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn cancel_unknown_order_is_not_found() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "a@example.com");

    let err = queries::cancel_order(&mut conn, "ORD-missing", user.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
