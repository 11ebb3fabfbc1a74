//! Test utilities and fixtures for Subgate integration tests

#![allow(dead_code)]

use std::sync::Mutex;

use rusqlite::Connection;

pub use subgate::db::{init_db, queries};
pub use subgate::models::*;
pub use subgate::notify::Notifier;
pub use subgate::reconcile::PaymentNotification;
pub use subgate::signature;

/// Shared server secret used across tests
pub const TEST_SERVER_KEY: &str = "test-server-key";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("Failed to enable foreign keys");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test user
pub fn create_test_user(conn: &Connection, email: &str) -> User {
    queries::create_user(conn, email, Some("+620000000001")).expect("Failed to create test user")
}

/// Create a test package with a given duration
pub fn create_test_package(conn: &Connection, code: &str, price: i64, duration_days: i64) -> Package {
    let package = Package {
        code: code.to_string(),
        name: format!("Test {}", code),
        price,
        duration_days,
    };
    queries::upsert_package(conn, &package).expect("Failed to create test package");
    package
}

/// Create a pending test order for a user and package
pub fn create_test_order(conn: &mut Connection, user_id: i64, package: &Package) -> Order {
    let (order, _) = queries::create_order(
        conn,
        &CreateOrder {
            user_id,
            package_code: package.code.clone(),
            gross_amount: package.price,
        },
    )
    .expect("Failed to create test order");
    order
}

/// Build a correctly signed notification for an order.
pub fn signed_notification(
    order: &Order,
    transaction_status: &str,
    fraud_status: Option<&str>,
) -> PaymentNotification {
    let status_code = "200".to_string();
    let gross_amount = format!("{}.00", order.gross_amount);
    let signature_key = signature::compute(
        &order.order_id,
        &status_code,
        &gross_amount,
        TEST_SERVER_KEY,
    );
    PaymentNotification {
        order_id: order.order_id.clone(),
        transaction_status: transaction_status.to_string(),
        fraud_status: fraud_status.map(String::from),
        status_code,
        gross_amount,
        signature_key,
        transaction_id: Some(format!("txn-{}", order.order_id)),
        payment_type: Some("bank_transfer".to_string()),
    }
}

/// Notifier that records every event for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(i64, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: i64, event: &str, _payload: &serde_json::Value) {
        self.events
            .lock()
            .unwrap()
            .push((user_id, event.to_string()));
    }
}

/// Count subscription rows for a user, by status.
pub fn count_subscriptions(conn: &Connection, user_id: i64, status: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND status = ?2",
        rusqlite::params![user_id, status],
        |row| row.get(0),
    )
    .expect("Failed to count subscriptions")
}

/// Count recorded webhook deliveries for an order.
pub fn count_webhook_events(conn: &Connection, order_id: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM webhook_events WHERE order_id = ?1",
        rusqlite::params![order_id],
        |row| row.get(0),
    )
    .expect("Failed to count webhook events")
}
