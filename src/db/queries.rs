use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, TransactionBehavior};
use uuid::Uuid;

use crate::error::{msg, AppError, OptionExt, Result};
use crate::models::*;

use super::from_row::{
    query_one, ORDER_COLS, PACKAGE_COLS, PAYMENT_COLS, SUBSCRIPTION_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Gateway-facing order id: user id + millisecond timestamp + random suffix.
pub fn gen_order_id(user_id: i64) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{}-{}-{}", user_id, Utc::now().timestamp_millis(), suffix)
}

// ============ Users ============

pub fn create_user(conn: &Connection, email: &str, phone: Option<&str>) -> Result<User> {
    conn.execute(
        "INSERT INTO users (email, phone, created_at) VALUES (?1, ?2, ?3)",
        params![email, phone, now()],
    )?;
    let id = conn.last_insert_rowid();
    get_user_by_id(conn, id).or_not_found(msg::USER_NOT_FOUND)
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

// ============ Packages ============

pub fn upsert_package(conn: &Connection, package: &Package) -> Result<()> {
    conn.execute(
        "INSERT INTO packages (code, name, price, duration_days) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(code) DO UPDATE SET name = ?2, price = ?3, duration_days = ?4",
        params![package.code, package.name, package.price, package.duration_days],
    )?;
    Ok(())
}

pub fn get_package(conn: &Connection, code: &str) -> Result<Option<Package>> {
    query_one(
        conn,
        &format!("SELECT {} FROM packages WHERE code = ?1", PACKAGE_COLS),
        &[&code],
    )
}

// ============ Order Ledger ============

/// Create a new pending order plus its payment shell, atomically.
///
/// Any pending orders the user already has are expired first: a retried
/// purchase supersedes the stale attempt instead of accumulating next to it.
/// Returns the new order and the number of stale orders expired.
pub fn create_order(conn: &mut Connection, input: &CreateOrder) -> Result<(Order, usize)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let ts = now();

    let expired_stale = tx.execute(
        "UPDATE orders SET status = 'expired', updated_at = ?1
         WHERE user_id = ?2 AND status = 'pending'",
        params![ts, input.user_id],
    )?;

    let order_id = gen_order_id(input.user_id);
    tx.execute(
        "INSERT INTO orders (order_id, user_id, package_code, gross_amount, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
        params![order_id, input.user_id, input.package_code, input.gross_amount, ts],
    )?;
    tx.execute(
        "INSERT INTO payments (order_id, transaction_status, updated_at)
         VALUES (?1, 'pending', ?2)",
        params![order_id, ts],
    )?;

    let order = get_order(&tx, &order_id).or_not_found(msg::ORDER_NOT_FOUND)?;
    tx.commit()?;

    Ok((order, expired_stale))
}

pub fn get_order(conn: &Connection, order_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE order_id = ?1", ORDER_COLS),
        &[&order_id],
    )
}

pub fn get_payment(conn: &Connection, order_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE order_id = ?1", PAYMENT_COLS),
        &[&order_id],
    )
}

/// Joined order + payment view for the status endpoint.
pub fn get_payment_status(conn: &Connection, order_id: &str) -> Result<Option<PaymentStatusView>> {
    query_one(
        conn,
        "SELECT p.order_id, p.transaction_id, p.transaction_status, p.payment_method,
                o.gross_amount, o.status, o.package_code, p.updated_at
         FROM payments p JOIN orders o ON p.order_id = o.order_id
         WHERE p.order_id = ?1",
        &[&order_id],
    )
}

/// Apply a status transition to an order, writing the gateway facts to the
/// payment mirror in the same transaction scope.
///
/// Must be called inside an already-open immediate transaction holding the
/// write lock; `order` was loaded under that same transaction.
///
/// Transition rule:
/// - non-terminal current status: apply the target;
/// - terminal current status, target equals it: idempotent re-assertion,
///   payment facts are refreshed, order row untouched;
/// - terminal current status, different target: stale delivery, nothing is
///   written and the previous status is returned unchanged.
pub fn apply_transition(
    conn: &Connection,
    order: &Order,
    target: OrderStatus,
    facts: &PaymentFacts,
) -> Result<OrderTransition> {
    let previous = order.status;

    if previous.is_terminal() && target != previous {
        // A terminal status never moves backward or sideways. Out-of-order
        // and duplicate deliveries land here and are absorbed silently.
        return Ok(OrderTransition {
            previous,
            new: previous,
        });
    }

    let ts = now();
    if target != previous {
        conn.execute(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE order_id = ?3",
            params![target.as_str(), ts, order.order_id],
        )?;
    }

    // The payment mirror always records the latest gateway facts, including
    // on re-assertions; transaction_id is kept once known.
    conn.execute(
        "UPDATE payments SET
            transaction_id = COALESCE(?1, transaction_id),
            transaction_status = ?2,
            payment_method = COALESCE(?3, payment_method),
            raw_response = ?4,
            updated_at = ?5
         WHERE order_id = ?6",
        params![
            facts.transaction_id,
            facts.transaction_status.as_str(),
            facts.payment_method,
            facts.raw_response,
            ts,
            order.order_id
        ],
    )?;

    Ok(OrderTransition {
        previous,
        new: target,
    })
}

/// Cancel an order on the user's behalf. Permitted only while pending;
/// the order moves to `failed` and the payment mirror records the cancel.
/// Gateway-side cancellation is the caller's (best-effort) concern.
pub fn cancel_order(conn: &mut Connection, order_id: &str, user_id: i64) -> Result<Order> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = get_order(&tx, order_id).or_not_found(msg::ORDER_NOT_FOUND)?;
    if order.user_id != user_id {
        return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into()));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::BadRequest(msg::ORDER_NOT_PENDING.into()));
    }

    let ts = now();
    tx.execute(
        "UPDATE orders SET status = 'failed', updated_at = ?1 WHERE order_id = ?2",
        params![ts, order_id],
    )?;
    tx.execute(
        "UPDATE payments SET transaction_status = 'cancel', updated_at = ?1 WHERE order_id = ?2",
        params![ts, order_id],
    )?;

    let order = get_order(&tx, order_id).or_not_found(msg::ORDER_NOT_FOUND)?;
    tx.commit()?;
    Ok(order)
}

// ============ Webhook dedup ============

/// Record a delivery attempt. Returns true if this exact notification
/// (order, gateway transaction, raw status) has not been seen before.
///
/// Called inside the reconciler's transaction so a failed application rolls
/// the record back and the gateway's retry gets a clean slate.
pub fn try_record_webhook_event(
    conn: &Connection,
    order_id: &str,
    transaction_id: Option<&str>,
    transaction_status: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (order_id, transaction_id, transaction_status, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![order_id, transaction_id.unwrap_or(""), transaction_status, now()],
    )?;
    Ok(affected > 0)
}

// ============ Subscription Activator ============

/// Activate the entitlement for a freshly paid order.
///
/// Runs in its own immediate transaction: the superseding cancel and the new
/// insert are atomic, and the partial unique index on
/// `subscriptions(user_id) WHERE status='active'` backstops concurrent
/// activations at the storage layer.
///
/// Every failure here maps to `AppError::Activation`: by the time this runs
/// the payment has committed, so any error means "paid without entitlement"
/// and must reach the operational alerting path rather than roll back money.
pub fn activate_subscription(conn: &mut Connection, order: &Order) -> Result<Subscription> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| activation_err(order, &e.to_string()))?;

    let package = match get_package(&tx, &order.package_code) {
        Ok(Some(p)) => p,
        Ok(None) => {
            return Err(activation_err(
                order,
                &format!("unknown package '{}'", order.package_code),
            ))
        }
        Err(e) => return Err(activation_err(order, &e.to_string())),
    };

    let started_at = now();
    let expired_at = started_at + package.duration_days * 86400;

    // Supersede, never delete: the old entitlement row stays for history.
    tx.execute(
        "UPDATE subscriptions SET status = 'cancelled' WHERE user_id = ?1 AND status = 'active'",
        params![order.user_id],
    )
    .map_err(|e| activation_err(order, &e.to_string()))?;

    // At most one paid order per user at any instant: earlier paid orders
    // are closed out here, inside the same transaction as the new
    // entitlement, so the invariant cannot be observed violated.
    tx.execute(
        "UPDATE orders SET status = 'expired', updated_at = ?1
         WHERE user_id = ?2 AND status = 'paid' AND order_id != ?3",
        params![started_at, order.user_id, order.order_id],
    )
    .map_err(|e| activation_err(order, &e.to_string()))?;

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO subscriptions (id, user_id, package_code, status, started_at, expired_at, order_id)
         VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6)",
        params![id, order.user_id, order.package_code, started_at, expired_at, order.order_id],
    )
    .map_err(|e| activation_err(order, &e.to_string()))?;

    // Stamp the entitlement window end and re-assert this order paid. The
    // re-assertion matters under concurrent activations: another order's
    // activation may have expired this row between the transition commit
    // and here, and the last activation to commit must win everywhere.
    tx.execute(
        "UPDATE orders SET status = 'paid', expiry_date = ?1, updated_at = ?2 WHERE order_id = ?3",
        params![expired_at, started_at, order.order_id],
    )
    .map_err(|e| activation_err(order, &e.to_string()))?;

    tx.commit().map_err(|e| activation_err(order, &e.to_string()))?;

    Ok(Subscription {
        id,
        user_id: order.user_id,
        package_code: order.package_code.clone(),
        status: SubscriptionStatus::Active,
        started_at,
        expired_at,
        order_id: order.order_id.clone(),
    })
}

fn activation_err(order: &Order, detail: &str) -> AppError {
    AppError::Activation(format!(
        "order_id={} user_id={}: {}",
        order.order_id, order.user_id, detail
    ))
}

pub fn get_active_subscription(conn: &Connection, user_id: i64) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 AND status = 'active'",
            SUBSCRIPTION_COLS
        ),
        &[&user_id],
    )
}

// ============ Expiry Sweeper ============

/// Flip active subscriptions past their window to expired.
/// Re-entrant: a second run in the same window matches zero rows.
pub fn sweep_expired_subscriptions(conn: &Connection) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE subscriptions SET status = 'expired'
         WHERE status = 'active' AND expired_at < ?1",
        params![now()],
    )?;
    Ok(affected)
}

/// Expire pending orders that outlived the gateway's payment window.
/// Normally the gateway's own expire notification gets there first; this is
/// the fallback when that delivery never arrives.
pub fn sweep_overdue_pending_orders(conn: &Connection, ttl_secs: i64) -> Result<usize> {
    let ts = now();
    let affected = conn.execute(
        "UPDATE orders SET status = 'expired', updated_at = ?1
         WHERE status = 'pending' AND created_at < ?2",
        params![ts, ts - ttl_secs],
    )?;
    Ok(affected)
}
