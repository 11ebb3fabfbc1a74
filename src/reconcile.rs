//! Webhook reconciliation: converting external, possibly duplicated or
//! out-of-order payment notifications into correct, idempotent local state.
//!
//! Both delivery paths funnel through [`apply_notification`]:
//! the push path (gateway webhook) passes the inbound body through directly,
//! and the pull path ([`verify_order`]) queries the gateway and synthesizes
//! an identical notification, so the two cannot diverge in behavior.

use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::models::{
    Order, OrderStatus, OrderTransition, PaymentFacts, RawTransactionStatus, Subscription,
};
use crate::notify::Notifier;
use crate::{signature, status};

/// One inbound payment-status notification, as the gateway sends it.
/// `gross_amount` stays the gateway's decimal string: the signature is
/// computed over the exact bytes, not a re-parsed number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

/// What a reconciliation pass did.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The notification was applied (possibly as a terminal-status
    /// re-assertion that changed nothing).
    Applied {
        transition: OrderTransition,
        /// Set when this pass newly activated an entitlement
        subscription: Option<Subscription>,
    },
    /// This exact notification was already applied earlier.
    Duplicate { status: OrderStatus },
}

impl ReconcileOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied { .. } => "Notification processed successfully",
            ReconcileOutcome::Duplicate { .. } => "Notification already processed",
        }
    }
}

/// Apply one notification to the ledger.
///
/// Order of operations is load-bearing:
/// 1. validate the raw status vocabulary (no I/O yet);
/// 2. verify the signature (mismatch: reject, zero mutation);
/// 3. inside one immediate transaction: load the order (unknown: reject),
///    dedup-check the delivery, apply the status transition and payment
///    facts, commit;
/// 4. only on a (non-paid, paid) transition: activate the subscription and
///    fire the external notify collaborator.
///
/// Safe to call twice with byte-identical input; concurrent calls for the
/// same order serialize on the write lock the immediate transaction takes.
pub fn apply_notification(
    conn: &mut Connection,
    server_key: &str,
    notifier: &dyn Notifier,
    n: &PaymentNotification,
) -> Result<ReconcileOutcome> {
    let raw: RawTransactionStatus = n
        .transaction_status
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TRANSACTION_STATUS.into()))?;

    if !signature::verify(
        &n.order_id,
        &n.status_code,
        &n.gross_amount,
        server_key,
        &n.signature_key,
    ) {
        tracing::warn!(order_id = %n.order_id, "Rejected notification with invalid signature");
        return Err(AppError::InvalidSignature);
    }

    let raw_response = serde_json::to_string(n)?;
    let facts = PaymentFacts {
        transaction_id: n.transaction_id.clone(),
        transaction_status: raw,
        payment_method: n.payment_type.clone(),
        raw_response,
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = queries::get_order(&tx, &n.order_id).or_not_found(msg::ORDER_NOT_FOUND)?;

    let fresh = queries::try_record_webhook_event(
        &tx,
        &n.order_id,
        n.transaction_id.as_deref(),
        raw.as_str(),
    )?;
    if !fresh {
        tx.commit()?;
        tracing::debug!(order_id = %n.order_id, raw = %raw, "Duplicate delivery ignored");
        return Ok(ReconcileOutcome::Duplicate {
            status: order.status,
        });
    }

    let target = status::map_transaction_status(raw, n.fraud_status.as_deref());
    let transition = queries::apply_transition(&tx, &order, target, &facts)?;
    tx.commit()?;

    tracing::info!(
        order_id = %n.order_id,
        raw = %raw,
        previous = %transition.previous,
        new = %transition.new,
        "Order reconciled"
    );

    let subscription = if transition.is_newly_paid() {
        activate_and_notify(conn, notifier, &order)
    } else {
        None
    };

    Ok(ReconcileOutcome::Applied {
        transition,
        subscription,
    })
}

/// Activation runs after the payment status has committed. A failure here
/// must not unwind the payment: the money is real even if provisioning
/// needs manual follow-up, so the error goes to the alerting path and the
/// notification is still acknowledged.
fn activate_and_notify(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    order: &Order,
) -> Option<Subscription> {
    match queries::activate_subscription(conn, order) {
        Ok(subscription) => {
            tracing::info!(
                user_id = order.user_id,
                order_id = %order.order_id,
                expired_at = subscription.expired_at,
                "Subscription activated"
            );
            notifier.notify(
                order.user_id,
                "payment_success",
                &serde_json::json!({
                    "order_id": order.order_id,
                    "package_code": order.package_code,
                    "gross_amount": order.gross_amount,
                    "expired_at": subscription.expired_at,
                }),
            );
            Some(subscription)
        }
        Err(e) => {
            // AppError::Activation carries the order/user context.
            tracing::error!("{}", e);
            None
        }
    }
}

/// Pull-based verification: ask the gateway for the authoritative status of
/// an order and feed it through the exact same path as a pushed
/// notification. The signature is synthesized with the shared key, so the
/// verification step runs for this path too.
pub async fn verify_order(state: &AppState, order_id: &str) -> Result<ReconcileOutcome> {
    // Reject unknown orders before calling out to the gateway.
    {
        let conn = state.db.get()?;
        queries::get_order(&conn, order_id).or_not_found(msg::ORDER_NOT_FOUND)?;
    }

    let payload = state.gateway.check_status(order_id).await?;

    let notification = PaymentNotification {
        signature_key: signature::compute(
            &payload.order_id,
            &payload.status_code,
            &payload.gross_amount,
            &state.server_key,
        ),
        order_id: payload.order_id,
        transaction_status: payload.transaction_status,
        fraud_status: payload.fraud_status,
        status_code: payload.status_code,
        gross_amount: payload.gross_amount,
        transaction_id: payload.transaction_id,
        payment_type: payload.payment_type,
    };

    let mut conn = state.db.get()?;
    apply_notification(
        &mut conn,
        &state.server_key,
        state.notifier.as_ref(),
        &notification,
    )
}
