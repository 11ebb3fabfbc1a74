use axum::extract::{Path, State};
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{OrderStatus, Subscription};
use crate::reconcile::{self, PaymentNotification, ReconcileOutcome};

/// Webhook acknowledgement. A 200 with `success: true` covers both fresh
/// applications and idempotent no-ops; the gateway retries on anything else.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: &'static str,
    pub order_status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

impl From<ReconcileOutcome> for WebhookAck {
    fn from(outcome: ReconcileOutcome) -> Self {
        let message = outcome.message();
        match outcome {
            ReconcileOutcome::Applied {
                transition,
                subscription,
            } => WebhookAck {
                success: true,
                message,
                order_status: transition.new,
                subscription,
            },
            ReconcileOutcome::Duplicate { status } => WebhookAck {
                success: true,
                message,
                order_status: status,
                subscription: None,
            },
        }
    }
}

/// Push path: the gateway delivers a payment-status notification.
pub async fn payment_notification(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<WebhookAck>> {
    let mut conn = state.db.get()?;
    let outcome = reconcile::apply_notification(
        &mut conn,
        &state.server_key,
        state.notifier.as_ref(),
        &notification,
    )?;
    Ok(Json(outcome.into()))
}

/// Pull path: query the gateway for an order's status and reconcile it
/// through the identical mapping/transition path as the push path.
pub async fn manual_verification(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<WebhookAck>> {
    let outcome = reconcile::verify_order(&state, &order_id).await?;
    Ok(Json(outcome.into()))
}
