use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::Json;
use crate::gateway::{CustomerDetails, ItemDetail};
use crate::models::{CreateOrder, PaymentStatusView};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: i64,
    pub package_code: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub order_id: String,
    /// Gateway checkout token for the frontend payment widget
    pub token: String,
    pub package_code: String,
    pub gross_amount: i64,
    /// Stale pending orders superseded by this one
    pub expired_stale_orders: usize,
}

/// Create a new order and a matching gateway transaction.
///
/// The order/payment pair is inserted atomically (expiring any stale pending
/// order first); the gateway call happens after commit. If the gateway
/// refuses the transaction, the purchase fails and the fresh order is
/// cancelled so it does not linger as a dead pending row.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    let mut conn = state.db.get()?;

    let user =
        queries::get_user_by_id(&conn, request.user_id).or_not_found(msg::USER_NOT_FOUND)?;
    let package =
        queries::get_package(&conn, &request.package_code).or_not_found(msg::PACKAGE_NOT_FOUND)?;

    let (order, expired_stale_orders) = queries::create_order(
        &mut conn,
        &CreateOrder {
            user_id: user.id,
            package_code: package.code.clone(),
            gross_amount: package.price,
        },
    )?;

    let token = match state
        .gateway
        .create_transaction(
            &order.order_id,
            order.gross_amount,
            CustomerDetails {
                email: user.email.clone(),
                phone: user.phone.clone(),
            },
            vec![ItemDetail {
                id: order.order_id.clone(),
                price: order.gross_amount,
                quantity: 1,
                name: package.name.clone(),
            }],
        )
        .await
    {
        Ok(token) => token,
        Err(e) => {
            // create_transaction failure is fatal to the purchase; fail the
            // local order so a retry starts clean.
            if let Err(cancel_err) = queries::cancel_order(&mut conn, &order.order_id, user.id) {
                tracing::error!(
                    order_id = %order.order_id,
                    "Failed to cancel order after gateway error: {}",
                    cancel_err
                );
            }
            return Err(e);
        }
    };

    tracing::info!(
        order_id = %order.order_id,
        user_id = user.id,
        package = %package.code,
        expired_stale_orders,
        "Order created"
    );

    Ok(Json(CreatePaymentResponse {
        success: true,
        order_id: order.order_id,
        token,
        package_code: package.code,
        gross_amount: package.price,
        expired_stale_orders,
    }))
}

/// Joined order + payment status view.
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentStatusView>> {
    let conn = state.db.get()?;
    let view =
        queries::get_payment_status(&conn, &order_id).or_not_found(msg::ORDER_NOT_FOUND)?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct CancelPaymentRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CancelPaymentResponse {
    pub success: bool,
    pub order_id: String,
    pub status: crate::models::OrderStatus,
}

/// Cancel a pending order. The local cancellation is authoritative; the
/// gateway-side cancel afterwards is best-effort cleanup and a transport
/// failure there is only logged.
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<CancelPaymentRequest>,
) -> Result<Json<CancelPaymentResponse>> {
    let mut conn = state.db.get()?;
    let order = queries::cancel_order(&mut conn, &order_id, request.user_id)?;

    if let Err(e) = state.gateway.cancel(&order_id).await {
        tracing::warn!(order_id = %order_id, "Gateway-side cancel failed: {}", e);
    }

    Ok(Json(CancelPaymentResponse {
        success: true,
        order_id: order.order_id,
        status: order.status,
    }))
}
