pub mod payments;
pub mod subscriptions;
pub mod webhooks;

pub use payments::{cancel_payment, create_payment, get_payment_status};
pub use subscriptions::get_subscription;
pub use webhooks::{manual_verification, payment_notification};

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::sweeper::{run_sweep, SweepReport};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Manual sweep trigger: runs one expiry pass on demand, same code the
/// periodic sweeper executes.
async fn expire_check(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let conn = state.db.get()?;
    let report = run_sweep(&conn)?;
    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Purchase flow
        .route("/payment/create", post(create_payment))
        .route("/payment/{order_id}/status", get(get_payment_status))
        .route("/payment/{order_id}/cancel", post(cancel_payment))
        // Gateway notifications (push) and manual verification (pull)
        .route("/webhook/payment", post(payment_notification))
        .route("/webhook/verify/{order_id}", post(manual_verification))
        // Entitlement lookup
        .route("/subscription/{user_id}", get(get_subscription))
        // Ops
        .route("/admin/expire-check", post(expire_check))
}
