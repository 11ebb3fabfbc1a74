use axum::extract::{Path, State};
use chrono::Utc;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::Json;
use crate::models::Subscription;

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub days_remaining: i64,
}

/// Current active entitlement for a user.
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<SubscriptionView>> {
    let conn = state.db.get()?;
    let subscription = queries::get_active_subscription(&conn, user_id)
        .or_not_found(msg::SUBSCRIPTION_NOT_FOUND)?;

    let days_remaining = (subscription.expired_at - Utc::now().timestamp()).max(0) / 86400;

    Ok(Json(SubscriptionView {
        subscription,
        days_remaining,
    }))
}
