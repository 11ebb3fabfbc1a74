//! Payment gateway HTTP client.
//!
//! Narrow contract over the gateway's Snap (checkout token) and Core
//! (status/cancel/approve) APIs. Every call is bounded by a request timeout;
//! only `create_transaction` failure is fatal to a purchase flow, the
//! cancel/approve calls are advisory cleanup.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct CreateTransactionRequest {
    transaction_details: TransactionDetails,
    customer_details: CustomerDetails,
    item_details: Vec<ItemDetail>,
}

#[derive(Debug, Serialize)]
struct TransactionDetails {
    order_id: String,
    gross_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CreateTransactionResponse {
    token: String,
}

/// Status payload returned by the gateway's status-query API. The manual
/// verification path feeds these fields through the same mapping the
/// webhook path uses.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub status_code: String,
    pub gross_amount: String,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    server_key: String,
}

impl GatewayClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            server_key: config.gateway_server_key.clone(),
        })
    }

    /// Create a gateway transaction for a new order and return the checkout
    /// token. Failure here is fatal to the purchase flow.
    pub async fn create_transaction(
        &self,
        order_id: &str,
        gross_amount: i64,
        customer: CustomerDetails,
        items: Vec<ItemDetail>,
    ) -> Result<String> {
        let request = CreateTransactionRequest {
            transaction_details: TransactionDetails {
                order_id: order_id.to_string(),
                gross_amount,
            },
            customer_details: customer,
            item_details: items,
        };

        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.base_url))
            .basic_auth(&self.server_key, Some(""))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("create_transaction: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "create_transaction returned {}: {}",
                status, body
            )));
        }

        let created: CreateTransactionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("create_transaction response: {}", e)))?;

        Ok(created.token)
    }

    /// Query the gateway's authoritative view of a transaction.
    pub async fn check_status(&self, order_id: &str) -> Result<StatusPayload> {
        let response = self
            .client
            .get(format!("{}/v2/{}/status", self.base_url, order_id))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("check_status: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "check_status returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("check_status response: {}", e)))
    }

    /// Ask the gateway to cancel a transaction. Advisory: callers log a
    /// failure and keep local state authoritative.
    pub async fn cancel(&self, order_id: &str) -> Result<()> {
        self.post_action(order_id, "cancel").await
    }

    /// Approve a challenged card transaction. Advisory, like `cancel`.
    pub async fn approve(&self, order_id: &str) -> Result<()> {
        self.post_action(order_id, "approve").await
    }

    async fn post_action(&self, order_id: &str, action: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/v2/{}/{}", self.base_url, order_id, action))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("{}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "{} returned {}: {}",
                action, status, body
            )));
        }

        Ok(())
    }
}
