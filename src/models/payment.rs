use serde::{Deserialize, Serialize};

/// Gateway-side transaction mirror for one order (1:1 by order_id).
///
/// Written at creation (`pending` shell) and afterwards only by the
/// reconciler, inside the same transaction as the order status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: String,
    /// Gateway-assigned id; null until the first notification arrives
    pub transaction_id: Option<String>,
    /// Raw gateway vocabulary: pending/capture/settlement/deny/cancel/expire
    pub transaction_status: String,
    pub payment_method: Option<String>,
    /// Opaque last-seen notification payload (JSON)
    pub raw_response: Option<String>,
    pub updated_at: i64,
}

/// Gateway facts carried by a notification, written alongside an order
/// transition.
#[derive(Debug, Clone)]
pub struct PaymentFacts {
    pub transaction_id: Option<String>,
    pub transaction_status: RawTransactionStatus,
    pub payment_method: Option<String>,
    pub raw_response: String,
}

/// The gateway's transaction status vocabulary.
///
/// This is the closed set of values the gateway sends; anything else is a
/// validation error rejected before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTransactionStatus {
    Pending,
    Capture,
    Settlement,
    Deny,
    Cancel,
    Expire,
}

impl RawTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Capture => "capture",
            Self::Settlement => "settlement",
            Self::Deny => "deny",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
        }
    }
}

impl std::str::FromStr for RawTransactionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "capture" => Ok(Self::Capture),
            "settlement" => Ok(Self::Settlement),
            "deny" => Ok(Self::Deny),
            "cancel" => Ok(Self::Cancel),
            "expire" => Ok(Self::Expire),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for RawTransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Joined order + payment view returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub transaction_status: String,
    pub payment_method: Option<String>,
    pub gross_amount: i64,
    pub order_status: super::OrderStatus,
    pub package_code: String,
    pub updated_at: i64,
}
