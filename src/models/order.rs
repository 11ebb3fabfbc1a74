use serde::{Deserialize, Serialize};

/// One purchase attempt, identified by a gateway-facing order_id.
///
/// An order is created `pending` and moves to exactly one terminal status
/// (`paid`, `failed`, `expired`). It never leaves a terminal status again;
/// the ledger's transition rule enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Gateway-facing id, e.g. "ORD-42-1718000000000-123"
    pub order_id: String,
    pub user_id: i64,
    pub package_code: String,
    /// Amount in minor currency units
    pub gross_amount: i64,
    pub status: OrderStatus,
    /// Set when the order is paid: end of the entitlement window
    pub expiry_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new order
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub user_id: i64,
    pub package_code: String,
    pub gross_amount: i64,
}

/// Local order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Terminal statuses never transition to a different status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a ledger transition: the status before and after.
/// The reconciler uses the pair to decide whether to fire activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTransition {
    pub previous: OrderStatus,
    pub new: OrderStatus,
}

impl OrderTransition {
    /// True exactly when this transition should trigger subscription
    /// activation: the order just became paid and was not paid before.
    pub fn is_newly_paid(&self) -> bool {
        self.new == OrderStatus::Paid && self.previous != OrderStatus::Paid
    }
}
