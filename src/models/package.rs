use serde::{Deserialize, Serialize};

/// An entitlement tier: price and subscription duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub code: String,
    pub name: String,
    /// Price in minor currency units
    pub price: i64,
    /// Entitlement window length granted on activation
    pub duration_days: i64,
}
