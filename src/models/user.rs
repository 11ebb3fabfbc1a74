use serde::{Deserialize, Serialize};

/// Minimal identity needed for gateway customer details and notifications.
/// Credential and session handling live outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: i64,
}
