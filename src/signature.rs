//! Inbound notification authentication.
//!
//! The gateway signs each notification with
//! `SHA-512(order_id || status_code || gross_amount || server_key)`, hex
//! encoded. This digest is the sole caller identity on the webhook channel,
//! so verification is mandatory before any state mutation and any mismatch
//! fails closed.

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Compute the expected signature for a notification.
///
/// `gross_amount` is the exact decimal string the gateway sent. It is hashed
/// as-is: a payload whose amount was re-formatted (e.g. "100000" vs
/// "100000.00") produces a different digest and is rejected.
pub fn compute(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a provided signature against the expected digest.
pub fn verify(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    provided: &str,
) -> bool {
    let expected = compute(order_id, status_code, gross_amount, server_key);

    // Use constant-time comparison to prevent timing attacks.
    // Signature length is not secret (always 128 hex chars for SHA-512),
    // so the length check short-circuiting is fine.
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}
