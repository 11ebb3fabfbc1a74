//! Deterministic mapping from the gateway's transaction vocabulary to the
//! local order status.
//!
//! This table is the single source of truth for both the push (webhook) and
//! pull (manual verification) paths; keeping it a pure function guarantees
//! the two paths cannot diverge.

use crate::models::{OrderStatus, RawTransactionStatus};

/// Map a raw gateway status (plus the fraud signal for card captures) to the
/// target local status.
///
/// | raw        | fraud signal | local   |
/// |------------|--------------|---------|
/// | capture    | accept       | paid    |
/// | capture    | other        | failed  |
/// | settlement | -            | paid    |
/// | pending    | -            | pending |
/// | deny       | -            | failed  |
/// | cancel     | -            | failed  |
/// | expire     | -            | expired |
pub fn map_transaction_status(
    raw: RawTransactionStatus,
    fraud_status: Option<&str>,
) -> OrderStatus {
    match raw {
        RawTransactionStatus::Capture => {
            if fraud_status == Some("accept") {
                OrderStatus::Paid
            } else {
                OrderStatus::Failed
            }
        }
        RawTransactionStatus::Settlement => OrderStatus::Paid,
        RawTransactionStatus::Pending => OrderStatus::Pending,
        RawTransactionStatus::Deny | RawTransactionStatus::Cancel => OrderStatus::Failed,
        RawTransactionStatus::Expire => OrderStatus::Expired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_requires_fraud_accept() {
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Capture, Some("accept")),
            OrderStatus::Paid
        );
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Capture, Some("challenge")),
            OrderStatus::Failed
        );
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Capture, None),
            OrderStatus::Failed
        );
    }

    #[test]
    fn settlement_is_paid_regardless_of_fraud_signal() {
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Settlement, None),
            OrderStatus::Paid
        );
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Settlement, Some("challenge")),
            OrderStatus::Paid
        );
    }

    #[test]
    fn full_table() {
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Pending, None),
            OrderStatus::Pending
        );
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Deny, None),
            OrderStatus::Failed
        );
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Cancel, None),
            OrderStatus::Failed
        );
        assert_eq!(
            map_transaction_status(RawTransactionStatus::Expire, None),
            OrderStatus::Expired
        );
    }
}
