//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, phone, created_at";

pub const PACKAGE_COLS: &str = "code, name, price, duration_days";

pub const ORDER_COLS: &str =
    "order_id, user_id, package_code, gross_amount, status, expiry_date, created_at, updated_at";

pub const PAYMENT_COLS: &str =
    "order_id, transaction_id, transaction_status, payment_method, raw_response, updated_at";

pub const SUBSCRIPTION_COLS: &str =
    "id, user_id, package_code, status, started_at, expired_at, order_id";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            phone: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Package {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Package {
            code: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            duration_days: row.get(3)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            order_id: row.get(0)?,
            user_id: row.get(1)?,
            package_code: row.get(2)?,
            gross_amount: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            expiry_date: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            order_id: row.get(0)?,
            transaction_id: row.get(1)?,
            transaction_status: row.get(2)?,
            payment_method: row.get(3)?,
            raw_response: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            package_code: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            started_at: row.get(4)?,
            expired_at: row.get(5)?,
            order_id: row.get(6)?,
        })
    }
}

impl FromRow for PaymentStatusView {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentStatusView {
            order_id: row.get(0)?,
            transaction_id: row.get(1)?,
            transaction_status: row.get(2)?,
            payment_method: row.get(3)?,
            gross_amount: row.get(4)?,
            order_status: parse_enum(row, 5, "order_status")?,
            package_code: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
