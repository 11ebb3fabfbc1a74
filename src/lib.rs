//! Subgate - subscription payment reconciliation service
//!
//! Converts asynchronous payment-status notifications from an external
//! gateway into consistent, durable changes to order lifecycles and user
//! entitlements, despite notifications arriving out of order, more than
//! once, or concurrently with user-initiated status checks.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod signature;
pub mod status;
pub mod sweeper;
