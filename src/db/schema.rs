use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (minimal identity: gateway customer details + notify target)
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            created_at INTEGER NOT NULL
        );

        -- Entitlement catalog
        CREATE TABLE IF NOT EXISTS packages (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price INTEGER NOT NULL,
            duration_days INTEGER NOT NULL
        );

        -- Orders (one purchase attempt; status owned by the ledger)
        CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            package_code TEXT NOT NULL REFERENCES packages(code),
            gross_amount INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'failed', 'expired')),
            expiry_date INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
        CREATE INDEX IF NOT EXISTS idx_orders_user_status ON orders(user_id, status);

        -- Payments (1:1 gateway mirror; written only at creation and by the
        -- reconciler, in the same transaction as the order status change)
        CREATE TABLE IF NOT EXISTS payments (
            order_id TEXT PRIMARY KEY REFERENCES orders(order_id),
            transaction_id TEXT,
            transaction_status TEXT NOT NULL,
            payment_method TEXT,
            raw_response TEXT,
            updated_at INTEGER NOT NULL
        );

        -- Subscriptions (entitlement windows; superseded, never deleted)
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            package_code TEXT NOT NULL REFERENCES packages(code),
            status TEXT NOT NULL CHECK (status IN ('active', 'cancelled', 'expired')),
            started_at INTEGER NOT NULL,
            expired_at INTEGER NOT NULL,
            order_id TEXT NOT NULL REFERENCES orders(order_id)
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);
        -- Storage-level guarantee: at most one active subscription per user.
        -- Concurrent activations that both see "no active row" cannot both insert.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_one_active
            ON subscriptions(user_id) WHERE status = 'active';

        -- Delivery dedup: one row per distinct notification the gateway sent.
        -- INSERT OR IGNORE on this table answers "already applied?" before
        -- any mutation.
        CREATE TABLE IF NOT EXISTS webhook_events (
            order_id TEXT NOT NULL,
            transaction_id TEXT NOT NULL,
            transaction_status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(order_id, transaction_id, transaction_status)
        );
        "#,
    )
}
