use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                        TEXT PRIMARY KEY,
            email                     TEXT NOT NULL UNIQUE,
            username                  TEXT NOT NULL,
            password                  TEXT NOT NULL,
            refresh_token_hash        TEXT,
            refresh_token_expires_at  TEXT,
            created_at                TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_refresh_hash
            ON users(refresh_token_hash);

        CREATE TABLE IF NOT EXISTS cards (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL,
            hp           INTEGER NOT NULL,
            rarity       TEXT NOT NULL,
            card_type    TEXT NOT NULL,
            image_url    TEXT NOT NULL DEFAULT '',
            description  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS listings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            seller_id   TEXT NOT NULL REFERENCES users(id),
            card_id     INTEGER NOT NULL REFERENCES cards(id),
            price       TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'available'
                        CHECK (status IN ('available', 'sold')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_listings_status
            ON listings(status);

        -- listing_id is UNIQUE: at most one trade can ever reference a
        -- listing, whatever the application layer does.
        CREATE TABLE IF NOT EXISTS trades (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            seller_id    TEXT NOT NULL REFERENCES users(id),
            buyer_id     TEXT NOT NULL REFERENCES users(id),
            listing_id   INTEGER NOT NULL UNIQUE REFERENCES listings(id),
            amount       TEXT NOT NULL,
            executed_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trades_executed
            ON trades(executed_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
