use crate::Database;
use crate::models::{ListingWithCardRow, NewListing, SettleOutcome, TradeDetailRow, UserRow};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::warn;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, password) VALUES (?1, ?2, ?3, ?4)",
                (id, email, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM users", params![], |row| row.get(0))?;
            Ok(count)
        })
    }

    // -- Refresh sessions --

    /// Overwrite the stored refresh-token hash for a user. Whatever token
    /// was live before becomes unusable — one live refresh token per user.
    pub fn store_refresh_session(&self, user_id: &str, token_hash: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET refresh_token_hash = ?1, refresh_token_expires_at = ?2 WHERE id = ?3",
                params![token_hash, expires_at, user_id],
            )?;
            if updated != 1 {
                return Err(anyhow!("refresh session write matched {} users for id {}", updated, user_id));
            }
            Ok(())
        })
    }

    /// Single-use rotation: find the user holding `presented_hash`, check
    /// expiry against `now`, then swap in the new hash with a conditional
    /// update. The `refresh_token_hash = ?presented` guard means two
    /// rotations racing on the same stale token cannot both win — the loser
    /// updates zero rows and gets `None`.
    pub fn rotate_refresh_session(
        &self,
        presented_hash: &str,
        new_hash: &str,
        new_expires_at: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>> {
        match self.try_rotate(presented_hash, new_hash, new_expires_at, now) {
            Err(e) if is_busy(&e) => {
                warn!("refresh rotation hit SQLITE_BUSY, retrying once");
                self.try_rotate(presented_hash, new_hash, new_expires_at, now)
            }
            other => other,
        }
    }

    fn try_rotate(
        &self,
        presented_hash: &str,
        new_hash: &str,
        new_expires_at: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(user) = query_user_by_refresh_hash(&tx, presented_hash)? else {
                return Ok(None);
            };

            let expires_at = match user.refresh_token_expires_at.as_deref() {
                Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                    Ok(dt) => dt.with_timezone(&Utc),
                    Err(e) => {
                        warn!("Corrupt refresh expiry '{}' on user '{}': {}", raw, user.id, e);
                        return Ok(None);
                    }
                },
                None => return Ok(None),
            };

            if now >= expires_at {
                return Ok(None);
            }

            let updated = tx.execute(
                "UPDATE users SET refresh_token_hash = ?1, refresh_token_expires_at = ?2
                 WHERE id = ?3 AND refresh_token_hash = ?4",
                params![new_hash, new_expires_at, user.id, presented_hash],
            )?;
            if updated != 1 {
                return Ok(None);
            }

            tx.commit()?;
            Ok(Some(user))
        })
    }

    // -- Listings --

    /// Insert the card and its listing in one transaction; the listing
    /// comes back in its joined read shape.
    pub fn create_listing(&self, seller_id: &str, new: &NewListing<'_>) -> Result<ListingWithCardRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO cards (name, hp, rarity, card_type, image_url, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![new.card_name, new.hp, new.rarity, new.card_type, new.image_url, new.description],
            )?;
            let card_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO listings (seller_id, card_id, price) VALUES (?1, ?2, ?3)",
                params![seller_id, card_id, new.price],
            )?;
            let listing_id = tx.last_insert_rowid();

            let listing = query_listings(&tx, "WHERE l.id = ?1", [listing_id])?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("listing {} missing inside its own transaction", listing_id))?;

            tx.commit()?;
            Ok(listing)
        })
    }

    pub fn get_listing(&self, id: i64) -> Result<Option<ListingWithCardRow>> {
        self.with_conn(|conn| Ok(query_listings(conn, "WHERE l.id = ?1", [id])?.into_iter().next()))
    }

    pub fn listings_by_seller(&self, seller_id: &str) -> Result<Vec<ListingWithCardRow>> {
        self.with_conn(|conn| {
            query_listings(conn, "WHERE l.seller_id = ?1 ORDER BY l.id DESC", [seller_id])
        })
    }

    pub fn available_listings(&self) -> Result<Vec<ListingWithCardRow>> {
        self.with_conn(|conn| {
            query_listings(conn, "WHERE l.status = 'available' ORDER BY l.id DESC", params![])
        })
    }

    /// Most recent N available listings by creation order (descending id).
    pub fn top_listings(&self, limit: u32) -> Result<Vec<ListingWithCardRow>> {
        self.with_conn(|conn| {
            query_listings(
                conn,
                "WHERE l.status = 'available' ORDER BY l.id DESC LIMIT ?1",
                [limit],
            )
        })
    }

    /// Price edits only apply while the listing is still available.
    /// Returns false when the guard matched nothing.
    pub fn update_listing_price(&self, id: i64, price: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE listings SET price = ?1 WHERE id = ?2 AND status = 'available'",
                params![price, id],
            )?;
            Ok(updated == 1)
        })
    }

    /// Remove an available listing and the card that was created with it.
    /// Sold listings are referenced by a trade and stay put; returns false
    /// when nothing deletable matched.
    pub fn delete_listing(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let card_id: Option<i64> = tx
                .query_row(
                    "SELECT card_id FROM listings WHERE id = ?1 AND status = 'available'",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(card_id) = card_id else {
                return Ok(false);
            };

            tx.execute("DELETE FROM listings WHERE id = ?1", [id])?;
            tx.execute("DELETE FROM cards WHERE id = ?1", [card_id])?;

            tx.commit()?;
            Ok(true)
        })
    }

    // -- Settlement --

    /// Settle a listing into a trade. The whole read-check-write sequence
    /// runs in one immediate transaction; the status flip is a conditional
    /// update whose affected-row count decides the winner, so concurrent
    /// buyers cannot both settle the same listing.
    pub fn settle_listing(&self, buyer_id: &str, listing_id: i64, now: DateTime<Utc>) -> Result<SettleOutcome> {
        // Transient lock contention is retried once at the transaction
        // boundary; anything else propagates.
        match self.try_settle(buyer_id, listing_id, now) {
            Err(e) if is_busy(&e) => {
                warn!("settlement of listing {} hit SQLITE_BUSY, retrying once", listing_id);
                self.try_settle(buyer_id, listing_id, now)
            }
            other => other,
        }
    }

    fn try_settle(&self, buyer_id: &str, listing_id: i64, now: DateTime<Utc>) -> Result<SettleOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(listing) = query_listings(&tx, "WHERE l.id = ?1", [listing_id])?.into_iter().next() else {
                return Ok(SettleOutcome::ListingNotFound);
            };
            // Self-purchase is rejected whatever the status, so sellers
            // can't probe availability through the error.
            if listing.seller_id == buyer_id {
                return Ok(SettleOutcome::SelfPurchase);
            }
            if listing.status != "available" {
                return Ok(SettleOutcome::NotAvailable);
            }
            let Some(buyer) = query_user_by_id(&tx, buyer_id)? else {
                return Ok(SettleOutcome::UnknownBuyer);
            };
            let Some(seller) = query_user_by_id(&tx, &listing.seller_id)? else {
                return Ok(SettleOutcome::MissingSeller);
            };

            let updated = tx.execute(
                "UPDATE listings SET status = 'sold' WHERE id = ?1 AND status = 'available'",
                [listing_id],
            )?;
            if updated != 1 {
                return Ok(SettleOutcome::NotAvailable);
            }

            let executed_at = now.to_rfc3339();
            tx.execute(
                "INSERT INTO trades (seller_id, buyer_id, listing_id, amount, executed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![listing.seller_id, buyer_id, listing_id, listing.price, executed_at],
            )?;
            let trade_id = tx.last_insert_rowid();

            tx.commit()?;
            Ok(SettleOutcome::Settled(TradeDetailRow {
                id: trade_id,
                listing_id,
                seller_id: listing.seller_id,
                buyer_id: buyer_id.to_string(),
                seller_username: seller.username,
                buyer_username: buyer.username,
                card_name: listing.card_name,
                amount: listing.price,
                executed_at,
            }))
        })
    }

    // -- Trades --

    pub fn get_trade(&self, id: i64) -> Result<Option<TradeDetailRow>> {
        self.with_conn(|conn| Ok(query_trades(conn, "WHERE t.id = ?1", [id])?.into_iter().next()))
    }

    pub fn trades_for_user(&self, user_id: &str) -> Result<Vec<TradeDetailRow>> {
        self.with_conn(|conn| {
            query_trades(
                conn,
                "WHERE t.buyer_id = ?1 OR t.seller_id = ?1 ORDER BY t.id DESC",
                [user_id],
            )
        })
    }

    pub fn recent_trades(&self, limit: u32) -> Result<Vec<TradeDetailRow>> {
        self.with_conn(|conn| {
            query_trades(
                conn,
                "ORDER BY t.executed_at DESC, t.id DESC LIMIT ?1",
                [limit],
            )
        })
    }
}

fn is_busy(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::DatabaseBusy
    )
}

const USER_SELECT: &str =
    "SELECT id, email, username, password, refresh_token_hash, refresh_token_expires_at, created_at
     FROM users";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        refresh_token_hash: row.get(4)?,
        refresh_token_expires_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE id = ?1"))?;
    let row = stmt.query_row([id], map_user).optional()?;
    Ok(row)
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE email = ?1"))?;
    let row = stmt.query_row([email], map_user).optional()?;
    Ok(row)
}

fn query_user_by_refresh_hash(conn: &Connection, hash: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE refresh_token_hash = ?1"))?;
    let row = stmt.query_row([hash], map_user).optional()?;
    Ok(row)
}

// JOIN users and cards so feeds come back in one query (eliminates N+1)
const LISTING_SELECT: &str =
    "SELECT l.id, l.seller_id, u.username, l.card_id, c.name, c.hp, c.rarity, c.card_type,
            c.image_url, c.description, l.price, l.status, l.created_at
     FROM listings l
     LEFT JOIN users u ON l.seller_id = u.id
     JOIN cards c ON l.card_id = c.id";

fn query_listings<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> Result<Vec<ListingWithCardRow>> {
    let mut stmt = conn.prepare(&format!("{LISTING_SELECT} {clause}"))?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(ListingWithCardRow {
                id: row.get(0)?,
                seller_id: row.get(1)?,
                seller_username: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
                card_id: row.get(3)?,
                card_name: row.get(4)?,
                hp: row.get(5)?,
                rarity: row.get(6)?,
                card_type: row.get(7)?,
                image_url: row.get(8)?,
                description: row.get(9)?,
                price: row.get(10)?,
                status: row.get(11)?,
                created_at: row.get(12)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

const TRADE_SELECT: &str =
    "SELECT t.id, t.listing_id, t.seller_id, t.buyer_id, s.username, b.username, c.name,
            t.amount, t.executed_at
     FROM trades t
     LEFT JOIN users s ON t.seller_id = s.id
     LEFT JOIN users b ON t.buyer_id = b.id
     LEFT JOIN listings l ON t.listing_id = l.id
     LEFT JOIN cards c ON l.card_id = c.id";

fn query_trades<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> Result<Vec<TradeDetailRow>> {
    let mut stmt = conn.prepare(&format!("{TRADE_SELECT} {clause}"))?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(TradeDetailRow {
                id: row.get(0)?,
                listing_id: row.get(1)?,
                seller_id: row.get(2)?,
                buyer_id: row.get(3)?,
                seller_username: row.get::<_, Option<String>>(4)?.unwrap_or_else(|| "unknown".to_string()),
                buyer_username: row.get::<_, Option<String>>(5)?.unwrap_or_else(|| "unknown".to_string()),
                card_name: row.get::<_, Option<String>>(6)?.unwrap_or_else(|| "unknown".to_string()),
                amount: row.get(7)?,
                executed_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, email: &str, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, email, username, "$argon2id$test-hash").unwrap();
        id
    }

    fn seed_listing(db: &Database, seller_id: &str, price: &str) -> ListingWithCardRow {
        db.create_listing(
            seller_id,
            &NewListing {
                card_name: "Charizard",
                hp: 120,
                rarity: "Rare Holo",
                card_type: "Fire",
                image_url: "",
                description: "",
                price,
            },
        )
        .unwrap()
    }

    #[test]
    fn create_and_fetch_listing() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let created = seed_listing(&db, &seller, "10.0000");

        let fetched = db.get_listing(created.id).unwrap().unwrap();
        assert_eq!(fetched.card_name, "Charizard");
        assert_eq!(fetched.seller_username, "ash");
        assert_eq!(fetched.price, "10.0000");
        assert_eq!(fetched.status, "available");
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = test_db();
        seed_user(&db, "ash@example.com", "ash");
        let id = Uuid::new_v4().to_string();
        assert!(db.create_user(&id, "ash@example.com", "other", "h").is_err());
    }

    #[test]
    fn settle_marks_sold_and_snapshots_price() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let listing = seed_listing(&db, &seller, "10.0000");

        let outcome = db.settle_listing(&buyer, listing.id, Utc::now()).unwrap();
        let trade = match outcome {
            SettleOutcome::Settled(t) => t,
            _ => panic!("expected settlement to succeed"),
        };

        assert_eq!(trade.amount, "10.0000");
        assert_eq!(trade.seller_username, "ash");
        assert_eq!(trade.buyer_username, "misty");
        assert_eq!(trade.card_name, "Charizard");

        let listing = db.get_listing(listing.id).unwrap().unwrap();
        assert_eq!(listing.status, "sold");

        let stored = db.get_trade(trade.id).unwrap().unwrap();
        assert_eq!(stored.listing_id, listing.id);
    }

    #[test]
    fn settle_twice_reports_not_available() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let other = seed_user(&db, "brock@example.com", "brock");
        let listing = seed_listing(&db, &seller, "10.0000");

        assert!(matches!(
            db.settle_listing(&buyer, listing.id, Utc::now()).unwrap(),
            SettleOutcome::Settled(_)
        ));
        assert!(matches!(
            db.settle_listing(&other, listing.id, Utc::now()).unwrap(),
            SettleOutcome::NotAvailable
        ));

        let trades = db.recent_trades(10).unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn settle_own_listing_rejected() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let listing = seed_listing(&db, &seller, "10.0000");

        assert!(matches!(
            db.settle_listing(&seller, listing.id, Utc::now()).unwrap(),
            SettleOutcome::SelfPurchase
        ));
        // Still buyable by someone else afterwards
        let listing = db.get_listing(listing.id).unwrap().unwrap();
        assert_eq!(listing.status, "available");
    }

    #[test]
    fn settle_missing_listing() {
        let db = test_db();
        let buyer = seed_user(&db, "misty@example.com", "misty");
        assert!(matches!(
            db.settle_listing(&buyer, 999, Utc::now()).unwrap(),
            SettleOutcome::ListingNotFound
        ));
    }

    #[test]
    fn settle_unknown_buyer() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let listing = seed_listing(&db, &seller, "10.0000");

        let ghost = Uuid::new_v4().to_string();
        assert!(matches!(
            db.settle_listing(&ghost, listing.id, Utc::now()).unwrap(),
            SettleOutcome::UnknownBuyer
        ));
    }

    #[test]
    fn feeds_exclude_sold_and_order_newest_first() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let first = seed_listing(&db, &seller, "1.00");
        let second = seed_listing(&db, &seller, "2.00");
        let third = seed_listing(&db, &seller, "3.00");

        let top = db.top_listings(2).unwrap();
        assert_eq!(top.iter().map(|l| l.id).collect::<Vec<_>>(), vec![third.id, second.id]);

        assert!(matches!(
            db.settle_listing(&buyer, second.id, Utc::now()).unwrap(),
            SettleOutcome::Settled(_)
        ));

        let available = db.available_listings().unwrap();
        assert_eq!(available.iter().map(|l| l.id).collect::<Vec<_>>(), vec![third.id, first.id]);
    }

    #[test]
    fn price_edits_refused_once_sold() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let listing = seed_listing(&db, &seller, "10.0000");

        assert!(db.update_listing_price(listing.id, "12.5000").unwrap());

        assert!(matches!(
            db.settle_listing(&buyer, listing.id, Utc::now()).unwrap(),
            SettleOutcome::Settled(_)
        ));
        assert!(!db.update_listing_price(listing.id, "99.0000").unwrap());

        // The trade keeps the price that was live at settlement
        let trade = db.recent_trades(1).unwrap().remove(0);
        assert_eq!(trade.amount, "12.5000");
    }

    #[test]
    fn delete_listing_removes_card_too() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let listing = seed_listing(&db, &seller, "10.0000");

        assert!(db.delete_listing(listing.id).unwrap());

        assert!(db.get_listing(listing.id).unwrap().is_none());
        let cards: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM cards", params![], |row| row.get(0))?))
            .unwrap();
        assert_eq!(cards, 0);
    }

    #[test]
    fn delete_refuses_sold_listing() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let listing = seed_listing(&db, &seller, "10.0000");

        assert!(matches!(
            db.settle_listing(&buyer, listing.id, Utc::now()).unwrap(),
            SettleOutcome::Settled(_)
        ));

        assert!(!db.delete_listing(listing.id).unwrap());
        assert!(db.get_listing(listing.id).unwrap().is_some());
    }

    #[test]
    fn rotate_refresh_session_is_single_use() {
        let db = test_db();
        let user = seed_user(&db, "ash@example.com", "ash");
        let expires = (Utc::now() + Duration::days(7)).to_rfc3339();

        db.store_refresh_session(&user, "hash-1", &expires).unwrap();

        let rotated = db
            .rotate_refresh_session("hash-1", "hash-2", &expires, Utc::now())
            .unwrap();
        assert!(rotated.is_some());

        // The old hash is gone; presenting it again matches nothing.
        let replay = db
            .rotate_refresh_session("hash-1", "hash-3", &expires, Utc::now())
            .unwrap();
        assert!(replay.is_none());

        let stored = db.get_user_by_id(&user).unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("hash-2"));
    }

    #[test]
    fn rotate_expired_session_fails() {
        let db = test_db();
        let user = seed_user(&db, "ash@example.com", "ash");
        let expired = (Utc::now() - Duration::minutes(1)).to_rfc3339();

        db.store_refresh_session(&user, "hash-1", &expired).unwrap();

        let rotated = db
            .rotate_refresh_session("hash-1", "hash-2", &expired, Utc::now())
            .unwrap();
        assert!(rotated.is_none());

        // The expired hash stays in place — it is dead either way.
        let stored = db.get_user_by_id(&user).unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("hash-1"));
    }

    #[test]
    fn trades_for_user_filters_participants() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let bystander = seed_user(&db, "brock@example.com", "brock");
        let listing = seed_listing(&db, &seller, "10.0000");

        assert!(matches!(
            db.settle_listing(&buyer, listing.id, Utc::now()).unwrap(),
            SettleOutcome::Settled(_)
        ));

        assert_eq!(db.trades_for_user(&seller).unwrap().len(), 1);
        assert_eq!(db.trades_for_user(&buyer).unwrap().len(), 1);
        assert!(db.trades_for_user(&bystander).unwrap().is_empty());
    }

    #[test]
    fn recent_trades_joins_names() {
        let db = test_db();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let first = seed_listing(&db, &seller, "1.00");
        let second = seed_listing(&db, &seller, "2.00");

        let t0 = Utc::now();
        assert!(matches!(
            db.settle_listing(&buyer, first.id, t0).unwrap(),
            SettleOutcome::Settled(_)
        ));
        assert!(matches!(
            db.settle_listing(&buyer, second.id, t0 + Duration::seconds(5)).unwrap(),
            SettleOutcome::Settled(_)
        ));

        let recent = db.recent_trades(10).unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].listing_id, second.id);
        assert_eq!(recent[0].buyer_username, "misty");
        assert_eq!(recent[0].seller_username, "ash");
        assert_eq!(recent[0].card_name, "Charizard");
    }

    #[test]
    fn count_users_counts() {
        let db = test_db();
        assert_eq!(db.count_users().unwrap(), 0);
        seed_user(&db, "ash@example.com", "ash");
        seed_user(&db, "misty@example.com", "misty");
        assert_eq!(db.count_users().unwrap(), 2);
    }
}
