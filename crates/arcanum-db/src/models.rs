/// Database row types — these map directly to SQLite rows.
/// Distinct from arcanum-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires_at: Option<String>,
    pub created_at: String,
}

/// Listing joined with its card and the seller's username, the shape every
/// listing read returns (feeds would otherwise N+1 on users and cards).
pub struct ListingWithCardRow {
    pub id: i64,
    pub seller_id: String,
    pub seller_username: String,
    pub card_id: i64,
    pub card_name: String,
    pub hp: i32,
    pub rarity: String,
    pub card_type: String,
    pub image_url: String,
    pub description: String,
    pub price: String,
    pub status: String,
    pub created_at: String,
}

pub struct TradeDetailRow {
    pub id: i64,
    pub listing_id: i64,
    pub seller_id: String,
    pub buyer_id: String,
    pub seller_username: String,
    pub buyer_username: String,
    pub card_name: String,
    pub amount: String,
    pub executed_at: String,
}

/// Card attributes for the sell flow — the card is inserted together with
/// its listing in one transaction.
pub struct NewListing<'a> {
    pub card_name: &'a str,
    pub hp: i32,
    pub rarity: &'a str,
    pub card_type: &'a str,
    pub image_url: &'a str,
    pub description: &'a str,
    pub price: &'a str,
}

/// Result of a settlement attempt. Precondition failures are data, not
/// errors — only infrastructure failures surface as Err.
pub enum SettleOutcome {
    Settled(TradeDetailRow),
    ListingNotFound,
    NotAvailable,
    SelfPurchase,
    UnknownBuyer,
    /// The listing references a seller that no longer exists. Broken
    /// invariant — callers must treat this as an integrity failure.
    MissingSeller,
}
