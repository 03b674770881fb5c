use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Card, ListingStatus};

// -- JWT Claims --

/// JWT claims shared between arcanum-api's session manager (issuance) and
/// its middleware (verification). Canonical definition lives here in
/// arcanum-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub iss: String,
    pub aud: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// The raw refresh token is returned to the caller exactly once and never
/// stored server-side — only its hash is.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserCountResponse {
    pub count: i64,
}

// -- Listings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
    pub card_name: String,
    pub hp: i32,
    pub rarity: String,
    pub card_type: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
}

/// Price is the only client-writable field: status transitions belong to
/// settlement alone.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateListingRequest {
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub id: i64,
    pub seller_id: Uuid,
    pub seller_username: String,
    pub price: Decimal,
    pub status: ListingStatus,
    pub card: Card,
    pub created_at: DateTime<Utc>,
}

// -- Trades --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettleRequest {
    pub listing_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub id: i64,
    pub listing_id: i64,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_username: String,
    pub buyer_username: String,
    pub card_name: String,
    pub amount: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Public feed of the latest sales — display names only, no account ids.
#[derive(Debug, Serialize)]
pub struct RecentTradeResponse {
    pub id: i64,
    pub executed_at: DateTime<Utc>,
    pub buyer: String,
    pub seller: String,
    pub card: String,
}

#[derive(Debug, Serialize)]
pub struct TradeStatsResponse {
    pub id: i64,
    pub amount: Decimal,
    pub executed_at: DateTime<Utc>,
    pub buyer: String,
    pub seller: String,
    pub card: String,
}
