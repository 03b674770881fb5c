use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use arcanum_db::models::TradeDetailRow;
use arcanum_types::api::{
    Claims, RecentTradeResponse, SettleRequest, TradeResponse, TradeStatsResponse,
};

use crate::{AppState, error::ApiError, parse_decimal, parse_timestamp, parse_uuid, run_blocking, settlement};

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
}

fn default_recent_limit() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_stats_limit")]
    pub limit: u32,
}

fn default_stats_limit() -> u32 {
    30
}

fn to_response(row: TradeDetailRow) -> TradeResponse {
    TradeResponse {
        id: row.id,
        listing_id: row.listing_id,
        seller_id: parse_uuid(&row.seller_id),
        buyer_id: parse_uuid(&row.buyer_id),
        seller_username: row.seller_username,
        buyer_username: row.buyer_username,
        card_name: row.card_name,
        amount: parse_decimal(&row.amount),
        executed_at: parse_timestamp(&row.executed_at),
    }
}

// -- Caller's trades --

pub async fn my_trades(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || Ok(state.db.trades_for_user(&claims.sub.to_string())?))
        .await?;

    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn get_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(move || Ok(state.db.get_trade(id)?))
        .await?
        .ok_or(ApiError::NotFound)?;

    let caller = claims.sub.to_string();
    if row.buyer_id != caller && row.seller_id != caller {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(to_response(row)))
}

/// Buy flow — the settlement engine decides who wins the listing.
pub async fn create_trade(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SettleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let trade = run_blocking(move || {
        let buyer_id = claims.sub.to_string();
        settlement::settle(&state.db, &buyer_id, req.listing_id, Utc::now())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(trade))))
}

// -- Public feeds --

pub async fn recent_trades(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(50);
    let rows = run_blocking(move || Ok(state.db.recent_trades(limit)?)).await?;

    let trades: Vec<RecentTradeResponse> = rows
        .into_iter()
        .map(|row| RecentTradeResponse {
            id: row.id,
            executed_at: parse_timestamp(&row.executed_at),
            buyer: row.buyer_username,
            seller: row.seller_username,
            card: row.card_name,
        })
        .collect();

    Ok(Json(trades))
}

pub async fn trade_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(100);
    let rows = run_blocking(move || Ok(state.db.recent_trades(limit)?)).await?;

    let trades: Vec<TradeStatsResponse> = rows
        .into_iter()
        .map(|row| TradeStatsResponse {
            id: row.id,
            amount: parse_decimal(&row.amount),
            executed_at: parse_timestamp(&row.executed_at),
            buyer: row.buyer_username,
            seller: row.seller_username,
            card: row.card_name,
        })
        .collect();

    Ok(Json(trades))
}
