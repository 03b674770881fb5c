use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use arcanum_db::models::{ListingWithCardRow, NewListing};
use arcanum_types::api::{Claims, CreateListingRequest, ListingResponse, UpdateListingRequest};
use arcanum_types::models::{Card, ListingStatus};

use crate::{AppState, error::ApiError, parse_decimal, parse_timestamp, parse_uuid, run_blocking};

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_top_limit")]
    pub limit: u32,
}

fn default_top_limit() -> u32 {
    5
}

pub(crate) fn to_response(row: ListingWithCardRow) -> ListingResponse {
    let status = ListingStatus::parse(&row.status).unwrap_or_else(|| {
        // Fail closed: an unrecognized status must not look buyable.
        warn!("Corrupt status '{}' on listing {}", row.status, row.id);
        ListingStatus::Sold
    });

    ListingResponse {
        id: row.id,
        seller_id: parse_uuid(&row.seller_id),
        seller_username: row.seller_username,
        price: parse_decimal(&row.price),
        status,
        card: Card {
            id: row.card_id,
            name: row.card_name,
            hp: row.hp,
            rarity: row.rarity,
            card_type: row.card_type,
            image_url: row.image_url,
            description: row.description,
        },
        created_at: parse_timestamp(&row.created_at),
    }
}

// -- Caller's listings --

pub async fn my_listings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || Ok(state.db.listings_by_seller(&claims.sub.to_string())?))
        .await?;

    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(move || Ok(state.db.get_listing(id)?))
        .await?
        .ok_or(ApiError::NotFound)?;

    if row.seller_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(to_response(row)))
}

/// Sell flow: the card is created together with its listing.
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.card_name.trim().is_empty() {
        return Err(ApiError::BadRequest("card name is required"));
    }
    if req.price <= Decimal::ZERO {
        return Err(ApiError::BadRequest("price must be positive"));
    }

    let row = run_blocking(move || {
        let seller_id = claims.sub.to_string();
        let price = req.price.to_string();
        Ok(state.db.create_listing(
            &seller_id,
            &NewListing {
                card_name: &req.card_name,
                hp: req.hp,
                rarity: &req.rarity,
                card_type: &req.card_type,
                image_url: &req.image_url,
                description: &req.description,
                price: &price,
            },
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

/// Price is the only mutable field, and only while the listing is still
/// available — status transitions belong to settlement.
pub async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.price <= Decimal::ZERO {
        return Err(ApiError::BadRequest("price must be positive"));
    }

    let row = run_blocking(move || {
        let row = state.db.get_listing(id)?.ok_or(ApiError::NotFound)?;
        if row.seller_id != claims.sub.to_string() {
            return Err(ApiError::Forbidden);
        }
        if row.status != ListingStatus::Available.as_str() {
            return Err(ApiError::Conflict("listing already sold"));
        }

        let price = req.price.to_string();
        if !state.db.update_listing_price(id, &price)? {
            // Settlement won the race between the read above and the guard.
            return Err(ApiError::Conflict("listing already sold"));
        }

        state.db.get_listing(id)?.ok_or(ApiError::NotFound)
    })
    .await?;

    Ok(Json(to_response(row)))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || {
        let row = state.db.get_listing(id)?.ok_or(ApiError::NotFound)?;
        if row.seller_id != claims.sub.to_string() {
            return Err(ApiError::Forbidden);
        }
        if row.status != ListingStatus::Available.as_str() {
            // Sold listings are trade history; they stay.
            return Err(ApiError::Conflict("sold listings cannot be deleted"));
        }

        if !state.db.delete_listing(id)? {
            return Err(ApiError::Conflict("sold listings cannot be deleted"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

// -- Public feeds --

pub async fn all_listings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || Ok(state.db.available_listings()?)).await?;
    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn top_listings(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(50);
    let rows = run_blocking(move || Ok(state.db.top_listings(limit)?)).await?;
    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}
