use serde::{Deserialize, Serialize};

/// Lifecycle of a listing. A listing starts `Available` and moves to `Sold`
/// exactly once, at settlement; it never transitions backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<ListingStatus> {
        match s {
            "available" => Some(ListingStatus::Available),
            "sold" => Some(ListingStatus::Sold),
            _ => None,
        }
    }
}

/// A card is created together with its listing in the sell flow —
/// one card per listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub name: String,
    pub hp: i32,
    pub rarity: String,
    pub card_type: String,
    pub image_url: String,
    pub description: String,
}
