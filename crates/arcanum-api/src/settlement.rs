use chrono::{DateTime, Utc};
use tracing::info;

use arcanum_db::Database;
use arcanum_db::models::{SettleOutcome, TradeDetailRow};

use crate::error::ApiError;

/// Settlement: convert an available listing into a trade, exactly once.
///
/// The store runs the whole read-check-write sequence in one transaction
/// with a conditional status flip, so concurrent buyers of the same listing
/// produce one trade and N-1 conflicts. This function only maps outcomes
/// onto the error taxonomy.
pub fn settle(
    db: &Database,
    buyer_id: &str,
    listing_id: i64,
    now: DateTime<Utc>,
) -> Result<TradeDetailRow, ApiError> {
    match db.settle_listing(buyer_id, listing_id, now)? {
        SettleOutcome::Settled(trade) => {
            info!(
                "listing {} settled as trade {} for {}",
                listing_id, trade.id, trade.amount
            );
            Ok(trade)
        }
        SettleOutcome::ListingNotFound => Err(ApiError::NotFound),
        SettleOutcome::NotAvailable => Err(ApiError::Conflict("listing not available")),
        SettleOutcome::SelfPurchase => Err(ApiError::InvalidOperation("cannot buy your own listing")),
        SettleOutcome::UnknownBuyer => Err(ApiError::Unauthenticated),
        SettleOutcome::MissingSeller => Err(ApiError::DataIntegrity(format!(
            "listing {} references a seller that does not exist",
            listing_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcanum_db::models::NewListing;
    use std::sync::{Arc, Barrier};
    use uuid::Uuid;

    fn seed_user(db: &Database, email: &str, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, email, username, "$argon2id$test-hash").unwrap();
        id
    }

    fn seed_listing(db: &Database, seller_id: &str, price: &str) -> i64 {
        db.create_listing(
            seller_id,
            &NewListing {
                card_name: "Pikachu",
                hp: 60,
                rarity: "Common",
                card_type: "Electric",
                image_url: "",
                description: "",
                price,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn settles_and_snapshots_price() {
        let db = Database::open_in_memory().unwrap();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let listing_id = seed_listing(&db, &seller, "10.0000");

        let trade = settle(&db, &buyer, listing_id, Utc::now()).unwrap();
        assert_eq!(trade.amount, "10.0000");
        assert_eq!(trade.seller_id, seller);
        assert_eq!(trade.buyer_id, buyer);

        // A later buyer conflicts
        let late = seed_user(&db, "brock@example.com", "brock");
        assert!(matches!(
            settle(&db, &late, listing_id, Utc::now()),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn self_purchase_is_invalid_regardless_of_status() {
        let db = Database::open_in_memory().unwrap();
        let seller = seed_user(&db, "ash@example.com", "ash");
        let buyer = seed_user(&db, "misty@example.com", "misty");
        let listing_id = seed_listing(&db, &seller, "10.0000");

        assert!(matches!(
            settle(&db, &seller, listing_id, Utc::now()),
            Err(ApiError::InvalidOperation(_))
        ));

        settle(&db, &buyer, listing_id, Utc::now()).unwrap();

        // Still InvalidOperation once sold, not Conflict — the self-purchase
        // check fires first.
        assert!(matches!(
            settle(&db, &seller, listing_id, Utc::now()),
            Err(ApiError::InvalidOperation(_))
        ));
    }

    #[test]
    fn missing_listing_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let buyer = seed_user(&db, "misty@example.com", "misty");

        assert!(matches!(
            settle(&db, &buyer, 12345, Utc::now()),
            Err(ApiError::NotFound)
        ));
    }

    #[test]
    fn concurrent_buyers_produce_exactly_one_trade() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let seller = seed_user(&db, "seller@example.com", "seller");
        let listing_id = seed_listing(&db, &seller, "42.0000");

        let buyers: Vec<String> = (0..8)
            .map(|i| seed_user(&db, &format!("buyer{i}@example.com"), &format!("buyer{i}")))
            .collect();

        let barrier = Arc::new(Barrier::new(buyers.len()));
        let handles: Vec<_> = buyers
            .into_iter()
            .map(|buyer| {
                let db = Arc::clone(&db);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    settle(&db, &buyer, listing_id, Utc::now())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        for result in &results {
            match result {
                Ok(trade) => assert_eq!(trade.listing_id, listing_id),
                Err(e) => assert!(matches!(e, ApiError::Conflict(_))),
            }
        }

        let listing = db.get_listing(listing_id).unwrap().unwrap();
        assert_eq!(listing.status, "sold");
        assert_eq!(db.recent_trades(10).unwrap().len(), 1);
    }
}
