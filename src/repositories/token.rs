use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::token::{PaymentIndex, TokenRecord};
use crate::repositories::store::{self, RecordStore};

/// Floor for the recomputed TTL when a record is rewritten, so it cannot
/// vanish from the store between validation and persistence of the
/// redemption.
const REWRITE_TTL_FLOOR_SECS: i64 = 60;

fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

fn payment_key(payment_id: &str) -> String {
    format!("payment:{}", payment_id)
}

/// Owns the download-token lifecycle: mint, lookup, one-time redemption.
///
/// Instances share nothing in-process; all coordination state lives in the
/// record store, so concurrent requests see a single source of truth.
#[derive(Clone)]
pub struct TokenLedger {
    store: Arc<dyn RecordStore>,
    ttl_hours: i64,
}

impl TokenLedger {
    pub fn new(store: Arc<dyn RecordStore>, ttl_hours: i64) -> Self {
        Self { store, ttl_hours }
    }

    /// Generates a fresh unguessable token for an approved payment and
    /// persists the record plus the payment → token index, both under the
    /// same TTL.
    pub async fn mint(&self, payment_id: &str, product_id: &str) -> Result<TokenRecord> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();

        let record = TokenRecord {
            token: token.clone(),
            payment_id: payment_id.to_string(),
            product_id: product_id.to_string(),
            used: false,
            created_at: now,
            expires_at: now + Duration::hours(self.ttl_hours),
            used_at: None,
        };

        let ttl_seconds = (self.ttl_hours * 3600).max(0) as u64;
        store::put_json(
            self.store.as_ref(),
            &token_key(&token),
            &record,
            Some(ttl_seconds),
        )
        .await?;

        let index = PaymentIndex {
            token: token.clone(),
            expires_at: record.expires_at,
        };
        store::put_json(
            self.store.as_ref(),
            &payment_key(payment_id),
            &index,
            Some(ttl_seconds),
        )
        .await?;

        tracing::info!("🎟️ Token minted for payment {}", payment_id);
        Ok(record)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<TokenRecord>> {
        store::get_json(self.store.as_ref(), &token_key(token)).await
    }

    /// Resolves the payment index, then the record itself. An index whose
    /// record already expired out of the store counts as absent.
    pub async fn find_by_payment(&self, payment_id: &str) -> Result<Option<TokenRecord>> {
        let index: Option<PaymentIndex> =
            store::get_json(self.store.as_ref(), &payment_key(payment_id)).await?;

        match index {
            Some(index) => self.find_by_token(&index.token).await,
            None => Ok(None),
        }
    }

    /// Rewrites the record with `used = true`. The store does not preserve
    /// TTL across an overwrite, so the remaining lifetime is recomputed
    /// from `expires_at`, floored at [`REWRITE_TTL_FLOOR_SECS`].
    pub async fn redeem(&self, record: &TokenRecord) -> Result<TokenRecord> {
        let mut updated = record.clone();
        updated.used = true;
        updated.used_at = Some(Utc::now());

        let secs_left = (updated.expires_at - Utc::now()).num_seconds();
        let ttl = secs_left.max(REWRITE_TTL_FLOOR_SECS) as u64;

        store::put_json(
            self.store.as_ref(),
            &token_key(&updated.token),
            &updated,
            Some(ttl),
        )
        .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::store::MemoryStore;

    fn ledger() -> TokenLedger {
        TokenLedger::new(Arc::new(MemoryStore::new()), 48)
    }

    #[tokio::test]
    async fn mint_indexes_by_payment() {
        let ledger = ledger();
        let minted = ledger.mint("pay_1", "ebook-01").await.unwrap();

        let found = ledger.find_by_payment("pay_1").await.unwrap().unwrap();
        assert_eq!(found.token, minted.token);
        assert_eq!(found.payment_id, "pay_1");
        assert_eq!(found.product_id, "ebook-01");
        assert!(!found.used);
        assert!(found.used_at.is_none());
        assert_eq!(found.expires_at, minted.created_at + Duration::hours(48));
    }

    #[tokio::test]
    async fn lookups_miss_unknown_entries() {
        let ledger = ledger();
        assert!(ledger.find_by_token("nope").await.unwrap().is_none());
        assert!(ledger.find_by_payment("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn redeem_only_touches_usage_fields() {
        let ledger = ledger();
        let minted = ledger.mint("pay_2", "ebook-01").await.unwrap();

        let redeemed = ledger.redeem(&minted).await.unwrap();
        assert!(redeemed.used);
        assert!(redeemed.used_at.is_some());
        assert_eq!(redeemed.token, minted.token);
        assert_eq!(redeemed.payment_id, minted.payment_id);
        assert_eq!(redeemed.product_id, minted.product_id);
        assert_eq!(redeemed.created_at, minted.created_at);
        assert_eq!(redeemed.expires_at, minted.expires_at);

        let stored = ledger.find_by_token(&minted.token).await.unwrap().unwrap();
        assert!(stored.used);
        assert_eq!(stored.used_at, redeemed.used_at);
    }

    #[tokio::test]
    async fn dangling_index_reads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        let ledger = TokenLedger::new(store.clone(), 48);
        let minted = ledger.mint("pay_3", "ebook-01").await.unwrap();

        // Simulate the record expiring out of the store while the index
        // lingers.
        store
            .put_raw(&token_key(&minted.token), "gone".to_string(), Some(0))
            .await
            .unwrap();

        assert!(ledger.find_by_payment("pay_3").await.unwrap().is_none());
    }
}
