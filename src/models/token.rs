use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single authorization to download the product once.
///
/// Immutable after mint except for the `used`/`used_at` transition, which
/// only ever goes false → true. Records carry their own `expires_at` in
/// addition to the store-level TTL, so stale credentials are rejected even
/// if the backend keeps them around longer than asked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub payment_id: String,
    pub product_id: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Secondary index entry mapping a payment id to its token, so repeated
/// confirmations of the same payment find the existing credential without
/// scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIndex {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            token: "t-1".to_string(),
            payment_id: "pay-1".to_string(),
            product_id: "prod-1".to_string(),
            used: false,
            created_at: Utc::now() - Duration::hours(1),
            expires_at,
            used_at: None,
        }
    }

    #[test]
    fn past_expiry_is_expired() {
        assert!(record(Utc::now() - Duration::seconds(1)).is_expired());
    }

    #[test]
    fn future_expiry_is_not_expired() {
        assert!(!record(Utc::now() + Duration::hours(47)).is_expired());
    }

    #[test]
    fn used_at_is_omitted_until_redemption() {
        let json = sonic_rs::to_string(&record(Utc::now())).unwrap();
        assert!(!json.contains("used_at"));
    }
}
