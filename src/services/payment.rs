use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::token::TokenRecord;
use crate::repositories::token::TokenLedger;
use crate::validation::payment::CreatePreferenceRequest;

/// Fallback when the processor response carries no product metadata; the
/// store sells a single product.
const DEFAULT_PRODUCT_ID: &str = "produto-01";

#[derive(Debug, Serialize)]
struct PreferenceItem {
    id: String,
    title: String,
    quantity: u32,
    currency_id: String,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    pending: String,
    failure: String,
}

#[derive(Debug, Serialize)]
struct PreferenceMetadata {
    product_id: String,
    buyer_email: String,
}

#[derive(Debug, Serialize)]
struct PreferencePayload {
    items: Vec<PreferenceItem>,
    back_urls: BackUrls,
    notification_url: String,
    auto_return: String,
    metadata: PreferenceMetadata,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    init_point: Option<String>,
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMetadata {
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdditionalItem {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default)]
    pub items: Vec<AdditionalItem>,
}

/// Authoritative payment status as reported by the processor's REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInfo {
    pub status: Option<String>,
    pub metadata: Option<PaymentMetadata>,
    pub additional_info: Option<AdditionalInfo>,
}

impl PaymentInfo {
    /// Product recovered from the processor's metadata, falling back to
    /// the single product this store sells.
    pub fn product_id(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.product_id.clone())
            .or_else(|| {
                self.additional_info
                    .as_ref()
                    .and_then(|info| info.items.first())
                    .and_then(|item| item.id.clone())
            })
            .unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string())
    }
}

/// REST client for the payment processor: creates checkout preferences and
/// re-reads the authoritative status of a payment.
#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
    frontend_base: String,
    callback_base: String,
}

impl PaymentGateway {
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        Self {
            http,
            api_base: cfg.mp_api_base.trim_end_matches('/').to_string(),
            access_token: cfg.mp_access_token.clone(),
            frontend_base: cfg.frontend_base_url.trim_end_matches('/').to_string(),
            callback_base: cfg.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds a checkout preference at the processor and returns the
    /// redirect URL the buyer should be sent to.
    pub async fn create_preference(&self, req: &CreatePreferenceRequest) -> Result<String> {
        let payload = PreferencePayload {
            items: vec![PreferenceItem {
                id: req.product.id.clone(),
                title: req.product.title.clone(),
                quantity: 1,
                currency_id: "BRL".to_string(),
                unit_price: req.product.price,
            }],
            back_urls: BackUrls {
                success: format!("{}/pages/success.html", self.frontend_base),
                pending: format!("{}/pages/pending.html", self.frontend_base),
                failure: format!("{}/pages/failure.html", self.frontend_base),
            },
            notification_url: format!("{}/api/webhook", self.callback_base),
            auto_return: "approved".to_string(),
            metadata: PreferenceMetadata {
                product_id: req.product.id.clone(),
                buyer_email: req.buyer_email.clone().unwrap_or_default(),
            },
        };

        let resp = self
            .http
            .post(format!("{}/checkout/preferences", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("create preference request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("create preference body read failed: {}", e)))?;

        if !status.is_success() {
            tracing::error!("💳 Create preference rejected ({}): {}", status, body);
            return Err(AppError::Upstream(format!(
                "Falha ao criar preferência: {}",
                body
            )));
        }

        let data: PreferenceResponse = sonic_rs::from_str(&body)
            .map_err(|e| AppError::Upstream(format!("unparseable preference response: {}", e)))?;

        data.init_point
            .or(data.sandbox_init_point)
            .ok_or_else(|| AppError::Upstream("preference response missing init_point".to_string()))
    }

    /// Fetches the payment from the processor, the only source trusted for
    /// its status.
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentInfo> {
        let resp = self
            .http
            .get(format!("{}/v1/payments/{}", self.api_base, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("payment lookup request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("payment lookup body read failed: {}", e)))?;

        if !status.is_success() {
            tracing::error!("💳 Payment {} lookup rejected ({}): {}", payment_id, status, body);
            return Err(AppError::Upstream(format!(
                "payment lookup returned {}",
                status
            )));
        }

        sonic_rs::from_str(&body)
            .map_err(|e| AppError::Upstream(format!("unparseable payment response: {}", e)))
    }
}

/// Outcome of confirming one processor event.
#[derive(Debug)]
pub enum Confirmation {
    /// Payment approved; a download token exists, freshly minted or
    /// recovered from an earlier delivery of the same event.
    Approved {
        record: TokenRecord,
        duplicated: bool,
    },
    /// The processor reports a non-approved status; nothing was minted.
    NotApproved { status: String },
    /// The processor could not be consulted; nothing was minted and the
    /// sender may retry.
    Unverified,
}

/// Drives the payment-confirmation state machine: re-verify against the
/// processor, then mint (or re-use) the download credential.
#[derive(Clone)]
pub struct PaymentService {
    gateway: PaymentGateway,
    ledger: TokenLedger,
}

impl PaymentService {
    pub fn new(gateway: PaymentGateway, ledger: TokenLedger) -> Self {
        Self { gateway, ledger }
    }

    pub async fn create_preference(&self, req: &CreatePreferenceRequest) -> Result<String> {
        self.gateway.create_preference(req).await
    }

    /// Confirms `payment_id` against the processor and mints a download
    /// token when it is approved. Processors deliver events at least once;
    /// a repeated delivery finds the existing token through the payment
    /// index instead of minting a second one.
    pub async fn confirm_and_tokenize(&self, payment_id: &str) -> Result<Confirmation> {
        let payment = match self.gateway.fetch_payment(payment_id).await {
            Ok(payment) => payment,
            Err(e) => {
                tracing::error!("💳 Could not confirm payment {}: {}", payment_id, e);
                return Ok(Confirmation::Unverified);
            }
        };

        let status = payment
            .status
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        if status != "approved" {
            return Ok(Confirmation::NotApproved { status });
        }

        if let Some(existing) = self.ledger.find_by_payment(payment_id).await? {
            tracing::info!("💳 Payment {} already tokenized", payment_id);
            return Ok(Confirmation::Approved {
                record: existing,
                duplicated: true,
            });
        }

        let record = self.ledger.mint(payment_id, &payment.product_id()).await?;
        Ok(Confirmation::Approved {
            record,
            duplicated: false,
        })
    }
}
