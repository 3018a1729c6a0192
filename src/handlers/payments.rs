use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    response::IntoResponse,
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    services::payment::Confirmation,
    state::AppState,
    validation::payment::CreatePreferenceRequest,
};

#[derive(Serialize)]
pub struct CreatePreferenceResponse {
    pub init_point: String,
}

pub async fn create_preference(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let req: CreatePreferenceRequest = sonic_rs::from_slice(&body).map_err(|_| {
        AppError::Validation(
            "Body inválido. Esperado { product: {id,title,price}, buyer_email? }".to_string(),
        )
    })?;
    req.validate()
        .map_err(|report| AppError::Validation(report.to_string()))?;

    let init_point = state.payments.create_preference(&req).await?;
    Ok(Json(CreatePreferenceResponse { init_point }))
}

/// Acknowledgement returned to the processor's notification delivery.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl WebhookResponse {
    fn note(note: &str) -> Self {
        Self {
            ok: true,
            approved: None,
            status: None,
            token: None,
            duplicated: None,
            note: Some(note.to_string()),
        }
    }

    fn approved(token: String, duplicated: bool) -> Self {
        Self {
            ok: true,
            approved: Some(true),
            status: None,
            token: Some(token),
            duplicated: duplicated.then_some(true),
            note: None,
        }
    }

    fn not_approved(status: String) -> Self {
        Self {
            ok: true,
            approved: Some(false),
            status: Some(status),
            token: None,
            duplicated: None,
            note: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct WebhookData {
    id: Option<RawId>,
}

#[derive(Deserialize)]
struct WebhookPayload {
    data: Option<WebhookData>,
    id: Option<RawId>,
    resource: Option<String>,
}

/// The processor puts the payment id in the query, in the body, or behind
/// a resource URL, depending on the notification flavor.
fn extract_payment_id(query: &HashMap<String, String>, body: &[u8]) -> Option<String> {
    if let Some(id) = query.get("data.id").or_else(|| query.get("id")) {
        if !id.is_empty() {
            return Some(id.clone());
        }
    }

    let payload: WebhookPayload = sonic_rs::from_slice(body).ok()?;

    if let Some(id) = payload.data.and_then(|d| d.id) {
        return Some(id.into_string());
    }
    if let Some(id) = payload.id {
        return Some(id.into_string());
    }
    payload
        .resource
        .as_deref()
        .and_then(|r| r.rsplit('/').next())
        .filter(|tail| !tail.is_empty())
        .map(str::to_string)
}

/// Server-to-server notification endpoint. Always acknowledges with 200 so
/// the processor does not retry forever; the payment status is re-read
/// from the processor rather than trusted from the event.
pub async fn webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let Some(payment_id) = extract_payment_id(&params, &body) else {
        tracing::warn!("🔔 Webhook received without a payment id");
        return Ok(Json(WebhookResponse::note("Webhook recebido sem payment id")));
    };

    let response = match state.payments.confirm_and_tokenize(&payment_id).await? {
        Confirmation::Approved { record, duplicated } => {
            WebhookResponse::approved(record.token, duplicated)
        }
        Confirmation::NotApproved { status } => WebhookResponse::not_approved(status),
        Confirmation::Unverified => WebhookResponse::note("Falha ao confirmar pagamento"),
    };

    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct CheckQuery {
    pub payment_id: Option<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<bool>,
}

/// Status poll used by the storefront after the buyer returns from
/// checkout.
pub async fn check(
    State(state): State<AppState>,
    Query(q): Query<CheckQuery>,
) -> Result<impl IntoResponse> {
    let payment_id = q
        .payment_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("payment_id é obrigatório".to_string()))?;

    let response = match state.ledger.find_by_payment(&payment_id).await? {
        None => CheckResponse {
            approved: false,
            expired: None,
            token: None,
            expires_at: None,
            used: None,
        },
        Some(record) if record.is_expired() => CheckResponse {
            approved: false,
            expired: Some(true),
            token: None,
            expires_at: None,
            used: None,
        },
        Some(record) => CheckResponse {
            approved: true,
            expired: None,
            token: Some(record.token),
            expires_at: Some(record.expires_at),
            used: Some(record.used),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn prefers_the_data_id_query_param() {
        let q = query(&[("data.id", "123"), ("id", "456")]);
        assert_eq!(extract_payment_id(&q, b"").as_deref(), Some("123"));
    }

    #[test]
    fn falls_back_to_the_plain_id_query_param() {
        let q = query(&[("id", "456")]);
        assert_eq!(extract_payment_id(&q, b"").as_deref(), Some("456"));
    }

    #[test]
    fn reads_a_numeric_id_from_the_body() {
        let q = HashMap::new();
        let body = br#"{"type":"payment","data":{"id":987654}}"#;
        assert_eq!(extract_payment_id(&q, body).as_deref(), Some("987654"));
    }

    #[test]
    fn reads_a_string_id_from_the_body() {
        let q = HashMap::new();
        let body = br#"{"id":"pay_42"}"#;
        assert_eq!(extract_payment_id(&q, body).as_deref(), Some("pay_42"));
    }

    #[test]
    fn reads_the_tail_of_a_resource_url() {
        let q = HashMap::new();
        let body = br#"{"resource":"https://api.mercadopago.com/v1/payments/777"}"#;
        assert_eq!(extract_payment_id(&q, body).as_deref(), Some("777"));
    }

    #[test]
    fn gives_up_without_an_id() {
        let q = HashMap::new();
        assert!(extract_payment_id(&q, b"").is_none());
        assert!(extract_payment_id(&q, b"not json").is_none());
        assert!(extract_payment_id(&q, br#"{"type":"payment"}"#).is_none());
    }
}
