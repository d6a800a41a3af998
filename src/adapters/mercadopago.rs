use {
    crate::domain::{
        error::EngineError,
        id::CorrelationId,
        payment::Provider,
        provider::{Notification, ProviderChannel, ProviderClient},
        store::BoxFuture,
    },
    hmac::{Hmac, Mac},
    sha2::Sha256,
    std::{collections::HashMap, time::Duration},
};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.mercadopago.com";

/// Mercado Pago webhook strategy. The notification only names the payment;
/// current status is fetched through [`MercadoPagoClient`].
///
/// Signature scheme: `x-signature: ts=<unix>,v1=<hex>` where `v1` is
/// HMAC-SHA256 over the manifest `id:<payment_id>;request-id:<request_id>;ts:<ts>;`.
pub struct MercadoPagoChannel {
    webhook_secret: Option<String>,
}

impl MercadoPagoChannel {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self { webhook_secret }
    }
}

impl ProviderChannel for MercadoPagoChannel {
    fn provider(&self) -> Provider {
        Provider::MercadoPago
    }

    fn verify(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> bool {
        // No secret, no trust. Verification is never skipped for a channel
        // that moves money.
        let Some(secret) = self.webhook_secret.as_deref() else {
            tracing::warn!("Mercado Pago webhook secret not configured, rejecting");
            return false;
        };

        let Some(signature) = headers.get("x-signature") else {
            tracing::warn!("missing x-signature header");
            return false;
        };
        let Some((ts, v1)) = split_signature(signature) else {
            tracing::warn!("malformed x-signature header");
            return false;
        };
        let Some(request_id) = headers.get("x-request-id") else {
            tracing::warn!("missing x-request-id header");
            return false;
        };
        let Some(payment_id) = extract_payment_id(raw_body) else {
            tracing::warn!("webhook payload carries no payment id");
            return false;
        };

        let manifest = format!("id:{payment_id};request-id:{request_id};ts:{ts};");
        let Ok(provided) = hex::decode(v1) else {
            tracing::warn!("x-signature v1 is not hex");
            return false;
        };

        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(manifest.as_bytes());
        // verify_slice is constant-time.
        mac.verify_slice(&provided).is_ok()
    }

    fn parse(&self, raw_body: &[u8]) -> Result<Notification, EngineError> {
        let body: serde_json::Value = serde_json::from_slice(raw_body)?;
        let kind = body.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let action = body.get("action").and_then(|v| v.as_str()).unwrap_or("");

        if kind != "payment" && !action.starts_with("payment.") {
            return Ok(Notification::Ignored {
                event: if action.is_empty() { kind } else { action }.to_string(),
            });
        }

        let payment_id = extract_payment_id(raw_body).ok_or_else(|| {
            EngineError::Validation("payment notification without payment id".into())
        })?;
        Ok(Notification::StatusByLookup {
            correlation_id: CorrelationId::new(payment_id)?,
        })
    }
}

fn split_signature(signature: &str) -> Option<(&str, &str)> {
    let mut ts = None;
    let mut v1 = None;
    for part in signature.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value),
            Some(("v1", value)) => v1 = Some(value),
            _ => {}
        }
    }
    Some((ts?, v1?))
}

/// `data.id` in the body; some notification shapes put it at the top level.
fn extract_payment_id(raw_body: &[u8]) -> Option<String> {
    let body: serde_json::Value = serde_json::from_slice(raw_body).ok()?;
    let id = body
        .pointer("/data/id")
        .or_else(|| body.get("id"))?;
    match id {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `GET /v1/payments/{id}` — the authoritative status for a notification.
pub struct MercadoPagoClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl MercadoPagoClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            access_token: access_token.into(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ProviderClient for MercadoPagoClient {
    fn fetch_status(
        &self,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<String, EngineError>> {
        let url = format!("{}/v1/payments/{}", self.base_url, correlation_id.as_str());
        Box::pin(async move {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await
                .map_err(|e| EngineError::Provider(format!("Mercado Pago API: {e}")))?;

            if !response.status().is_success() {
                return Err(EngineError::Provider(format!(
                    "Mercado Pago API returned {}",
                    response.status()
                )));
            }

            let payment: serde_json::Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("Mercado Pago API body: {e}")))?;
            payment
                .get("status")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| EngineError::Provider("payment response without status".into()))
        })
    }
}
