use {
    crate::domain::{
        error::EngineError,
        id::CorrelationId,
        payment::Provider,
        provider::{Notification, ProviderChannel, ProviderClient},
        store::BoxFuture,
    },
    base64::{Engine as _, engine::general_purpose::STANDARD},
    hmac::{Hmac, Mac},
    sha2::Sha256,
    std::{collections::HashMap, time::Duration},
};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.openpix.com.br";
const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Woovi (OpenPix) webhook strategy. The payload carries the charge status
/// inline; the signature is base64(HMAC-SHA256(secret, raw_body)).
pub struct WooviChannel {
    webhook_secret: Option<String>,
    /// Accept unsigned webhooks when no secret is configured. Only honored
    /// outside production — production always fails closed.
    allow_unverified: bool,
}

impl WooviChannel {
    pub fn new(webhook_secret: Option<String>, allow_unverified: bool) -> Self {
        Self {
            webhook_secret,
            allow_unverified,
        }
    }
}

impl ProviderChannel for WooviChannel {
    fn provider(&self) -> Provider {
        Provider::Woovi
    }

    fn verify(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> bool {
        let Some(secret) = self.webhook_secret.as_deref() else {
            if self.allow_unverified {
                tracing::warn!("Woovi webhook secret not configured, accepting unverified");
                return true;
            }
            tracing::warn!("Woovi webhook secret not configured, rejecting");
            return false;
        };

        let Some(signature) = headers.get(SIGNATURE_HEADER) else {
            tracing::warn!("missing {SIGNATURE_HEADER} header");
            return false;
        };
        let Ok(provided) = STANDARD.decode(signature) else {
            tracing::warn!("{SIGNATURE_HEADER} is not base64");
            return false;
        };

        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(raw_body);
        // verify_slice is constant-time.
        mac.verify_slice(&provided).is_ok()
    }

    fn parse(&self, raw_body: &[u8]) -> Result<Notification, EngineError> {
        let body: serde_json::Value = serde_json::from_slice(raw_body)?;
        let event = body
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let correlation = || -> Result<CorrelationId, EngineError> {
            let id = body
                .pointer("/charge/correlationID")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    EngineError::Validation(format!("{event} without charge.correlationID"))
                })?;
            CorrelationId::new(id)
        };

        match event.as_str() {
            "OPENPIX:CHARGE_COMPLETED" | "OPENPIX:TRANSACTION_RECEIVED" => {
                let native_status = body
                    .pointer("/charge/status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("COMPLETED")
                    .to_string();
                Ok(Notification::Status {
                    correlation_id: correlation()?,
                    native_status,
                })
            }
            "OPENPIX:CHARGE_EXPIRED" => Ok(Notification::Status {
                correlation_id: correlation()?,
                native_status: "EXPIRED".to_string(),
            }),
            // Refunds arrive as a transaction event, not a charge status —
            // synthesized here so the normalizer stays a pure status table.
            "OPENPIX:TRANSACTION_REFUND_RECEIVED" => Ok(Notification::Status {
                correlation_id: correlation()?,
                native_status: "REFUNDED".to_string(),
            }),
            other => Ok(Notification::Ignored {
                event: other.to_string(),
            }),
        }
    }
}

/// `GET /api/v1/charge/{correlationID}` — used by the polling fallback.
pub struct WooviClient {
    http: reqwest::Client,
    app_id: String,
    base_url: String,
}

impl WooviClient {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            app_id: app_id.into(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ProviderClient for WooviClient {
    fn fetch_status(
        &self,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<String, EngineError>> {
        let url = format!(
            "{}/api/v1/charge/{}",
            self.base_url,
            correlation_id.as_str()
        );
        Box::pin(async move {
            let response = self
                .http
                .get(&url)
                .header("Authorization", &self.app_id)
                .send()
                .await
                .map_err(|e| EngineError::Provider(format!("Woovi API: {e}")))?;

            if !response.status().is_success() {
                return Err(EngineError::Provider(format!(
                    "Woovi API returned {}",
                    response.status()
                )));
            }

            let charge: serde_json::Value = response
                .json()
                .await
                .map_err(|e| EngineError::Provider(format!("Woovi API body: {e}")))?;
            charge
                .pointer("/charge/status")
                .or_else(|| charge.get("status"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| EngineError::Provider("charge response without status".into()))
        })
    }
}
