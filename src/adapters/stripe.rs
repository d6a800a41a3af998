use {
    crate::domain::{
        error::EngineError,
        id::CorrelationId,
        payment::Provider,
        provider::{Notification, ProviderChannel, ProviderClient},
        store::BoxFuture,
    },
    std::collections::HashMap,
};

/// Card-gateway webhook strategy. Authentication delegates to the Stripe
/// library's signed-event construction; any failure there is simply `false`.
pub struct StripeChannel {
    webhook_secret: String,
}

impl StripeChannel {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
        }
    }
}

impl ProviderChannel for StripeChannel {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    fn verify(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> bool {
        let Some(signature) = headers.get("stripe-signature") else {
            tracing::warn!("missing Stripe-Signature header");
            return false;
        };
        let Ok(body) = std::str::from_utf8(raw_body) else {
            tracing::warn!("Stripe webhook body is not UTF-8");
            return false;
        };
        match stripe::Webhook::construct_event(body, signature, &self.webhook_secret) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Stripe signature verification failed");
                false
            }
        }
    }

    fn parse(&self, raw_body: &[u8]) -> Result<Notification, EngineError> {
        let event: serde_json::Value = serde_json::from_slice(raw_body)?;
        let event_type = event
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let object = event
            .pointer("/data/object")
            .ok_or_else(|| EngineError::Validation("Stripe event without data.object".into()))?;

        match event_type.as_str() {
            "payment_intent.succeeded"
            | "payment_intent.payment_failed"
            | "payment_intent.canceled"
            | "payment_intent.processing" => {
                let correlation_id = CorrelationId::new(require_str(object, "id")?)?;
                let native_status = require_str(object, "status")?.to_string();
                Ok(Notification::Status {
                    correlation_id,
                    native_status,
                })
            }
            // The refund object points back at the PaymentIntent that took
            // the money — that is our join key, not the charge id.
            "charge.refunded" => {
                let pi = object
                    .get("payment_intent")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        EngineError::Validation("charge.refunded without payment_intent".into())
                    })?;
                Ok(Notification::Status {
                    correlation_id: CorrelationId::new(pi)?,
                    native_status: "refunded".to_string(),
                })
            }
            other => Ok(Notification::Ignored {
                event: other.to_string(),
            }),
        }
    }
}

fn require_str<'a>(object: &'a serde_json::Value, field: &str) -> Result<&'a str, EngineError> {
    object
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::Validation(format!("Stripe object missing {field}")))
}

/// Status lookup through the Stripe API, for the polling fallback.
pub struct StripeClient {
    client: stripe::Client,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }
}

impl ProviderClient for StripeClient {
    fn fetch_status(
        &self,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<String, EngineError>> {
        let id = correlation_id.clone();
        Box::pin(async move {
            let pi_id = id
                .as_str()
                .parse::<stripe::PaymentIntentId>()
                .map_err(|e| EngineError::Provider(format!("invalid PaymentIntent id: {e}")))?;
            let pi = stripe::PaymentIntent::retrieve(&self.client, &pi_id, &[])
                .await
                .map_err(|e| EngineError::Provider(format!("Stripe API: {e}")))?;
            Ok(pi.status.as_str().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn verify_rejects_missing_header() {
        let channel = StripeChannel::new("whsec_test");
        assert!(!channel.verify(b"{}", &headers(&[])));
    }

    #[test]
    fn verify_rejects_garbage_signature() {
        let channel = StripeChannel::new("whsec_test");
        let hdrs = headers(&[("stripe-signature", "t=1,v1=deadbeef")]);
        assert!(!channel.verify(b"{\"id\":\"evt_1\"}", &hdrs));
    }

    #[test]
    fn parse_payment_intent_carries_inline_status() {
        let channel = StripeChannel::new("whsec_test");
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_123", "status": "succeeded"}}
        });
        let parsed = channel.parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            parsed,
            Notification::Status {
                correlation_id: CorrelationId::new("pi_123").unwrap(),
                native_status: "succeeded".into(),
            }
        );
    }

    #[test]
    fn parse_refund_joins_on_payment_intent() {
        let channel = StripeChannel::new("whsec_test");
        let body = serde_json::json!({
            "type": "charge.refunded",
            "data": {"object": {"id": "ch_9", "payment_intent": "pi_123"}}
        });
        let parsed = channel.parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            parsed,
            Notification::Status {
                correlation_id: CorrelationId::new("pi_123").unwrap(),
                native_status: "refunded".into(),
            }
        );
    }

    #[test]
    fn parse_unknown_event_is_ignored() {
        let channel = StripeChannel::new("whsec_test");
        let body = serde_json::json!({
            "type": "customer.created",
            "data": {"object": {"id": "cus_1"}}
        });
        assert_eq!(
            channel.parse(body.to_string().as_bytes()).unwrap(),
            Notification::Ignored {
                event: "customer.created".into()
            }
        );
    }
}
