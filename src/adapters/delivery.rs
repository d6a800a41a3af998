use {
    crate::domain::{error::EngineError, store::{BoxFuture, DeliveryGateway}},
    std::time::Duration,
    uuid::Uuid,
};

/// Delivery over HTTP to the bot service that actually talks to the buyer.
/// The engine only knows "deliver purchase X"; everything channel-specific
/// lives on the other side of this call.
pub struct HttpDeliveryGateway {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpDeliveryGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }
}

impl DeliveryGateway for HttpDeliveryGateway {
    fn deliver(&self, purchase_id: Uuid) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            let response = self
                .http
                .post(&self.endpoint)
                .json(&serde_json::json!({ "purchase_id": purchase_id }))
                .send()
                .await
                .map_err(|e| EngineError::Delivery(format!("delivery request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(EngineError::Delivery(format!(
                    "delivery endpoint returned {}",
                    response.status()
                )));
            }
            Ok(())
        })
    }
}
