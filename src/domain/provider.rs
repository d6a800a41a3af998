use {
    super::error::EngineError,
    super::id::CorrelationId,
    super::payment::Provider,
    super::store::BoxFuture,
    std::collections::HashMap,
};

/// What a provider webhook boils down to once its envelope is peeled off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Payment notification with the native status carried inline.
    Status {
        correlation_id: CorrelationId,
        native_status: String,
    },
    /// Payment notification that only names the payment — the current
    /// status must be fetched from the provider API.
    StatusByLookup { correlation_id: CorrelationId },
    /// Acknowledged but irrelevant to payment state (charge created,
    /// unsupported event types).
    Ignored { event: String },
}

/// Per-provider strategy: how to authenticate a webhook and reduce its
/// payload to a [`Notification`]. One reconciliation core, three of these.
pub trait ProviderChannel: Send + Sync {
    fn provider(&self) -> Provider;

    /// Authenticate the raw body against the provider's signature scheme.
    /// Never errors — any verification failure is `false`. Header names are
    /// lowercased by the HTTP boundary.
    fn verify(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> bool;

    /// Peel the provider envelope. `Err` means a malformed payload, which
    /// the caller logs and drops without touching any record.
    fn parse(&self, raw_body: &[u8]) -> Result<Notification, EngineError>;
}

/// Status lookup against the provider's API — used when the webhook does not
/// carry status inline, and by the polling fallback for lost notifications.
pub trait ProviderClient: Send + Sync {
    fn fetch_status(
        &self,
        correlation_id: &CorrelationId,
    ) -> BoxFuture<'_, Result<String, EngineError>>;
}
