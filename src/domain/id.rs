use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Provider-assigned identifier joining an inbound notification to a local
/// Payment row. Stripe PaymentIntents (`pi_xxx`), Mercado Pago numeric ids,
/// Woovi correlation UUIDs — no shared shape, so validation is bounds only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        if id.is_empty() || id.len() > 128 {
            return Err(EngineError::Validation(format!(
                "correlation id must be 1..=128 chars, got {} chars",
                id.len()
            )));
        }
        if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(EngineError::Validation(
                "correlation id must not contain whitespace or control characters".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
