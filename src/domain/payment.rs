use {
    super::error::EngineError,
    super::id::CorrelationId,
    super::metadata::Metadata,
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

/// The three payment providers the store accepts money through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    MercadoPago,
    Woovi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::MercadoPago => "mercadopago",
            Self::Woovi => "woovi",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Provider {
    type Error = EngineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "mercadopago" => Ok(Self::MercadoPago),
            "woovi" => Ok(Self::Woovi),
            other => Err(EngineError::Validation(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Expired,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }

    /// Lifecycle rank — higher means further along. Used to prevent
    /// out-of-order notifications from regressing status.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Completed | Self::Failed | Self::Expired => 1,
            Self::Refunded => 2,
        }
    }

    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Pending, PaymentStatus::Expired)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = EngineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            other => Err(EngineError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// One attempt, by one provider, to collect money for a Purchase.
/// `(provider, correlation_id)` is unique — the webhook join key.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub provider: Provider,
    pub correlation_id: CorrelationId,
    pub status: PaymentStatus,
    pub native_status: String,
    pub money: Money,
    pub failure_reason: Option<String>,
    pub refund: Option<RefundInfo>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInfo {
    pub refund_id: String,
    pub amount: i64,
    pub reason: Option<String>,
}

/// For INSERT — id generated in Rust via Uuid::now_v7().
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub provider: Provider,
    pub correlation_id: CorrelationId,
    pub money: Money,
    pub metadata: Metadata,
}

impl NewPayment {
    pub fn new(
        purchase_id: Uuid,
        provider: Provider,
        correlation_id: CorrelationId,
        money: Money,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            purchase_id,
            provider,
            correlation_id,
            money,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_is_terminal_except_refund() {
        let c = PaymentStatus::Completed;
        assert!(c.can_transition_to(&PaymentStatus::Refunded));
        assert!(!c.can_transition_to(&PaymentStatus::Pending));
        assert!(!c.can_transition_to(&PaymentStatus::Failed));
        assert!(!c.can_transition_to(&PaymentStatus::Expired));
    }

    #[test]
    fn failed_and_expired_are_terminal() {
        for terminal in [PaymentStatus::Failed, PaymentStatus::Expired] {
            for next in [
                PaymentStatus::Pending,
                PaymentStatus::Completed,
                PaymentStatus::Failed,
                PaymentStatus::Expired,
                PaymentStatus::Refunded,
            ] {
                assert!(!terminal.can_transition_to(&next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn rank_never_regresses_along_valid_transitions() {
        let all = [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Expired,
            PaymentStatus::Refunded,
        ];
        for from in all {
            for to in all {
                if from.can_transition_to(&to) {
                    assert!(from.rank() < to.rank(), "{from} -> {to}");
                }
            }
        }
    }
}
