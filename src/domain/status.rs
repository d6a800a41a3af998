use {
    super::payment::{PaymentStatus, Provider},
    super::purchase::PurchaseStatus,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Provider-agnostic status every native vocabulary is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Pending,
    Paid,
    Failed,
    Expired,
    Refunded,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Self::Pending => PaymentStatus::Pending,
            Self::Paid => PaymentStatus::Completed,
            Self::Failed => PaymentStatus::Failed,
            Self::Expired => PaymentStatus::Expired,
            Self::Refunded => PaymentStatus::Refunded,
        }
    }

    pub fn purchase_status(&self) -> PurchaseStatus {
        match self {
            Self::Pending => PurchaseStatus::Pending,
            Self::Paid => PurchaseStatus::Paid,
            Self::Failed => PurchaseStatus::Failed,
            Self::Expired => PurchaseStatus::Expired,
            Self::Refunded => PurchaseStatus::Refunded,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fold a provider's native status into the canonical enum.
///
/// An unseen native status maps to Pending, never to a terminal state —
/// a new provider vocabulary word must not complete or kill a purchase.
pub fn normalize(provider: Provider, native: &str) -> CanonicalStatus {
    let canonical = match provider {
        Provider::Stripe => match native {
            "succeeded" => Some(CanonicalStatus::Paid),
            "processing" | "requires_action" | "requires_capture" | "requires_confirmation" => {
                Some(CanonicalStatus::Pending)
            }
            // By the time a webhook reports this, the attempt was abandoned.
            "requires_payment_method" => Some(CanonicalStatus::Failed),
            "canceled" => Some(CanonicalStatus::Failed),
            "refunded" | "charged_back" => Some(CanonicalStatus::Refunded),
            _ => None,
        },
        Provider::MercadoPago => match native {
            "approved" => Some(CanonicalStatus::Paid),
            "pending" | "in_process" | "authorized" => Some(CanonicalStatus::Pending),
            "cancelled" | "rejected" => Some(CanonicalStatus::Failed),
            "refunded" | "charged_back" => Some(CanonicalStatus::Refunded),
            _ => None,
        },
        Provider::Woovi => match native {
            "COMPLETED" => Some(CanonicalStatus::Paid),
            "ACTIVE" => Some(CanonicalStatus::Pending),
            "EXPIRED" => Some(CanonicalStatus::Expired),
            "REFUNDED" => Some(CanonicalStatus::Refunded),
            _ => None,
        },
    };

    canonical.unwrap_or_else(|| {
        tracing::warn!(%provider, native, "unknown native status, treating as pending");
        CanonicalStatus::Pending
    })
}
