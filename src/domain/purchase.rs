use {
    super::error::EngineError,
    super::metadata::Metadata,
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Paid,
    Failed,
    Expired,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }

    /// pending -> {paid, failed, expired}; paid -> refunded; the rest are
    /// terminal. Reopening a failed purchase means creating a new one.
    pub fn can_transition_to(&self, next: &PurchaseStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseStatus::Pending, PurchaseStatus::Paid)
                | (PurchaseStatus::Pending, PurchaseStatus::Failed)
                | (PurchaseStatus::Pending, PurchaseStatus::Expired)
                | (PurchaseStatus::Paid, PurchaseStatus::Refunded)
        )
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PurchaseStatus {
    type Error = EngineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            other => Err(EngineError::Validation(format!(
                "unknown purchase status: {other}"
            ))),
        }
    }
}

/// One buyer's intent to acquire one content item. Price is snapshotted from
/// the catalog at creation time and never re-read.
#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub id: Uuid,
    pub content_id: Uuid,
    pub buyer_id: Option<String>,
    pub money: Money,
    pub status: PurchaseStatus,
    pub correlation_id: Option<String>,
    pub metadata: Metadata,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub id: Uuid,
    pub content_id: Uuid,
    pub buyer_id: Option<String>,
    pub money: Money,
    pub metadata: Metadata,
}

impl NewPurchase {
    pub fn new(
        content_id: Uuid,
        buyer_id: Option<String>,
        money: Money,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            content_id,
            buyer_id,
            money,
            metadata,
        }
    }
}
