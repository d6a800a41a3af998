use {
    crate::domain::{
        error::EngineError,
        id::CorrelationId,
        metadata::Metadata,
        payment::{NewPayment, Provider},
        purchase::NewPurchase,
        store::PurchaseStore,
    },
    crate::pix::{self, PixQrPayload, emv::PixQrRequest},
    std::sync::Arc,
    uuid::Uuid,
};

/// Merchant identity stamped into every generated QR.
#[derive(Debug, Clone)]
pub struct PixMerchant {
    pub key: String,
    pub name: String,
    pub city: String,
}

#[derive(Debug, Clone)]
pub struct PixChargeRequest {
    pub content_id: Uuid,
    pub provider: Provider,
    pub buyer_id: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct PixCharge {
    pub purchase_id: Uuid,
    pub payment_id: Uuid,
    pub correlation_id: CorrelationId,
    pub amount_cents: i64,
    pub qr: PixQrPayload,
}

/// Creates the purchase/payment pair a provider notification will later
/// resolve against, and the QR the buyer pays.
pub struct CheckoutService {
    store: Arc<dyn PurchaseStore>,
    merchant: PixMerchant,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn PurchaseStore>, merchant: PixMerchant) -> Self {
        Self { store, merchant }
    }

    pub async fn create_pix_charge(
        &self,
        request: PixChargeRequest,
    ) -> Result<PixCharge, EngineError> {
        if request.provider == Provider::Stripe {
            return Err(EngineError::Validation(
                "PIX charges go through a PIX provider, not the card gateway".into(),
            ));
        }

        // Price snapshot: read once at creation, never re-read later.
        let money = self
            .store
            .content_price(request.content_id)
            .await?
            .ok_or_else(|| {
                EngineError::Validation(format!("unknown content: {}", request.content_id))
            })?;

        let purchase_id = Uuid::now_v7();
        // The reference the provider echoes back. EMV tag 05 caps it at 25
        // alphanumeric chars, so the UUID goes in stripped and truncated.
        let reference: String = purchase_id.simple().to_string().chars().take(25).collect();
        let correlation_id = CorrelationId::new(reference.clone())?;

        let qr = pix::generate(&PixQrRequest {
            pix_key: self.merchant.key.clone(),
            merchant_name: self.merchant.name.clone(),
            merchant_city: self.merchant.city.clone(),
            amount: money.amount(),
            transaction_ref: reference,
            description: request.description,
        })?;

        let mut metadata = Metadata::new();
        if let Some(chat_id) = request.telegram_chat_id {
            metadata.set_telegram_chat_id(chat_id);
        }
        metadata.set_copy_paste_code(qr.text.clone());

        let purchase = NewPurchase {
            id: purchase_id,
            content_id: request.content_id,
            buyer_id: request.buyer_id,
            money,
            metadata: metadata.clone(),
        };

        let payment = NewPayment::new(
            purchase_id,
            request.provider,
            correlation_id.clone(),
            money,
            metadata,
        );
        let payment_id = payment.id;

        // Purchase first: the payment row carries the foreign key. A webhook
        // racing this sequence is absorbed by the bounded-retry lookup.
        self.store.create_purchase(purchase).await?;
        self.store.create_payment(payment).await?;

        tracing::info!(
            %purchase_id,
            %payment_id,
            provider = %request.provider,
            "PIX charge created"
        );

        Ok(PixCharge {
            purchase_id,
            payment_id,
            correlation_id,
            amount_cents: money.amount().cents(),
            qr,
        })
    }
}
