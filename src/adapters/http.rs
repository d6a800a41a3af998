use {
    crate::{
        AppState, ProviderHandle,
        adapters::api_errors::ApiError,
        domain::{error::EngineError, id::CorrelationId, payment::Provider},
        services::checkout::PixChargeRequest,
        services::reconcile::{ReconcileOutcome, RefundCommand},
    },
    axum::{Json, body::Bytes, extract::State, http::HeaderMap},
    serde::Deserialize,
    std::collections::HashMap,
    uuid::Uuid,
};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<serde_json::Value> {
    let handle = state.stripe.clone();
    handle_webhook(state, handle, headers, body).await
}

pub async fn mercadopago_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<serde_json::Value> {
    let handle = state.mercadopago.clone();
    handle_webhook(state, handle, headers, body).await
}

pub async fn woovi_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<serde_json::Value> {
    let handle = state.woovi.clone();
    handle_webhook(state, handle, headers, body).await
}

/// One handler for all three providers. Always answers 200 with a small
/// acknowledgement — a non-200 here triggers provider retry storms, which
/// amplify duplicate processing instead of fixing anything. Business
/// rejections only show up in the body and the logs.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(provider = %handle.channel.provider())
)]
async fn handle_webhook(
    state: AppState,
    handle: ProviderHandle,
    headers: HeaderMap,
    body: Bytes,
) -> Json<serde_json::Value> {
    let header_map = lowercase_headers(&headers);

    let result = match state
        .engine
        .reconcile(
            handle.channel.as_ref(),
            handle.client.as_ref(),
            &body,
            &header_map,
        )
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "reconcile failed");
            return Json(serde_json::json!({ "received": false }));
        }
    };

    tracing::info!(
        outcome = ?result.outcome,
        purchase_id = ?result.purchase_id,
        new_status = ?result.new_status,
        "webhook reconciled"
    );

    // The provider is acknowledged independently of side-effect completion;
    // the bounded queue hands them to the dispatcher worker.
    let accepted = result.accepted();
    for effect in result.side_effects {
        if state.effects.send(effect).await.is_err() {
            tracing::error!("side-effect queue closed, effect dropped");
        }
    }

    Json(serde_json::json!({ "received": accepted }))
}

fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CreatePixChargeBody {
    pub content_id: Uuid,
    pub provider: Provider,
    pub buyer_id: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub description: Option<String>,
}

pub async fn create_pix_charge(
    State(state): State<AppState>,
    Json(body): Json<CreatePixChargeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let charge = state
        .checkout
        .create_pix_charge(PixChargeRequest {
            content_id: body.content_id,
            provider: body.provider,
            buyer_id: body.buyer_id,
            telegram_chat_id: body.telegram_chat_id,
            description: body.description,
        })
        .await?;

    Ok(Json(serde_json::json!({
        "purchase_id": charge.purchase_id,
        "payment_id": charge.payment_id,
        "correlation_id": charge.correlation_id,
        "amount_cents": charge.amount_cents,
        "qr_code_text": charge.qr.text,
        "qr_code_base64": charge.qr.png_base64(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct RefundBody {
    pub provider: Provider,
    pub correlation_id: String,
    pub refund_id: String,
    pub amount_cents: Option<i64>,
    pub reason: Option<String>,
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Json(body): Json<RefundBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let command = RefundCommand {
        provider: body.provider,
        correlation_id: CorrelationId::new(body.correlation_id)?,
        refund_id: body.refund_id,
        amount_cents: body.amount_cents,
        reason: body.reason,
    };

    let result = state.engine.apply_refund(command).await?;
    for effect in result.side_effects {
        if state.effects.send(effect).await.is_err() {
            tracing::error!("side-effect queue closed, effect dropped");
        }
    }

    let status = match result.outcome {
        ReconcileOutcome::Applied => "refunded",
        ReconcileOutcome::Duplicate => "already_refunded",
        ReconcileOutcome::Conflict => "conflict",
        ReconcileOutcome::NotFound => {
            return Err(ApiError(EngineError::Validation("unknown payment".into())));
        }
        other => {
            tracing::error!(outcome = ?other, "unexpected refund outcome");
            "error"
        }
    };

    Ok(Json(serde_json::json!({
        "status": status,
        "purchase_id": result.purchase_id,
    })))
}
