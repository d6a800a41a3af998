use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    cinepay::{
        AppState, ProviderHandle,
        adapters::{
            delivery::HttpDeliveryGateway,
            http,
            mercadopago::{MercadoPagoChannel, MercadoPagoClient},
            stripe::{StripeChannel, StripeClient},
            woovi::{WooviChannel, WooviClient},
        },
        config::Config,
        domain::payment::Provider,
        domain::provider::ProviderClient,
        domain::store::{DeliveryGateway, FailureSink, PurchaseStore},
        infra::postgres::{failure_log::PgFailureSink, store::PgPurchaseStore},
        services::{
            checkout::CheckoutService,
            dispatch::{Dispatcher, run_dispatcher},
            poller::run_poller,
            reconcile::ReconcileEngine,
        },
    },
    sqlx::postgres::PgPoolOptions,
    std::{collections::HashMap, sync::Arc, time::Duration},
    tokio::{
        signal,
        sync::{mpsc, watch},
    },
    tower_http::timeout::TimeoutLayer,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let store: Arc<dyn PurchaseStore> = Arc::new(PgPurchaseStore::new(pool.clone()));
    let failures: Arc<dyn FailureSink> = Arc::new(PgFailureSink::new(pool));
    let delivery: Arc<dyn DeliveryGateway> =
        Arc::new(HttpDeliveryGateway::new(&config.delivery_endpoint));

    let engine = Arc::new(ReconcileEngine::new(store.clone()));
    let checkout = Arc::new(CheckoutService::new(
        store.clone(),
        config.pix_merchant.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(store, delivery, failures));

    let stripe = ProviderHandle {
        channel: Arc::new(StripeChannel::new(&config.stripe_webhook_secret)),
        client: Arc::new(StripeClient::new(&config.stripe_secret_key)),
    };
    let mercadopago = ProviderHandle {
        channel: Arc::new(MercadoPagoChannel::new(
            config.mercadopago_webhook_secret.clone(),
        )),
        client: Arc::new(MercadoPagoClient::new(&config.mercadopago_access_token)),
    };
    let woovi = ProviderHandle {
        channel: Arc::new(WooviChannel::new(
            config.woovi_webhook_secret.clone(),
            config.allow_unverified_webhooks(),
        )),
        client: Arc::new(WooviClient::new(&config.woovi_app_id)),
    };

    let clients: HashMap<Provider, Arc<dyn ProviderClient>> = HashMap::from([
        (Provider::Stripe, stripe.client.clone()),
        (Provider::MercadoPago, mercadopago.client.clone()),
        (Provider::Woovi, woovi.client.clone()),
    ]);

    let (effects_tx, effects_rx) = mpsc::channel(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher_task = tokio::spawn(run_dispatcher(
        dispatcher,
        effects_rx,
        shutdown_rx.clone(),
    ));
    let poller_task = tokio::spawn(run_poller(
        engine.clone(),
        clients,
        effects_tx.clone(),
        shutdown_rx,
    ));

    let state = AppState {
        engine,
        checkout,
        effects: effects_tx,
        stripe,
        mercadopago,
        woovi,
    };

    let app = Router::new()
        .route("/", get(http::health))
        .route("/webhooks/stripe", post(http::stripe_webhook))
        .route("/webhooks/mercadopago", post(http::mercadopago_webhook))
        .route("/webhooks/woovi", post(http::woovi_webhook))
        .route("/charges/pix", post(http::create_pix_charge))
        .route("/admin/refunds", post(http::refund_payment))
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64 KB — provider events are small
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Stop the workers; the dispatcher drains queued side effects first.
    let _ = shutdown_tx.send(true);
    let _ = dispatcher_task.await;
    let _ = poller_task.await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
