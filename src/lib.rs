pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod pix;
pub mod services;

use {
    crate::domain::provider::{ProviderChannel, ProviderClient},
    crate::services::{checkout::CheckoutService, dispatch::SideEffect, reconcile::ReconcileEngine},
    std::sync::Arc,
    tokio::sync::mpsc,
};

/// A provider's webhook strategy paired with its API status client.
#[derive(Clone)]
pub struct ProviderHandle {
    pub channel: Arc<dyn ProviderChannel>,
    pub client: Arc<dyn ProviderClient>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconcileEngine>,
    pub checkout: Arc<CheckoutService>,
    pub effects: mpsc::Sender<SideEffect>,
    pub stripe: ProviderHandle,
    pub mercadopago: ProviderHandle,
    pub woovi: ProviderHandle,
}
