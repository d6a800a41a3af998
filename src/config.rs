use {
    crate::domain::error::EngineError, crate::services::checkout::PixMerchant, std::env,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub environment: Environment,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub mercadopago_access_token: String,
    pub mercadopago_webhook_secret: Option<String>,
    pub woovi_app_id: String,
    pub woovi_webhook_secret: Option<String>,
    pub delivery_endpoint: String,
    pub pix_merchant: PixMerchant,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            environment,
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            mercadopago_access_token: require("MERCADOPAGO_ACCESS_TOKEN")?,
            mercadopago_webhook_secret: optional("MERCADOPAGO_WEBHOOK_SECRET"),
            woovi_app_id: require("WOOVI_APP_ID")?,
            woovi_webhook_secret: optional("WOOVI_WEBHOOK_SECRET"),
            delivery_endpoint: require("DELIVERY_ENDPOINT")?,
            pix_merchant: PixMerchant {
                key: require("PIX_KEY")?,
                name: require("PIX_MERCHANT_NAME")?,
                city: require("PIX_MERCHANT_CITY")?,
            },
        })
    }

    /// Unsigned Woovi webhooks are tolerated only outside production.
    pub fn allow_unverified_webhooks(&self) -> bool {
        self.environment != Environment::Production
    }
}

fn require(name: &str) -> Result<String, EngineError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::Config(format!("{name} must be set")))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
