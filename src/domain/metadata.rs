use serde::{Deserialize, Serialize};

/// Extension map carried on purchases and payments.
///
/// The underlying storage is a JSON object so each delivery channel can stash
/// what it needs, but access goes through named getters/setters for the keys
/// the engine actually understands:
///
/// - `telegram_chat_id` — buyer's chat for bot delivery
/// - `telegram_username` — display only
/// - `customer_email` — card-checkout receipts
/// - `end_to_end_id` — PIX E2E transaction id, set on completion
/// - `copy_paste_code` — the EMV payload handed to the buyer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(serde_json::Map<String, serde_json::Value>);

impl Metadata {
    pub const TELEGRAM_CHAT_ID: &'static str = "telegram_chat_id";
    pub const TELEGRAM_USERNAME: &'static str = "telegram_username";
    pub const CUSTOMER_EMAIL: &'static str = "customer_email";
    pub const END_TO_END_ID: &'static str = "end_to_end_id";
    pub const COPY_PASTE_CODE: &'static str = "copy_paste_code";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }

    pub fn as_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    fn set_str(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .insert(key.to_string(), serde_json::Value::String(value.into()));
    }

    pub fn telegram_chat_id(&self) -> Option<i64> {
        self.0.get(Self::TELEGRAM_CHAT_ID).and_then(|v| v.as_i64())
    }

    pub fn set_telegram_chat_id(&mut self, chat_id: i64) {
        self.0
            .insert(Self::TELEGRAM_CHAT_ID.to_string(), chat_id.into());
    }

    pub fn telegram_username(&self) -> Option<&str> {
        self.get_str(Self::TELEGRAM_USERNAME)
    }

    pub fn set_telegram_username(&mut self, username: impl Into<String>) {
        self.set_str(Self::TELEGRAM_USERNAME, username);
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.get_str(Self::CUSTOMER_EMAIL)
    }

    pub fn set_customer_email(&mut self, email: impl Into<String>) {
        self.set_str(Self::CUSTOMER_EMAIL, email);
    }

    pub fn end_to_end_id(&self) -> Option<&str> {
        self.get_str(Self::END_TO_END_ID)
    }

    pub fn set_end_to_end_id(&mut self, e2e: impl Into<String>) {
        self.set_str(Self::END_TO_END_ID, e2e);
    }

    pub fn copy_paste_code(&self) -> Option<&str> {
        self.get_str(Self::COPY_PASTE_CODE)
    }

    pub fn set_copy_paste_code(&mut self, code: impl Into<String>) {
        self.set_str(Self::COPY_PASTE_CODE, code);
    }
}
