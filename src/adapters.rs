pub mod api_errors;
pub mod delivery;
pub mod http;
pub mod mercadopago;
pub mod stripe;
pub mod woovi;
