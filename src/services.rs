pub mod checkout;
pub mod dispatch;
pub mod poller;
pub mod reconcile;
