pub mod signature;
pub mod webhook;

pub use webhook::stripe_webhook_handler;
