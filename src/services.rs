pub mod dispatcher;
pub mod fulfillment;
pub mod inventory;
pub mod payment_pipeline;
pub mod reconciler;
pub mod worker;
