pub mod credits;
pub mod error;
pub mod event;
pub mod fulfillment;
pub mod id;
pub mod ledger;
pub mod money;
pub mod order;
pub mod provider;
pub mod reconcile;
pub mod repository;
pub mod site_domain;
pub mod subscription;
