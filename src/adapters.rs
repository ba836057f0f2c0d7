pub mod api_errors;
pub mod domains;
pub mod netlify_client;
pub mod stripe;
pub mod stripe_client;
