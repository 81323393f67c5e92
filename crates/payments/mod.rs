pub mod errors;
pub mod stripe_client;
