pub mod donations;
pub mod organizations;
pub mod payouts;
pub mod stripe_webhook;
