pub mod donations;
pub mod organizations;
pub mod payout_attempts;
pub mod split_configurations;
